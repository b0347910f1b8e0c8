//! Notation events from `<note>` elements.
//!
//! A note opens any containers it starts (tremolo, beam, tuplet, chord),
//! becomes a rest, spacer, measure rest or pitched note, registers its
//! spanners and note-level annotations, closes the containers it ends, and
//! finally hands its identifier to every pending annotation.

use roxmltree::Node;

use crate::context::ImportContext;
use crate::direction::{color, dynamics_text, fermata_element, number_attr};
use crate::layer::{self, attach};
use crate::lookup;
use crate::model::*;
use crate::nesting::LayerRef;
use crate::resolver::{OpenSlur, OpenTie};
use crate::xml;

/// Values shared by the event and the chord it may open.
struct NoteValues<'a> {
    type_name: &'a str,
    dots: u8,
    cue: bool,
    /// Stroke count of a single-note tremolo
    tremolo_slash: Option<u8>,
}

/// Where the event lives, as global staff and voice numbers.
#[derive(Clone, Copy)]
struct Position {
    at: LayerRef,
    staff_n: u32,
    voice_n: u32,
}

pub fn read_note(node: &Node, measure: &mut Measure, ctx: &mut ImportContext) {
    let at = layer::select_layer(node, measure, &mut ctx.diag);
    let (staff_n, voice_n) = layer::layer_numbers(measure, at);
    let pos = Position { at, staff_n, voice_n };

    if !xml::has_child(*node, "chord") {
        ctx.cursor
            .advance(xml::leading_int(xml::child_text(*node, "duration")));
    }

    if ctx.measure_repeat {
        let marked = layer::layer_mut(measure, at)
            .elements
            .iter()
            .any(|e| matches!(e, LayerElement::MeasureRepeat(_)));
        if !marked {
            let mark = LayerElement::MeasureRepeat(MeasureRepeat {
                id: ctx.ids.next("mRpt"),
            });
            attach(measure, ctx, at, mark);
        }
        return;
    }

    let notations = xml::children(*node, "notations").find(|n| !xml::attr_is(*n, "print-object", "no"));
    let type_node = xml::child(*node, "type");
    let mut values = NoteValues {
        type_name: type_node.map(xml::text).unwrap_or(""),
        dots: u8::try_from(xml::children(*node, "dot").count()).unwrap_or(u8::MAX),
        cue: xml::has_child(*node, "cue") || type_node.is_some_and(|t| xml::attr_is(t, "size", "cue")),
        tremolo_slash: None,
    };

    // ─── Containers opened by this note ──────────────────────────────

    let tremolo = notations.and_then(|n| xml::path(n, &["ornaments", "tremolo"]));
    let tremolo_type = tremolo.map(|t| xml::attr(t, "type")).unwrap_or("");
    if let Some(tremolo) = tremolo {
        let strokes = u8::try_from(xml::leading_int(xml::text(tremolo)))
            .ok()
            .filter(|&n| n > 0);
        match tremolo_type {
            "single" => {
                let b_trem = LayerElement::BowedTremolo(BowedTremolo {
                    id: ctx.ids.next("bTrem"),
                    children: Vec::new(),
                });
                attach(measure, ctx, at, b_trem);
                values.tremolo_slash = strokes;
            }
            "start" => {
                let f_trem = LayerElement::FingeredTremolo(FingeredTremolo {
                    id: ctx.ids.next("fTrem"),
                    slash: strokes,
                    children: Vec::new(),
                });
                attach(measure, ctx, at, f_trem);
            }
            _ => {}
        }
    }

    if primary_beam(node, "begin") {
        let beam = LayerElement::Beam(Beam {
            id: ctx.ids.next("beam"),
            children: Vec::new(),
        });
        attach(measure, ctx, at, beam);
    }

    let tuplet_of = |kind: &str| {
        notations.and_then(|n| xml::children(n, "tuplet").find(|t| xml::attr_is(*t, "type", kind)))
    };
    if let Some(start) = tuplet_of("start") {
        let tuplet = tuplet(node, &start, ctx.ids.next("tuplet"));
        attach(measure, ctx, at, LayerElement::Tuplet(tuplet));
    }

    // ─── The event itself ────────────────────────────────────────────

    let element_id = match xml::child(*node, "rest") {
        Some(rest) => read_rest(node, &rest, &values, at, measure, ctx),
        None => read_pitched(node, notations, &values, pos, measure, ctx),
    };
    ctx.resolver.set_last_id(&element_id);

    if let Some(notations) = notations {
        read_note_annotations(&notations, &element_id, pos, measure.n, ctx);
    }

    // ─── Containers closed by this note ──────────────────────────────

    match (tremolo.is_some(), tremolo_type) {
        (true, "single") => {
            ctx.nesting.close(at, ContainerKind::BowedTremolo);
        }
        (true, "stop") => {
            ctx.nesting.close(at, ContainerKind::FingeredTremolo);
        }
        _ => {}
    }
    if tuplet_of("stop").is_some() {
        ctx.nesting.close(at, ContainerKind::Tuplet);
    }
    if primary_beam(node, "end") {
        ctx.nesting.close(at, ContainerKind::Beam);
    }

    ctx.resolver.attach_pending(&element_id, staff_n);
}

/// A `<beam number="1">` with the given value.
fn primary_beam(node: &Node, value: &str) -> bool {
    xml::children(*node, "beam").any(|b| xml::attr_is(b, "number", "1") && xml::text(b) == value)
}

fn tuplet(node: &Node, start: &Node, id: String) -> Tuplet {
    let actual = xml::path(*node, &["time-modification", "actual-notes"]);
    let normal = xml::path(*node, &["time-modification", "normal-notes"]);
    let (num, numbase) = match (actual, normal) {
        (Some(actual), Some(normal)) => (
            u32::try_from(xml::leading_int(xml::text(actual))).ok(),
            u32::try_from(xml::leading_int(xml::text(normal))).ok(),
        ),
        _ => (None, None),
    };
    let place = lookup::place_value(xml::attr(*start, "placement"));
    let show_number = xml::attr(*start, "show-number");
    Tuplet {
        id,
        num,
        numbase,
        num_place: place,
        bracket_place: place,
        num_format: lookup::tuplet_num_format_value(show_number),
        num_visible: (show_number == "none").then_some(false),
        bracket_visible: lookup::yes_no_value(xml::attr(*start, "bracket")),
        children: Vec::new(),
    }
}

// ─── Rests ───────────────────────────────────────────────────────────

/// Spacer when print-suppressed, measure rest when untyped or flagged,
/// plain rest otherwise. Returns the new element's identifier.
fn read_rest(
    node: &Node,
    rest: &Node,
    values: &NoteValues,
    at: LayerRef,
    measure: &mut Measure,
    ctx: &mut ImportContext,
) -> String {
    let step = xml::child_text(*rest, "display-step");
    let octave = xml::child_text(*rest, "display-octave");
    let oloc = (!octave.is_empty()).then(|| xml::leading_int(octave));

    let element = if xml::attr_is(*node, "print-object", "no") {
        LayerElement::Space(Space {
            id: ctx.ids.next("space"),
            dur: lookup::duration(values.type_name, &mut ctx.diag),
        })
    } else if values.type_name.is_empty() || xml::attr_is(*rest, "measure", "yes") {
        LayerElement::MeasureRest(MeasureRest {
            id: ctx.ids.next("mRest"),
            visible: None,
            cue: values.cue,
            ploc: lookup::pitch_name(step, &mut ctx.diag),
            oloc,
        })
    } else {
        LayerElement::Rest(Rest {
            id: ctx.ids.next("rest"),
            dur: lookup::duration(values.type_name, &mut ctx.diag),
            dots: values.dots,
            cue: values.cue,
            ploc: lookup::pitch_name(step, &mut ctx.diag),
            oloc,
        })
    };
    let id = element.id().to_string();
    attach(measure, ctx, at, element);
    id
}

// ─── Pitched notes ───────────────────────────────────────────────────

/// Build a pitched note, opening or closing its chord as the next note
/// requires. Returns the identifier of the chord when this note opened
/// one, else of the note.
fn read_pitched(
    node: &Node,
    notations: Option<Node>,
    values: &NoteValues,
    pos: Position,
    measure: &mut Measure,
    ctx: &mut ImportContext,
) -> String {
    let at = pos.at;
    let id = ctx.ids.next("note");
    let mut note = Note {
        id: id.clone(),
        visible: lookup::yes_no_value(xml::attr(*node, "print-object")),
        color: color(node),
        ..Default::default()
    };

    let accidental = xml::child(*node, "accidental");
    if let Some(accidental) = accidental {
        note.accid = Some(read_accidental(&accidental, ctx));
    }

    let stem_dir = match xml::child_text(*node, "stem") {
        "up" => Some(StemDirection::Up),
        "down" => Some(StemDirection::Down),
        _ => None,
    };

    if let Some(pitch) = xml::child(*node, "pitch") {
        let step = xml::child_text(pitch, "step");
        note.pname = lookup::pitch_name(step, &mut ctx.diag);
        let octave = xml::child_text(pitch, "octave");
        if !octave.is_empty() {
            let written = xml::leading_int(octave);
            let shift = ctx.resolver.octave_displacement(pos.staff_n);
            if shift != 0 {
                note.oct = Some(written.saturating_add(shift));
                note.oct_ges = Some(written);
            } else {
                note.oct = Some(written);
            }
        }
        let alter = xml::child(pitch, "alter")
            .filter(|n| accidental.is_none() && !xml::text(*n).is_empty());
        if let Some(alter) = alter {
            let value = xml::parse_f64(alter).unwrap_or(f64::NAN);
            note.accid = Some(Accid {
                accid_ges: lookup::alter(value, &mut ctx.diag),
                ..Default::default()
            });
        }
    }

    let artics = read_artics(notations);

    // look ahead: is the next note part of the same chord?
    let next_is_chord = xml::following_sibling(*node, "note").is_some_and(|n| xml::has_child(n, "chord"));
    let mut element_id = id.clone();
    if next_is_chord && !ctx.nesting.innermost_is(at, ContainerKind::Chord) {
        let chord = Chord {
            id: ctx.ids.next("chord"),
            dur: lookup::duration(values.type_name, &mut ctx.diag),
            dots: values.dots,
            stem_dir,
            stem_mod: values.tremolo_slash.map(StemModifier),
            cue: values.cue,
            artics,
            children: Vec::new(),
        };
        element_id = chord.id.clone();
        attach(measure, ctx, at, LayerElement::Chord(chord));
    } else {
        note.artics = artics;
    }

    if let Some(grace) = xml::child(*node, "grace") {
        note.grace = Some(match xml::attr(grace, "slash") {
            "no" => Grace::Accented,
            "yes" => {
                note.stem_mod = Some(StemModifier(1));
                Grace::Unaccented
            }
            _ => Grace::Unknown,
        });
    }

    if !ctx.nesting.innermost_is(at, ContainerKind::Chord) {
        note.dur = lookup::duration(values.type_name, &mut ctx.diag);
        note.dots = values.dots;
        note.stem_dir = stem_dir;
        note.cue = values.cue;
        if let Some(strokes) = values.tremolo_slash {
            note.stem_mod = Some(StemModifier(strokes));
        }
    }

    note.verses = read_lyrics(node);

    // ties: close whatever this pitch continues, then open a new one
    let key = OpenTie {
        staff: pos.staff_n,
        layer: pos.voice_n,
        pname: note.pname,
        oct: note.oct,
    };
    let tied = |kind: &str| {
        notations.and_then(|n| xml::children(n, "tied").find(|t| xml::attr_is(*t, "type", kind)))
    };
    ctx.resolver
        .close_tie(&key, &id, tied("stop").is_some(), &mut ctx.diag);
    if let Some(start) = tied("start") {
        let mut tie = ControlElement::new(
            ctx.ids.next("tie"),
            ControlKind::Tie {
                curve_dir: curve_dir(&start),
            },
        );
        tie.color = color(&start);
        ctx.resolver.open_tie(measure.n, tie, &id, key);
    }

    attach(measure, ctx, at, LayerElement::Note(note));

    if !next_is_chord && ctx.nesting.innermost_is(at, ContainerKind::Chord) {
        ctx.nesting.close(at, ContainerKind::Chord);
    }
    element_id
}

fn read_accidental(accidental: &Node, ctx: &mut ImportContext) -> Accid {
    let mut accid = Accid {
        accid: lookup::accidental(xml::text(*accidental), &mut ctx.diag),
        color: color(accidental),
        ..Default::default()
    };
    if xml::attr_is(*accidental, "cautionary", "yes") {
        accid.func = Some(AccidFunc::Caution);
    }
    if xml::attr_is(*accidental, "editorial", "yes") {
        accid.func = Some(AccidFunc::Editorial);
    }
    if xml::attr_is(*accidental, "bracket", "yes") {
        accid.enclose = Some(Enclosure::Bracket);
    }
    if xml::attr_is(*accidental, "parentheses", "yes") {
        accid.enclose = Some(Enclosure::Paren);
    }
    accid
}

/// Curve direction of a tie or slur; `placement` wins over `orientation`.
fn curve_dir(node: &Node) -> Option<CurveDir> {
    lookup::curve_place_value(xml::attr(*node, "placement"))
        .or_else(|| lookup::curve_dir_value(xml::attr(*node, "orientation")))
}

/// One group per `<articulations>` and per `<technical>` element.
fn read_artics(notations: Option<Node>) -> Vec<Artic> {
    let Some(notations) = notations else {
        return Vec::new();
    };
    let group = |node: Node, map: fn(&str) -> Option<Articulation>| {
        node.children()
            .filter(|c| c.is_element())
            .filter_map(|c| map(c.tag_name().name()))
            .collect::<Vec<_>>()
    };

    let mut artics = Vec::new();
    for node in xml::children(notations, "articulations") {
        let artic = group(node, lookup::articulation_value);
        if !artic.is_empty() {
            artics.push(Artic { artic, technical: false });
        }
    }
    for node in xml::children(notations, "technical") {
        let artic = group(node, lookup::technical_value);
        if !artic.is_empty() {
            artics.push(Artic { artic, technical: true });
        }
    }
    artics
}

// ─── Lyrics ──────────────────────────────────────────────────────────

fn read_lyrics(node: &Node) -> Vec<Verse> {
    xml::children(*node, "lyric")
        .map(|lyric| {
            let mut verse = Verse {
                n: xml::leading_int(xml::attr(lyric, "number")).max(1) as u32,
                color: color(&lyric),
                syls: Vec::new(),
            };
            if !xml::attr_is(lyric, "print-object", "no") {
                let extend = xml::has_child(lyric, "extend");
                let syllabic = xml::child_text(lyric, "syllabic");
                verse.syls = xml::children(lyric, "text")
                    .map(|text| syllable(&text, extend, syllabic))
                    .collect();
            }
            verse
        })
        .collect()
}

pub fn syllable(text: &Node, extend: bool, syllabic: &str) -> Syl {
    let mut con = None;
    let mut wordpos = None;
    if extend {
        con = Some(SylConnector::Underscore);
    }
    if xml::following_sibling(*text, "elision").is_some() {
        con = Some(SylConnector::Bridge);
    }
    match syllabic {
        "begin" => {
            con = Some(SylConnector::Dash);
            wordpos = Some(WordPosition::Initial);
        }
        "middle" => {
            con = Some(SylConnector::Dash);
            wordpos = Some(WordPosition::Medial);
        }
        "end" => wordpos = Some(WordPosition::Terminal),
        _ => {}
    }
    let attr = |name: &str| Some(xml::attr(*text, name)).filter(|v| !v.is_empty()).map(String::from);
    Syl {
        text: xml::text(*text).to_string(),
        con,
        wordpos,
        lang: xml::xml_attr(*text, "lang").map(String::from),
        font_style: attr("font-style"),
        font_weight: attr("font-weight"),
    }
}

// ─── Note-level annotations ──────────────────────────────────────────

/// Dynamics, fermata, ornaments and slurs written inside `<notations>`.
fn read_note_annotations(notations: &Node, element_id: &str, pos: Position, measure_n: i32, ctx: &mut ImportContext) {
    let start = format!("#{element_id}");
    let add = |ctx: &mut ImportContext, mut element: ControlElement| {
        element.staff = vec![pos.staff_n];
        element.start_id = Some(start.clone());
        ctx.resolver.add(measure_n, element);
    };

    if let Some(dynamics) = xml::child(*notations, "dynamics") {
        let mut dynam = ControlElement::new(
            ctx.ids.next("dynam"),
            ControlKind::Dynam {
                text: dynamics_text(&dynamics),
            },
        );
        dynam.place = lookup::place_value(xml::attr(dynamics, "placement"));
        add(ctx, dynam);
    }

    if let Some(fermata) = xml::child(*notations, "fermata") {
        let fermata = fermata_element(&fermata, ctx);
        add(ctx, fermata);
    }

    if let Some(ornaments) = xml::child(*notations, "ornaments") {
        for ornament in ornaments.children().filter(|n| n.is_element()) {
            let kind = match ornament.tag_name().name() {
                "mordent" | "inverted-mordent" => ControlKind::Mordent {
                    form: if ornament.tag_name().name() == "mordent" {
                        MordentForm::Normal
                    } else {
                        MordentForm::Inverted
                    },
                    long: lookup::yes_no_value(xml::attr(ornament, "long")),
                },
                "trill-mark" => ControlKind::Trill,
                "turn" => ControlKind::Turn {
                    form: TurnForm::Normal,
                },
                "inverted-turn" => ControlKind::Turn {
                    form: TurnForm::Inverted,
                },
                _ => continue,
            };
            let mut element = ControlElement::new(String::new(), kind);
            element.id = ctx.ids.next(element.name());
            element.color = color(&ornament);
            element.place = lookup::place_value(xml::attr(ornament, "placement"));
            add(ctx, element);
        }
    }

    // slurs across staves are not matched
    for slur in xml::children(*notations, "slur") {
        let key = OpenSlur {
            staff: pos.staff_n,
            layer: pos.voice_n,
            number: number_attr(&slur),
        };
        match xml::attr(slur, "type") {
            "start" => {
                let mut element = ControlElement::new(
                    ctx.ids.next("slur"),
                    ControlKind::Slur {
                        curve_dir: curve_dir(&slur),
                    },
                );
                element.color = color(&slur);
                ctx.resolver.open_slur(measure_n, element, key);
            }
            "stop" => {
                ctx.resolver.close_slur(&key, element_id, &mut ctx.diag);
            }
            _ => {}
        }
    }
}
