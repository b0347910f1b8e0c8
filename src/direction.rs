//! Directions, harmony and the annotation builders shared with notes.
//!
//! Most annotations read here precede the note they belong to, so they go
//! on the resolver's pending list and receive their start reference from
//! the next note read.

use roxmltree::Node;

use crate::context::ImportContext;
use crate::diagnostics::WarningKind;
use crate::layer::clamp_staff;
use crate::lookup;
use crate::model::*;
use crate::resolver::PendingKind;
use crate::xml;

// ─── Direction ───────────────────────────────────────────────────────

pub fn read_direction(node: &Node, measure: &Measure, ctx: &mut ImportContext) {
    let types: Vec<Node> = xml::children(*node, "direction-type").collect();
    let find = |name: &str| types.iter().find_map(|t| xml::child(*t, name));
    let words: Vec<Node> = types
        .iter()
        .flat_map(|t| xml::children(*t, "words"))
        .collect();
    let place = lookup::place_value(xml::attr(*node, "placement"));
    let tempo_sound = xml::children(*node, "sound").find(|s| s.has_attribute("tempo"));
    let staff = direction_staff(node, measure, ctx);
    let measure_n = measure.n;

    if !words.is_empty() && tempo_sound.is_none() {
        let mut dir = ControlElement::new(
            ctx.ids.next("dir"),
            ControlKind::Dir {
                lang: single_lang(&words),
                text: text_runs(&words),
            },
        );
        dir.place = place;
        ctx.resolver.add_pending(measure_n, PendingKind::Dir, dir);
    }

    let dynamics = find("dynamics");
    if let Some(dynamics) = dynamics {
        let mut dynam = ControlElement::new(
            ctx.ids.next("dynam"),
            ControlKind::Dynam {
                text: dynamics_text(&dynamics),
            },
        );
        dynam.place = place;
        ctx.resolver.add_pending(measure_n, PendingKind::Dynam, dynam);
    }

    let wedge = find("wedge");
    if let Some(wedge) = wedge {
        read_wedge(&wedge, place, measure_n, ctx);
    }

    let shift = find("octave-shift");
    if let Some(shift) = shift {
        read_octave_shift(&shift, staff, measure_n, ctx);
    }

    let pedal = find("pedal");
    if let Some(pedal) = pedal {
        read_pedal(&pedal, place, staff, measure_n, ctx);
    }

    let metronome = find("metronome");
    if metronome.is_some() || tempo_sound.is_some() {
        let mut kind = ControlKind::Tempo {
            lang: single_lang(&words),
            text: text_runs(&words),
            mm: None,
            mm_unit: None,
            mm_dots: None,
            midi_bpm: None,
        };
        match (metronome, tempo_sound) {
            (Some(metronome), _) => read_metronome(&metronome, &mut kind, ctx),
            (None, Some(sound)) => {
                if let ControlKind::Tempo { midi_bpm, .. } = &mut kind {
                    *midi_bpm = Some(xml::leading_int(xml::attr(sound, "tempo")));
                }
            }
            (None, None) => {}
        }
        let mut tempo = ControlElement::new(ctx.ids.next("tempo"), kind);
        tempo.place = place;
        ctx.resolver.add_pending(measure_n, PendingKind::Tempo, tempo);
    }

    if words.is_empty()
        && dynamics.is_none()
        && metronome.is_none()
        && shift.is_none()
        && pedal.is_none()
        && wedge.is_none()
    {
        let name = types
            .first()
            .and_then(|t| t.children().find(|n| n.is_element()))
            .map(|n| n.tag_name().name())
            .unwrap_or("");
        ctx.diag.warn(
            WarningKind::Unsupported,
            format!("Unsupported direction-type '{name}'"),
        );
    }
}

/// Global staff number of a direction's `<staff>` (part-local, default 1).
fn direction_staff(node: &Node, measure: &Measure, ctx: &mut ImportContext) -> u32 {
    let requested = match xml::child(*node, "staff") {
        Some(staff) => xml::leading_int(xml::text(staff)),
        None => 1,
    };
    let idx = clamp_staff(requested, measure.staves.len()).unwrap_or_else(|| {
        ctx.diag.warn(
            WarningKind::OutOfRange,
            format!("Staff {requested} cannot be found"),
        );
        0
    });
    measure.staves.get(idx).map(|s| s.n).unwrap_or(1)
}

fn read_wedge(wedge: &Node, place: Option<Place>, measure_n: i32, ctx: &mut ImportContext) {
    let number = number_attr(wedge);
    let wedge_type = xml::attr(*wedge, "type");
    if wedge_type == "stop" {
        ctx.resolver.close_hairpin(number, &mut ctx.diag);
        return;
    }
    let form = match wedge_type {
        "crescendo" => Some(HairpinForm::Crescendo),
        "diminuendo" => Some(HairpinForm::Diminuendo),
        _ => None,
    };
    let mut hairpin = ControlElement::new(ctx.ids.next("hairpin"), ControlKind::Hairpin { form });
    hairpin.color = color(wedge);
    hairpin.place = place;
    ctx.resolver.open_hairpin(measure_n, hairpin, number);
}

/// Whole-octave displacement of an octave shift of `size` (8, 15, 22).
pub fn octave_displacement(size: i32, down: bool) -> i32 {
    let octaves = size.saturating_add(2) / 8;
    if down {
        -octaves
    } else {
        octaves
    }
}

fn read_octave_shift(shift: &Node, staff: u32, measure_n: i32, ctx: &mut ImportContext) {
    match xml::attr(*shift, "type") {
        "stop" => {
            ctx.resolver.stop_octave(staff, &mut ctx.diag);
        }
        "continue" => {}
        shift_type => {
            let size_attr = xml::attr(*shift, "size");
            let size = if size_attr.is_empty() {
                8
            } else {
                xml::leading_int(size_attr)
            };
            let Some(dis) = lookup::octave_dis_value(size) else {
                ctx.diag.warn(
                    WarningKind::UnknownValue,
                    format!("Unsupported octave-shift size '{size}'"),
                );
                return;
            };
            let down = shift_type == "down";
            let mut octave = ControlElement::new(
                ctx.ids.next("octave"),
                ControlKind::Octave {
                    dis: Some(dis),
                    dis_place: Some(if down { Place::Below } else { Place::Above }),
                },
            );
            octave.color = color(shift);
            octave.staff = vec![staff];
            ctx.resolver
                .start_octave(measure_n, octave, staff, octave_displacement(size, down));
        }
    }
}

fn read_pedal(pedal: &Node, place: Option<Place>, staff: u32, measure_n: i32, ctx: &mut ImportContext) {
    let pedal_type = xml::attr(*pedal, "type");
    let dir = lookup::pedal_dir(pedal_type, &mut ctx.diag);
    let mut element = ControlElement::new(ctx.ids.next("pedal"), ControlKind::Pedal { dir });
    element.place = place;

    // a release belongs to the note it follows
    match ctx.resolver.last_id().map(String::from) {
        Some(last) if pedal_type == "stop" => {
            element.start_id = Some(last);
            element.staff = vec![staff];
            ctx.resolver.add(measure_n, element);
        }
        _ => {
            ctx.resolver.add_pending(measure_n, PendingKind::Pedal, element);
        }
    }
}

fn read_metronome(metronome: &Node, kind: &mut ControlKind, ctx: &mut ImportContext) {
    let ControlKind::Tempo {
        text,
        mm,
        mm_unit,
        mm_dots,
        ..
    } = kind
    else {
        return;
    };

    let mut label = String::from("M.M.");
    if let Some(per_minute) = xml::child(*metronome, "per-minute") {
        let value = xml::text(per_minute);
        if xml::leading_int(value) != 0 {
            *mm = Some(value.to_string());
        }
        label.push_str(&format!(" = {value}"));
    }
    if let Some(unit) = xml::child(*metronome, "beat-unit") {
        *mm_unit = lookup::duration(xml::text(unit), &mut ctx.diag);
    }
    let dots = xml::children(*metronome, "beat-unit-dot").count();
    if dots > 0 {
        *mm_dots = u8::try_from(dots).ok();
    }
    if xml::attr_is(*metronome, "parentheses", "yes") {
        label = format!("({label})");
    }
    text.push(TextRun {
        text: label,
        rend: None,
    });
}

// ─── Harmony ─────────────────────────────────────────────────────────

/// Chord symbol text: root step, alteration sign, then the kind's text.
pub fn harmony_text(node: &Node) -> String {
    let mut text = String::new();
    if let Some(root) = xml::child(*node, "root") {
        text.push_str(xml::child_text(root, "root-step"));
        if let Some(sign) = xml::child(root, "root-alter").and_then(|a| lookup::alter_symbol(xml::text(a))) {
            text.push_str(sign);
        }
    }
    if let Some(kind) = xml::child(*node, "kind") {
        text.push_str(xml::attr(kind, "text"));
    }
    text
}

pub fn read_harmony(node: &Node, measure: &Measure, ctx: &mut ImportContext) {
    let harm_type = xml::attr(*node, "type");
    let mut harm = ControlElement::new(
        ctx.ids.next("harm"),
        ControlKind::Harm {
            text: harmony_text(node),
            harm_type: (!harm_type.is_empty()).then(|| harm_type.to_string()),
        },
    );
    harm.place = lookup::place_value(xml::attr(*node, "placement"));
    ctx.resolver.add_pending(measure.n, PendingKind::Harm, harm);
}

// ─── Shared builders ─────────────────────────────────────────────────

/// Fermata from a `<fermata>` element of a note or barline.
pub fn fermata_element(fermata: &Node, ctx: &mut ImportContext) -> ControlElement {
    let (form, place) = match xml::attr(*fermata, "type") {
        "inverted" => (Some(FermataForm::Inverted), Some(Place::Below)),
        "upright" => (Some(FermataForm::Normal), Some(Place::Above)),
        _ => (None, None),
    };
    let mut element = ControlElement::new(
        ctx.ids.next("fermata"),
        ControlKind::Fermata {
            shape: lookup::fermata_shape_value(xml::text(*fermata)),
            form,
        },
    );
    element.color = color(fermata);
    element.place = place;
    element
}

/// Text of a `<dynamics>`: `other-dynamics`, else the first mark's name.
pub fn dynamics_text(dynamics: &Node) -> String {
    let other = xml::child_text(*dynamics, "other-dynamics");
    if !other.is_empty() {
        return other.to_string();
    }
    dynamics
        .children()
        .find(|n| n.is_element())
        .map(|n| n.tag_name().name().to_string())
        .unwrap_or_default()
}

/// One text run per `<words>`, wrapped in a rendition when it carries
/// font or color attributes.
pub fn text_runs(words: &[Node]) -> Vec<TextRun> {
    words
        .iter()
        .map(|w| {
            let color = xml::attr(*w, "color");
            let family = xml::attr(*w, "font-family");
            let style = xml::attr(*w, "font-style");
            let weight = xml::attr(*w, "font-weight");
            let rend = if [color, family, style, weight].iter().any(|v| !v.is_empty()) {
                Some(Rend {
                    halign: non_empty(xml::attr(*w, "halign")),
                    color: non_empty(color),
                    font_family: non_empty(family),
                    font_style: non_empty(style),
                    font_weight: non_empty(weight),
                    lang: if words.len() > 1 {
                        xml::xml_attr(*w, "lang").map(String::from)
                    } else {
                        None
                    },
                })
            } else {
                None
            };
            TextRun {
                text: xml::text(*w).to_string(),
                rend,
            }
        })
        .collect()
}

fn single_lang(words: &[Node]) -> Option<String> {
    match words {
        [only] => xml::xml_attr(*only, "lang").map(String::from),
        _ => None,
    }
}

/// `number` attribute of a spanner, 1 when absent or not positive.
pub fn number_attr(node: &Node) -> i32 {
    xml::leading_int(xml::attr(*node, "number")).max(1)
}

pub fn color(node: &Node) -> Option<String> {
    non_empty(xml::attr(*node, "color"))
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
