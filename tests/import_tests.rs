//! Integration tests: import complete MusicXML documents and check the
//! resulting score tree, control elements and warnings.

use pretty_assertions::assert_eq;
use scoreimport::*;
use std::io::{Cursor, Write};

// ─── Fixtures ────────────────────────────────────────────────────────

fn score(part_list: &str, parts: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="4.0">
  <part-list>{part_list}</part-list>
  {parts}
</score-partwise>"#
    )
}

/// One single-staff part `P1` in 4/4 with one division per quarter.
fn single_part(first_measure_body: &str, more_measures: &str) -> String {
    score(
        r#"<score-part id="P1"><part-name>Flute</part-name></score-part>"#,
        &format!(
            r#"<part id="P1">
                <measure number="1">
                  <attributes>
                    <divisions>1</divisions>
                    <time><beats>4</beats><beat-type>4</beat-type></time>
                    <clef><sign>G</sign><line>2</line></clef>
                  </attributes>
                  {first_measure_body}
                </measure>
                {more_measures}
              </part>"#
        ),
    )
}

fn pitched(step: &str, octave: i32, kind: &str, extra: &str) -> String {
    let duration = match kind {
        "whole" => 4,
        "half" => 2,
        _ => 1,
    };
    format!(
        r#"<note><pitch><step>{step}</step><octave>{octave}</octave></pitch><duration>{duration}</duration><type>{kind}</type>{extra}</note>"#
    )
}

fn import(xml: &str) -> Import {
    import_str(xml).expect("document should import")
}

/// Every note of a measure, in staff, layer and document order.
fn notes(measure: &Measure) -> Vec<&Note> {
    let mut out = Vec::new();
    for staff in &measure.staves {
        for layer in &staff.layers {
            for element in &layer.elements {
                element.walk(&mut |e| {
                    if let LayerElement::Note(note) = e {
                        out.push(note);
                    }
                });
            }
        }
    }
    out
}

fn reference(note: &Note) -> Option<String> {
    Some(format!("#{}", note.id))
}

fn controls_named<'a>(measure: &'a Measure, name: &str) -> Vec<&'a ControlElement> {
    measure
        .control_elements
        .iter()
        .filter(|c| c.name() == name)
        .collect()
}

// ─── Staff groups and numbering ──────────────────────────────────────

#[test]
fn staff_numbers_are_contiguous_across_parts() {
    let rest_measure = r#"<note><rest measure="yes"/><duration>4</duration></note>"#;
    let xml = score(
        r#"
        <part-group type="start" number="1"><group-symbol>bracket</group-symbol></part-group>
        <score-part id="P1"><part-name>Voice</part-name><part-abbreviation>V.</part-abbreviation></score-part>
        <score-part id="P2"><part-name>Piano</part-name><part-abbreviation>Pno.</part-abbreviation></score-part>
        <part-group type="stop" number="1"/>
        <score-part id="P3"><part-name>Bass</part-name></score-part>"#,
        &format!(
            r#"
            <part id="P1">
              <measure number="1"><attributes><divisions>1</divisions><clef><sign>G</sign><line>2</line></clef></attributes>{rest_measure}</measure>
              <measure number="2">{rest_measure}</measure>
            </part>
            <part id="P2">
              <measure number="1">
                <attributes>
                  <divisions>1</divisions><staves>2</staves>
                  <clef number="1"><sign>G</sign><line>2</line></clef>
                  <clef number="2"><sign>F</sign><line>4</line></clef>
                </attributes>
                <note><rest measure="yes"/><duration>4</duration><staff>1</staff></note>
                <backup><duration>4</duration></backup>
                <note><rest measure="yes"/><duration>4</duration><staff>2</staff></note>
              </measure>
              <measure number="2">{rest_measure}</measure>
            </part>
            <part id="P3">
              <measure number="1"><attributes><divisions>1</divisions><clef><sign>F</sign><line>4</line></clef></attributes>{rest_measure}</measure>
              <measure number="2">{rest_measure}</measure>
            </part>"#
        ),
    );
    let result = import(&xml);
    assert!(result.warnings.is_empty(), "unexpected warnings: {:?}", result.warnings);
    let score = &result.score;

    let numbers: Vec<u32> = score.staff_grp.staff_defs().iter().map(|d| d.n).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    let root = &score.staff_grp.children;
    assert_eq!(root.len(), 2);
    let StaffGroupChild::Group(bracket) = &root[0] else {
        panic!("expected the bracket group first");
    };
    assert_eq!(bracket.symbol, Some(GroupSymbol::Bracket));
    let StaffGroupChild::StaffDef(voice) = &bracket.children[0] else {
        panic!("single-staff part should be a staff definition");
    };
    assert_eq!(voice.label.as_deref(), Some("Voice"));
    assert_eq!(voice.label_abbr.as_deref(), Some("V."));
    let StaffGroupChild::Group(piano) = &bracket.children[1] else {
        panic!("two-staff part should be a group");
    };
    assert_eq!(piano.symbol, Some(GroupSymbol::Brace));
    assert_eq!(piano.label.as_deref(), Some("Piano"));
    assert_eq!(piano.label_abbr.as_deref(), Some("Pno."));
    assert!(piano.bar_thru);
    assert!(matches!(&root[1], StaffGroupChild::StaffDef(def) if def.n == 4 && def.clef_shape == Some(ClefShape::F)));

    assert_eq!(score.measure_count(), 2);
    for measure in &score.section.measures {
        let staves: Vec<u32> = measure.staves.iter().map(|s| s.n).collect();
        assert_eq!(staves, vec![1, 2, 3, 4]);
    }
}

#[test]
fn part_without_attributes_is_skipped() {
    let xml = score(
        r#"<score-part id="P1"><part-name>A</part-name></score-part>
           <score-part id="P2"><part-name>B</part-name></score-part>
           <score-part id="P9"><part-name>Ghost</part-name></score-part>"#,
        r#"<part id="P1"><measure number="1"><note><rest/><duration>4</duration></note></measure></part>
           <part id="P2"><measure number="1"><attributes><divisions>1</divisions></attributes><note><rest/><duration>4</duration></note></measure></part>"#,
    );
    let result = import(&xml);
    let defs = result.score.staff_grp.staff_defs();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].n, 1);
    assert_eq!(defs[0].label.as_deref(), Some("B"));
    assert_eq!(result.score.measure_count(), 1);

    let messages: Vec<&str> = result.warnings.iter().map(|w| w.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Could not find the 'attributes' element in the first measure of part 'P1'",
            "Could not find the part 'P9'",
        ]
    );
    assert!(result.warnings.iter().all(|w| w.kind == WarningKind::Missing));
}

// ─── Voices and durations ────────────────────────────────────────────

fn quarters(dur: Option<Duration>, dots: u8) -> f64 {
    let base = dur.and_then(Duration::quarters).unwrap_or(0.0);
    base * (2.0 - 0.5f64.powi(dots as i32))
}

/// Length of a layer in quarter notes; notes inside a chord count once.
fn layer_length(elements: &[LayerElement]) -> f64 {
    elements
        .iter()
        .map(|e| match e {
            LayerElement::Note(n) => quarters(n.dur, n.dots),
            LayerElement::Rest(r) => quarters(r.dur, r.dots),
            LayerElement::Space(s) => quarters(s.dur, 0),
            LayerElement::Chord(c) => quarters(c.dur, c.dots),
            LayerElement::Beam(b) => layer_length(&b.children),
            _ => 0.0,
        })
        .sum()
}

#[test]
fn every_voice_fills_the_measure() {
    let xml = single_part(
        &format!(
            r#"{}{}{}<note><rest/><duration>1</duration><voice>1</voice><type>quarter</type></note>
               <backup><duration>4</duration></backup>
               <forward><duration>2</duration><voice>2</voice></forward>
               {}"#,
            pitched("C", 5, "half", "<voice>1</voice>"),
            pitched("E", 4, "quarter", "<voice>1</voice>"),
            pitched("G", 4, "quarter", "<chord/><voice>1</voice>"),
            pitched("A", 3, "half", "<voice>2</voice>"),
        ),
        "",
    );
    let result = import(&xml);
    assert!(result.warnings.is_empty(), "unexpected warnings: {:?}", result.warnings);

    let staff = &result.score.section.measures[0].staves[0];
    assert_eq!(staff.layers.len(), 2);
    for layer in &staff.layers {
        assert_eq!(layer_length(&layer.elements), 4.0, "voice {}", layer.n);
    }
}

#[test]
fn chord_owns_its_notes() {
    let xml = single_part(
        &format!(
            "{}{}",
            pitched("C", 4, "quarter", "<dot/>"),
            pitched("E", 4, "quarter", "<chord/><dot/>"),
        ),
        "",
    );
    let result = import(&xml);
    let elements = &result.score.section.measures[0].staves[0].layers[0].elements;
    assert_eq!(elements.len(), 1);
    let LayerElement::Chord(chord) = &elements[0] else {
        panic!("expected a chord");
    };
    assert_eq!(chord.dur, Some(Duration::Quarter));
    assert_eq!(chord.dots, 1);
    assert_eq!(chord.children.len(), 2);
    for child in &chord.children {
        let LayerElement::Note(note) = child else {
            panic!("chord should only hold notes");
        };
        assert_eq!(note.dur, None);
        assert_eq!(note.dots, 0);
    }
}

// ─── Spanners ────────────────────────────────────────────────────────

#[test]
fn tie_across_a_barline() {
    let xml = single_part(
        &pitched("C", 4, "whole", r#"<notations><tied type="start"/></notations>"#),
        &format!(
            r#"<measure number="2">{}</measure>"#,
            pitched("C", 4, "whole", r#"<notations><tied type="stop"/></notations>"#)
        ),
    );
    let result = import(&xml);
    assert!(result.warnings.is_empty(), "unexpected warnings: {:?}", result.warnings);

    let measures = &result.score.section.measures;
    let first = notes(&measures[0])[0];
    let second = notes(&measures[1])[0];
    let ties = controls_named(&measures[0], "tie");
    assert_eq!(ties.len(), 1);
    assert_eq!(ties[0].start_id, reference(first));
    assert_eq!(ties[0].end_id, reference(second));
    assert!(measures[1].control_elements.is_empty());
}

#[test]
fn octave_shift_moves_enclosed_notes() {
    let xml = single_part(
        &format!(
            r#"<direction placement="below"><direction-type><octave-shift type="down" size="8"/></direction-type></direction>
               {}{}{}
               <direction><direction-type><octave-shift type="stop" size="8"/></direction-type></direction>
               {}"#,
            pitched("C", 5, "quarter", ""),
            pitched("D", 5, "quarter", ""),
            pitched("E", 5, "quarter", ""),
            pitched("F", 5, "quarter", ""),
        ),
        "",
    );
    let result = import(&xml);
    assert!(result.warnings.is_empty(), "unexpected warnings: {:?}", result.warnings);

    let measure = &result.score.section.measures[0];
    let notes = notes(measure);
    for note in &notes[..3] {
        assert_eq!(note.oct, Some(4));
        assert_eq!(note.oct_ges, Some(5));
    }
    assert_eq!(notes[3].oct, Some(5));
    assert_eq!(notes[3].oct_ges, None);

    let octaves = controls_named(measure, "octave");
    assert_eq!(octaves.len(), 1);
    let octave = octaves[0];
    assert_eq!(octave.start_id, reference(notes[0]));
    assert_eq!(octave.end_id, reference(notes[2]));
    assert_eq!(octave.staff, vec![1]);
    assert_eq!(
        octave.kind,
        ControlKind::Octave {
            dis: Some(OctaveDis::Eight),
            dis_place: Some(Place::Below),
        }
    );
}

#[test]
fn hairpin_ends_on_last_note_before_its_stop() {
    let xml = single_part(
        &format!(
            r#"<direction placement="below"><direction-type><wedge type="crescendo"/></direction-type></direction>
               {}{}
               <direction><direction-type><wedge type="stop"/></direction-type></direction>
               {}"#,
            pitched("C", 4, "quarter", ""),
            pitched("D", 4, "quarter", ""),
            pitched("E", 4, "half", ""),
        ),
        "",
    );
    let result = import(&xml);
    let measure = &result.score.section.measures[0];
    let notes = notes(measure);
    let hairpins = controls_named(measure, "hairpin");
    assert_eq!(hairpins.len(), 1);
    assert_eq!(hairpins[0].start_id, reference(notes[0]));
    assert_eq!(hairpins[0].end_id, reference(notes[1]));
    assert_eq!(hairpins[0].place, Some(Place::Below));
    assert_eq!(
        hairpins[0].kind,
        ControlKind::Hairpin {
            form: Some(HairpinForm::Crescendo)
        }
    );
}

#[test]
fn unmatched_slur_stop_only_warns() {
    let xml = single_part(
        &pitched("C", 4, "whole", r#"<notations><slur type="stop" number="2"/></notations>"#),
        "",
    );
    let result = import(&xml);
    assert_eq!(result.score.control_elements().count(), 0);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, WarningKind::Unmatched);
    assert_eq!(result.warnings[0].measure, Some(1));
}

// ─── Annotations waiting for the next note ───────────────────────────

#[test]
fn pending_annotations_attach_to_the_next_note() {
    let xml = single_part(
        &format!(
            r#"<direction placement="below">
                 <direction-type><words font-style="italic">dolce</words></direction-type>
                 <direction-type><dynamics><mf/></dynamics></direction-type>
               </direction>
               <harmony><root><root-step>B</root-step><root-alter>-1</root-alter></root><kind text="m7">minor-seventh</kind></harmony>
               {}{}"#,
            pitched("C", 4, "half", ""),
            pitched("D", 4, "half", ""),
        ),
        "",
    );
    let result = import(&xml);
    assert!(result.warnings.is_empty(), "unexpected warnings: {:?}", result.warnings);

    let measure = &result.score.section.measures[0];
    let first = notes(measure)[0];
    let names: Vec<&str> = measure.control_elements.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["dir", "dynam", "harm"]);
    for control in &measure.control_elements {
        assert_eq!(control.start_id, reference(first));
        assert_eq!(control.staff, vec![1]);
    }

    let ControlKind::Dir { text, .. } = &measure.control_elements[0].kind else {
        panic!("expected a directive");
    };
    assert_eq!(text[0].text, "dolce");
    assert_eq!(
        text[0].rend.as_ref().and_then(|r| r.font_style.as_deref()),
        Some("italic")
    );
    assert_eq!(
        measure.control_elements[1].kind,
        ControlKind::Dynam { text: "mf".into() }
    );
    assert_eq!(
        measure.control_elements[2].kind,
        ControlKind::Harm {
            text: "B\u{266d}m7".into(),
            harm_type: None,
        }
    );
}

#[test]
fn pedal_release_belongs_to_previous_note() {
    let xml = single_part(
        &format!(
            r#"<direction><direction-type><pedal type="start"/></direction-type></direction>
               {}{}
               <direction><direction-type><pedal type="stop"/></direction-type></direction>
               {}"#,
            pitched("C", 4, "quarter", ""),
            pitched("D", 4, "quarter", ""),
            pitched("E", 4, "half", ""),
        ),
        "",
    );
    let result = import(&xml);
    let measure = &result.score.section.measures[0];
    let notes = notes(measure);
    let pedals = controls_named(measure, "pedal");
    assert_eq!(pedals.len(), 2);
    assert_eq!(pedals[0].kind, ControlKind::Pedal { dir: Some(PedalDir::Down) });
    assert_eq!(pedals[0].start_id, reference(notes[0]));
    assert_eq!(pedals[1].kind, ControlKind::Pedal { dir: Some(PedalDir::Up) });
    assert_eq!(pedals[1].start_id, reference(notes[1]));
}

#[test]
fn metronome_becomes_tempo() {
    let xml = single_part(
        &format!(
            r#"<direction placement="above">
                 <direction-type><metronome parentheses="no"><beat-unit>quarter</beat-unit><beat-unit-dot/><per-minute>72</per-minute></metronome></direction-type>
                 <sound tempo="108"/>
               </direction>
               {}"#,
            pitched("C", 4, "whole", ""),
        ),
        "",
    );
    let result = import(&xml);
    let measure = &result.score.section.measures[0];
    let tempos = controls_named(measure, "tempo");
    assert_eq!(tempos.len(), 1);
    let ControlKind::Tempo {
        text,
        mm,
        mm_unit,
        mm_dots,
        ..
    } = &tempos[0].kind
    else {
        panic!("expected a tempo");
    };
    assert_eq!(text.last().map(|t| t.text.as_str()), Some("M.M. = 72"));
    assert_eq!(mm.as_deref(), Some("72"));
    assert_eq!(*mm_unit, Some(Duration::Quarter));
    assert_eq!(*mm_dots, Some(1));
    assert!(controls_named(measure, "dir").is_empty());
}

#[test]
fn control_element_without_target_measure_is_dropped() {
    let xml = score(
        r#"<score-part id="P1"><part-name>A</part-name></score-part>
           <score-part id="P2"><part-name>B</part-name></score-part>"#,
        &format!(
            r#"<part id="P1"><measure number="1"><attributes><divisions>1</divisions></attributes>{}</measure></part>
               <part id="P2"><measure number="7"><attributes><divisions>1</divisions></attributes>
                 <direction><direction-type><words>solo</words></direction-type></direction>{}</measure></part>"#,
            pitched("C", 4, "whole", ""),
            pitched("C", 3, "whole", ""),
        ),
    );
    let result = import(&xml);
    assert_eq!(result.score.measure_count(), 1);
    assert_eq!(result.score.control_elements().count(), 0);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(
        result.warnings[0].message,
        "Element 'dir' could not be added to measure '7'"
    );
}

// ─── Header, vocabulary and ids ──────────────────────────────────────

#[test]
fn header_title_and_tempo() {
    let xml = score(
        r#"<score-part id="P1"><part-name>A</part-name></score-part>"#,
        r#"<part id="P1"><measure number="1"><attributes><divisions>1</divisions></attributes><sound tempo="96"/></measure></part>"#,
    )
    .replace("<part-list>", "<work><work-title>Etude</work-title></work><part-list>");
    let result = import(&xml);
    assert_eq!(result.score.title.as_deref(), Some("Etude"));
    assert_eq!(result.score.midi_bpm, Some(96));
}

#[test]
fn unknown_note_type_warns_once_with_measure() {
    let xml = single_part(
        "",
        r#"<measure number="2"><note><pitch><step>C</step><octave>4</octave></pitch><duration>4</duration><type>bogus</type></note></measure>"#,
    );
    let result = import(&xml);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, WarningKind::UnknownValue);
    assert_eq!(result.warnings[0].measure, Some(2));
    assert_eq!(notes(&result.score.section.measures[1])[0].dur, None);
}

#[test]
fn huge_durations_saturate_instead_of_overflowing() {
    let note = r#"<note><pitch><step>C</step><octave>4</octave></pitch><duration>2000000000</duration><type>whole</type></note>"#;
    let xml = single_part(&format!("{note}{note}"), "");
    let result = import(&xml);
    assert_eq!(notes(&result.score.section.measures[0]).len(), 2);
}

#[test]
fn unsupported_octave_shift_size_is_skipped() {
    let xml = single_part(
        &format!(
            r#"<direction><direction-type><octave-shift type="up" size="2147483647"/></direction-type></direction>{}"#,
            pitched("C", 4, "whole", "")
        ),
        "",
    );
    let result = import(&xml);
    let measure = &result.score.section.measures[0];
    assert!(controls_named(measure, "octave").is_empty());
    assert_eq!(notes(measure)[0].oct, Some(4));
    assert_eq!(notes(measure)[0].oct_ges, None);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::UnknownValue && w.message.contains("octave-shift")));
}

#[test]
fn long_forward_gap_is_cut() {
    let xml = single_part(
        &format!(
            r#"<forward><duration>2000000</duration><voice>1</voice></forward>{}"#,
            pitched("C", 4, "quarter", "<voice>1</voice>")
        ),
        "",
    );
    let result = import(&xml);
    let layer = &result.score.section.measures[0].staves[0].layers[0];
    let spaces = layer
        .elements
        .iter()
        .filter(|e| matches!(e, LayerElement::Space(_)))
        .count();
    assert_eq!(spaces, 32);
    assert!(result.warnings.iter().any(|w| w.kind == WarningKind::OutOfRange));
}

#[test]
fn ids_are_deterministic_and_prefixed() {
    let xml = single_part(&pitched("C", 4, "whole", ""), "");
    let first = score_to_json(&import(&xml).score).unwrap();
    let second = score_to_json(&import(&xml).score).unwrap();
    assert_eq!(first, second);

    let options = ImportOptions {
        id_prefix: "a-".into(),
        ..Default::default()
    };
    let result = import_str_with_options(&xml, options).unwrap();
    let note = notes(&result.score.section.measures[0])[0];
    assert!(note.id.starts_with("a-note-"), "id was {}", note.id);
}

// ─── Entry points ────────────────────────────────────────────────────

fn mxl(xml: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("META-INF/container.xml", options).unwrap();
    writer
        .write_all(br#"<container><rootfiles><rootfile full-path="score.musicxml"/></rootfiles></container>"#)
        .unwrap();
    writer.start_file("score.musicxml", options).unwrap();
    writer.write_all(xml.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[test]
fn bytes_are_detected_by_extension_or_content() {
    let xml = single_part(&pitched("C", 4, "whole", ""), "");
    let archive = mxl(&xml);

    let from_mxl = import_bytes(&archive, Some("mxl")).unwrap();
    assert_eq!(from_mxl.score.measure_count(), 1);
    let sniffed_zip = import_bytes(&archive, None).unwrap();
    assert_eq!(sniffed_zip.score.measure_count(), 1);
    let sniffed_xml = import_bytes(xml.as_bytes(), None).unwrap();
    assert_eq!(sniffed_xml.score.measure_count(), 1);

    assert!(matches!(
        import_bytes(&[0xff, 0xfe, 0x00], Some("musicxml")),
        Err(ImportError::Utf8(_))
    ));
    assert!(matches!(
        import_bytes(b"garbage", None),
        Err(ImportError::Archive(_))
    ));
}

#[test]
fn file_import_into_a_document() {
    let path = std::env::temp_dir().join(format!("scoreimport-{}.musicxml", std::process::id()));
    std::fs::write(&path, single_part(&pitched("C", 4, "whole", ""), "")).unwrap();

    let mut doc = FlatDocument::default();
    {
        let mut input = MusicXmlInput::new(&mut doc);
        assert!(!input.import_file(path.with_extension("missing")));
        assert!(input.import_file(&path));
    }
    std::fs::remove_file(&path).unwrap();

    assert_eq!(doc.page_conversions, 1);
    let score = doc.score.expect("score should be installed");
    assert_eq!(score.measure_count(), 1);

    assert!(matches!(
        import_file("/nonexistent/score.musicxml"),
        Err(ImportError::Io { .. })
    ));
}

#[test]
fn failed_import_leaves_document_untouched() {
    let mut doc = FlatDocument::default();
    let mut input = MusicXmlInput::new(&mut doc);
    assert!(!input.import_string("<score-timewise/>"));
    assert!(doc.score.is_none());
    assert_eq!(doc.page_conversions, 0);
}

#[test]
fn json_export() {
    let result = import(&single_part(&pitched("C", 4, "whole", ""), ""));
    let json = score_to_json(&result.score).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["section"]["measures"][0]["n"], 1);
    assert_eq!(value["staff_grp"]["children"][0]["StaffDef"]["label"], "Flute");
}
