//! Static staff definitions from the first measure of a part.

use roxmltree::Node;

use crate::context::ImportContext;
use crate::diagnostics::WarningKind;
use crate::lookup;
use crate::model::*;
use crate::xml;

/// Read the leading `attributes` run of a part's first measure into one
/// [`StaffDef`] per declared staff, numbered from `staff_offset + 1`.
///
/// `barline`, `print` and `sound` may be interleaved; any other element
/// ends the run. Every `attributes` read here is marked consumed so the
/// measure translator does not apply it a second time.
pub fn read_part_attributes(first_measure: &Node, staff_offset: u32, ctx: &mut ImportContext) -> Vec<StaffDef> {
    let mut nb_staves = 1usize;
    let mut defs: Vec<StaffDef> = Vec::new();

    for child in first_measure.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "attributes" => {}
            "barline" | "print" | "sound" => continue,
            _ => break,
        }
        ctx.consumed.insert(child.id());

        if let Some(staves) = xml::child_i32(child, "staves") {
            nb_staves = if staves > 0 { staves as usize } else { 1 };
        }
        for i in 0..nb_staves {
            if defs.len() <= i {
                defs.push(new_staff_def(staff_offset + i as u32 + 1, ctx));
            }
            read_staff_attributes(&child, i + 1, &mut defs[i], ctx);
        }

        if let Some(divisions) = xml::child(child, "divisions") {
            set_divisions(xml::leading_int(xml::text(divisions)), ctx);
        }
    }

    while defs.len() < nb_staves {
        defs.push(new_staff_def(staff_offset + defs.len() as u32 + 1, ctx));
    }
    for def in &mut defs {
        def.ppq = Some(ctx.ppq);
    }
    defs
}

fn new_staff_def(n: u32, ctx: &ImportContext) -> StaffDef {
    StaffDef {
        n,
        lines: ctx.options.default_staff_lines,
        ..Default::default()
    }
}

/// Update the time unit; non-positive values are ignored.
pub fn set_divisions(divisions: i32, ctx: &mut ImportContext) {
    if divisions > 0 {
        ctx.ppq = divisions;
    } else {
        ctx.diag.warn(
            WarningKind::UnknownValue,
            format!("Unsupported divisions value '{divisions}'"),
        );
    }
}

/// Apply one `attributes` element to the staff with part-local number `local_n`,
/// preferring elements numbered for that staff.
fn read_staff_attributes(attributes: &Node, local_n: usize, def: &mut StaffDef, ctx: &mut ImportContext) {
    if let Some(clef) = xml::numbered_child(*attributes, "clef", local_n) {
        read_clef(&clef, def, ctx);
    }
    if let Some(key) = xml::numbered_child(*attributes, "key", local_n) {
        read_key(&key, def, ctx);
    }
    if let Some(details) = xml::numbered_child(*attributes, "staff-details", local_n) {
        read_staff_details(&details, def);
    }
    if let Some(time) = xml::numbered_child(*attributes, "time", local_n) {
        read_time(&time, def, ctx);
    }
    if let Some(transpose) = xml::numbered_child(*attributes, "transpose", local_n) {
        def.trans_diat = Some(xml::leading_int(xml::child_text(transpose, "diatonic")));
        def.trans_semi = Some(xml::leading_int(xml::child_text(transpose, "chromatic")));
    }
}

fn read_clef(clef: &Node, def: &mut StaffDef, ctx: &mut ImportContext) {
    let sign = xml::child_text(*clef, "sign");
    if !sign.is_empty() {
        def.clef_shape = lookup::clef_shape(sign, &mut ctx.diag);
    }
    let line = xml::child_text(*clef, "line");
    if !line.is_empty() {
        def.clef_line = u8::try_from(xml::leading_int(line)).ok();
    }
    let change = xml::child_text(*clef, "clef-octave-change");
    if !change.is_empty() {
        let (dis, place) = lookup::clef_dis_value(xml::leading_int(change));
        def.clef_dis = dis;
        def.clef_dis_place = place;
    }
}

fn read_key(key: &Node, def: &mut StaffDef, ctx: &mut ImportContext) {
    if let Some(fifths) = xml::child(*key, "fifths") {
        let fifths = xml::leading_int(xml::text(fifths)).clamp(-7, 7);
        def.key_sig = Some(KeySignature::Fifths(fifths as i8));
    } else if xml::has_child(*key, "key-step") {
        def.key_sig = Some(KeySignature::Mixed);
    }
    if let Some(mode) = xml::child(*key, "mode") {
        def.key_mode = lookup::mode(xml::text(mode), &mut ctx.diag);
    }
}

fn read_staff_details(details: &Node, def: &mut StaffDef) {
    let lines = xml::child_text(*details, "staff-lines");
    if !lines.is_empty() {
        if let Ok(lines) = u8::try_from(xml::leading_int(lines)) {
            def.lines = lines;
        }
    }
    let size = xml::child_text(*details, "staff-size");
    if !size.is_empty() {
        def.scale = u32::try_from(xml::leading_int(size)).ok();
    }
    if xml::has_child(*details, "staff-tuning") {
        def.notation_type = Some(NotationType::Tablature);
    }
}

fn read_time(time: &Node, def: &mut StaffDef, ctx: &mut ImportContext) {
    match xml::attr(*time, "symbol") {
        "" => {}
        "common" => def.meter_sym = Some(MeterSymbol::Common),
        "cut" => def.meter_sym = Some(MeterSymbol::Cut),
        "single-number" => def.meter_rend = Some(MeterRendition::Numerator),
        _ => def.meter_rend = Some(MeterRendition::Normal),
    }

    if xml::children(*time, "beats").count() > 1 {
        ctx.diag.warn(
            WarningKind::Unsupported,
            "Compound meter signatures are not supported",
        );
    }
    let beats = xml::child_text(*time, "beats");
    if !beats.is_empty() {
        let count = meter_count_value(beats);
        if beats.contains('+') {
            ctx.diag.warn(WarningKind::Unsupported, "Compound time is not supported");
        }
        ctx.meter_count = count;
        def.meter_count = Some(count);
    }
    let beat_type = xml::child_text(*time, "beat-type");
    if !beat_type.is_empty() {
        def.meter_unit = Some(xml::leading_int(beat_type));
    }
}

/// Beat count of a `<beats>` value. Additive meters like `3+2` keep the
/// first term plus the number after the first `+`.
pub fn meter_count_value(beats: &str) -> i32 {
    let first = xml::leading_int(beats);
    match beats.find('+') {
        Some(pos) => first.saturating_add(xml::leading_int(&beats[pos..])),
        None => first,
    }
}
