//! Measure translation: dispatch each child of a `<measure>` in document
//! order, keeping the duration cursor and nesting stack up to date.

use roxmltree::Node;

use crate::attributes::set_divisions;
use crate::context::ImportContext;
use crate::cursor::filler_durations;
use crate::diagnostics::WarningKind;
use crate::direction::{fermata_element, read_direction, read_harmony};
use crate::layer::{self, attach};
use crate::lookup;
use crate::model::*;
use crate::nesting::LayerRef;
use crate::note::read_note;
use crate::xml;

/// Translate one measure of a part whose staves are numbered from
/// `staff_offset + 1`.
pub fn read_measure(node: &Node, nb_staves: usize, staff_offset: u32, ctx: &mut ImportContext) -> Measure {
    let n = xml::leading_int(xml::attr(*node, "number"));
    let mut measure = Measure {
        n,
        staves: (0..nb_staves)
            .map(|i| Staff {
                n: staff_offset + i as u32 + 1,
                layers: Vec::new(),
            })
            .collect(),
        ..Default::default()
    };
    ctx.begin_measure(n);

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "attributes" => read_attributes(&child, &mut measure, ctx),
            "backup" => read_backup(&child, &mut measure, ctx),
            "barline" => read_barline(&child, &mut measure, ctx),
            "direction" => read_direction(&child, &measure, ctx),
            "forward" => read_forward(&child, &mut measure, ctx),
            "harmony" => read_harmony(&child, &measure, ctx),
            "note" => read_note(&child, &mut measure, ctx),
            // system and page breaks belong to layout
            "print" => {}
            _ => {}
        }
    }
    measure
}

// ─── Attributes ──────────────────────────────────────────────────────

/// Mid-measure attribute changes: divisions, clef and measure-repeat mode.
///
/// Attributes already turned into staff definitions only toggle the
/// measure-repeat mode.
fn read_attributes(node: &Node, measure: &mut Measure, ctx: &mut ImportContext) {
    if !ctx.consumed.contains(&node.id()) {
        if let Some(divisions) = xml::child(*node, "divisions") {
            set_divisions(xml::leading_int(xml::text(divisions)), ctx);
        }
        if let Some(clef) = xml::child(*node, "clef") {
            read_clef_change(&clef, measure, ctx);
        }
    }

    if let Some(repeat) = xml::path(*node, &["measure-style", "measure-repeat"]) {
        ctx.measure_repeat = xml::attr_is(repeat, "type", "start");
    }
}

fn read_clef_change(clef: &Node, measure: &mut Measure, ctx: &mut ImportContext) {
    let sign = xml::child_text(*clef, "sign");
    let line = xml::child_text(*clef, "line");
    if sign.is_empty() || line.is_empty() {
        return;
    }
    let number = xml::attr(*clef, "number");
    let staff_n = if number.is_empty() { 1 } else { xml::leading_int(number) };
    let at = layer::select_first_layer(staff_n, measure, &mut ctx.diag);

    let (dis, dis_place) = lookup::clef_dis_value(xml::leading_int(xml::child_text(*clef, "clef-octave-change")));
    let change = ClefChange {
        id: ctx.ids.next("clef"),
        shape: lookup::clef_shape(sign, &mut ctx.diag),
        line: u8::try_from(xml::leading_int(line)).ok(),
        dis,
        dis_place,
    };
    attach(measure, ctx, at, LayerElement::Clef(change));
}

// ─── Time shifts ─────────────────────────────────────────────────────

/// Rewind the cursor. When a note follows and the cursor is still past the
/// start of the measure, the voice of that note is padded up to the cursor.
fn read_backup(node: &Node, measure: &mut Measure, ctx: &mut ImportContext) {
    ctx.cursor
        .rewind(xml::leading_int(xml::child_text(*node, "duration")));

    let Some(next) = xml::following_sibling(*node, "note") else {
        return;
    };
    let position = ctx.cursor.position();
    if position > 0 {
        let at = if xml::has_child(*node, "voice") {
            layer::select_layer(node, measure, &mut ctx.diag)
        } else {
            layer::select_layer(&next, measure, &mut ctx.diag)
        };
        fill_space(measure, ctx, at, position);
    }
}

/// Advance the cursor and pad the voice with spacers. A forward with no
/// note before or after it stands for a voice that is silent for the
/// whole measure.
fn read_forward(node: &Node, measure: &mut Measure, ctx: &mut ImportContext) {
    let duration = xml::leading_int(xml::child_text(*node, "duration"));
    ctx.cursor.advance(duration);

    let mut at = layer::select_layer(node, measure, &mut ctx.diag);
    if let Some(next) = xml::following_sibling(*node, "note") {
        if !xml::has_child(*node, "voice") {
            at = layer::select_layer(&next, measure, &mut ctx.diag);
        }
        fill_space(measure, ctx, at, duration);
    } else if xml::preceding_sibling(*node, "note").is_none() && xml::preceding_sibling(*node, "backup").is_none() {
        let rest = LayerElement::MeasureRest(MeasureRest {
            id: ctx.ids.next("mRest"),
            visible: Some(false),
            ..Default::default()
        });
        attach(measure, ctx, at, rest);
    }
}

/// Append invisible spacers covering `gap` divisions to a layer.
pub fn fill_space(measure: &mut Measure, ctx: &mut ImportContext, at: LayerRef, gap: i32) {
    let max_gap = i64::from(ctx.ppq.max(1)) * i64::from(ctx.options.max_gap_quarters);
    let gap = if i64::from(gap) > max_gap {
        ctx.diag.warn(
            WarningKind::OutOfRange,
            format!(
                "Gap of {gap} divisions is longer than {} quarters and was cut",
                ctx.options.max_gap_quarters
            ),
        );
        max_gap as i32
    } else {
        gap
    };
    let filler = filler_durations(gap, ctx.ppq, ctx.options.max_filler_quarters);
    for dur in filler.durations {
        let space = LayerElement::Space(Space {
            id: ctx.ids.next("space"),
            dur: Some(dur),
        });
        attach(measure, ctx, at, space);
    }
    if filler.remainder > 0 {
        ctx.diag.warn(
            WarningKind::OutOfRange,
            format!("{} divisions are too short to be filled", filler.remainder),
        );
    }
}

// ─── Barline ─────────────────────────────────────────────────────────

fn read_barline(node: &Node, measure: &mut Measure, ctx: &mut ImportContext) {
    let location = xml::attr(*node, "location");
    if location == "middle" {
        ctx.diag.warn(
            WarningKind::Unsupported,
            "Unsupported barline location 'middle'",
        );
    }

    let style = xml::child_text(*node, "bar-style");
    let repeat = xml::has_child(*node, "repeat");
    if !style.is_empty() {
        let rend = lookup::bar_rendition(style, repeat, &mut ctx.diag);
        match location {
            "left" => measure.left = rend,
            "middle" => {}
            _ => measure.right = rend,
        }
    }

    if xml::has_child(*node, "ending") {
        ctx.diag.warn(WarningKind::Unsupported, "Endings not supported");
    }

    if let Some(fermata) = xml::child(*node, "fermata") {
        let mut element = fermata_element(&fermata, ctx);
        element.tstamp = match location {
            "left" => Some(0.0),
            "middle" => None,
            _ => Some(f64::from(ctx.meter_count.saturating_add(1))),
        };
        if let Some(staff) = measure.staves.first() {
            element.staff = vec![staff.n];
        }
        ctx.resolver.add(measure.n, element);
    }
}
