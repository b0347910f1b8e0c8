//! Voice/layer resolution and element attachment.
//!
//! A measure under translation always holds at least one staff (one per
//! staff declared by the part). Layers are created on first reference.

use roxmltree::Node;

use crate::context::ImportContext;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::model::{Layer, LayerElement, Measure, Staff};
use crate::nesting::{children_at, LayerRef, NestingStack, OpenContainer};
use crate::xml;

// ─── Fallback rules ──────────────────────────────────────────────────

/// Zero-based staff index for a part-local staff number, `None` when the
/// number falls outside `1..=staff_count`.
pub fn clamp_staff(requested: i32, staff_count: usize) -> Option<usize> {
    if requested < 1 || requested as usize > staff_count {
        return None;
    }
    Some(requested as usize - 1)
}

/// Voice number, `None` when it is not a positive number.
pub fn clamp_voice(requested: i32) -> Option<u32> {
    u32::try_from(requested).ok().filter(|&v| v >= 1)
}

fn staff_index(requested: i32, measure: &Measure, diag: &mut Diagnostics) -> usize {
    clamp_staff(requested, measure.staves.len()).unwrap_or_else(|| {
        diag.warn(
            WarningKind::OutOfRange,
            format!("Staff {requested} cannot be found"),
        );
        0
    })
}

// ─── Selection ───────────────────────────────────────────────────────

/// Layer addressed by the `<staff>` and `<voice>` children of a note,
/// forward or backup. A missing staff means 1, a missing voice means the
/// first existing layer of the staff.
pub fn select_layer(node: &Node, measure: &mut Measure, diag: &mut Diagnostics) -> LayerRef {
    let staff_text = xml::child_text(*node, "staff");
    let staff_n = if staff_text.is_empty() {
        1
    } else {
        xml::leading_int(staff_text)
    };
    let staff = staff_index(staff_n, measure, diag);

    let voice_text = xml::child_text(*node, "voice");
    let voice = if voice_text.is_empty() {
        None
    } else {
        let requested = xml::leading_int(voice_text);
        Some(clamp_voice(requested).unwrap_or_else(|| {
            diag.warn(
                WarningKind::OutOfRange,
                format!("Voice {requested} cannot be found"),
            );
            1
        }))
    };

    let layer = layer_in_staff(&mut measure.staves[staff], voice);
    LayerRef { staff, layer }
}

/// First layer of a part-local staff, created as layer 1 if the staff is empty.
pub fn select_first_layer(staff_n: i32, measure: &mut Measure, diag: &mut Diagnostics) -> LayerRef {
    let staff = staff_index(staff_n, measure, diag);
    let layer = layer_in_staff(&mut measure.staves[staff], None);
    LayerRef { staff, layer }
}

/// Index of the layer numbered `voice` (or the first one), creating it when absent.
fn layer_in_staff(staff: &mut Staff, voice: Option<u32>) -> usize {
    let found = match voice {
        Some(n) => staff.layers.iter().position(|l| l.n == n),
        None if staff.layers.is_empty() => None,
        None => Some(0),
    };
    found.unwrap_or_else(|| {
        staff.layers.push(Layer {
            n: voice.unwrap_or(1),
            elements: Vec::new(),
        });
        staff.layers.len() - 1
    })
}

pub fn layer_mut(measure: &mut Measure, at: LayerRef) -> &mut Layer {
    &mut measure.staves[at.staff].layers[at.layer]
}

/// Global staff number and voice number of a layer.
pub fn layer_numbers(measure: &Measure, at: LayerRef) -> (u32, u32) {
    let staff = &measure.staves[at.staff];
    (staff.n, staff.layers[at.layer].n)
}

// ─── Attachment ──────────────────────────────────────────────────────

/// Append `element` to the innermost open container of its layer, or to
/// the layer itself. Containers are pushed onto the nesting stack.
///
/// Returns the path of the new element within the layer.
pub fn add_layer_element(
    measure: &mut Measure,
    nesting: &mut NestingStack,
    at: LayerRef,
    element: LayerElement,
    diag: &mut Diagnostics,
) -> Vec<usize> {
    let kind = element.container_kind();
    let parent = nesting
        .innermost(at)
        .map(|open| open.path.clone())
        .unwrap_or_default();

    let layer = layer_mut(measure, at);
    let path = match children_at(&mut layer.elements, &parent) {
        Some(children) => {
            children.push(element);
            let mut path = parent;
            path.push(children.len() - 1);
            path
        }
        None => {
            diag.warn(
                WarningKind::Structure,
                format!("Open container in layer {} is gone, attaching to the layer", layer.n),
            );
            layer.elements.push(element);
            vec![layer.elements.len() - 1]
        }
    };

    if let Some(kind) = kind {
        nesting.push(OpenContainer {
            kind,
            layer: at,
            path: path.clone(),
        });
    }
    path
}

/// [`add_layer_element`] with the context's nesting stack and diagnostics.
pub fn attach(measure: &mut Measure, ctx: &mut ImportContext, at: LayerRef, element: LayerElement) -> Vec<usize> {
    add_layer_element(measure, &mut ctx.nesting, at, element, &mut ctx.diag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Beam, ContainerKind, Note};
    use crate::nesting::element_at;

    fn measure(staves: u32) -> Measure {
        Measure {
            n: 1,
            staves: (1..=staves)
                .map(|n| Staff {
                    n,
                    layers: Vec::new(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn note(id: &str) -> LayerElement {
        LayerElement::Note(Note {
            id: id.into(),
            ..Default::default()
        })
    }

    #[test]
    fn clamp_rules() {
        assert_eq!(clamp_staff(1, 2), Some(0));
        assert_eq!(clamp_staff(2, 2), Some(1));
        assert_eq!(clamp_staff(3, 2), None);
        assert_eq!(clamp_staff(0, 2), None);
        assert_eq!(clamp_voice(2), Some(2));
        assert_eq!(clamp_voice(0), None);
        assert_eq!(clamp_voice(-3), None);
    }

    #[test]
    fn layers_are_created_on_first_use() {
        let doc = roxmltree::Document::parse("<note><staff>2</staff><voice>5</voice></note>").unwrap();
        let mut m = measure(2);
        let mut diag = Diagnostics::new();

        let at = select_layer(&doc.root_element(), &mut m, &mut diag);
        assert_eq!(at, LayerRef { staff: 1, layer: 0 });
        assert_eq!(layer_numbers(&m, at), (2, 5));

        let again = select_layer(&doc.root_element(), &mut m, &mut diag);
        assert_eq!(again, at);
        assert_eq!(m.staves[1].layers.len(), 1);
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn missing_voice_takes_first_existing_layer() {
        let mut m = measure(1);
        m.staves[0].layers.push(Layer { n: 3, elements: Vec::new() });
        let doc = roxmltree::Document::parse("<forward><duration>4</duration></forward>").unwrap();
        let mut diag = Diagnostics::new();

        let at = select_layer(&doc.root_element(), &mut m, &mut diag);
        assert_eq!(layer_numbers(&m, at), (1, 3));
    }

    #[test]
    fn out_of_range_staff_falls_back_to_first() {
        let doc = roxmltree::Document::parse("<note><staff>4</staff><voice>0</voice></note>").unwrap();
        let mut m = measure(2);
        let mut diag = Diagnostics::new();

        let at = select_layer(&doc.root_element(), &mut m, &mut diag);
        assert_eq!(layer_numbers(&m, at), (1, 1));
        assert_eq!(diag.count(WarningKind::OutOfRange), 2);
    }

    #[test]
    fn elements_attach_to_innermost_container_of_their_layer() {
        let mut m = measure(1);
        let mut nesting = NestingStack::default();
        let mut diag = Diagnostics::new();
        let l1 = LayerRef { staff: 0, layer: 0 };
        select_first_layer(1, &mut m, &mut diag);

        let beam = LayerElement::Beam(Beam {
            id: "beam-1".into(),
            children: Vec::new(),
        });
        assert_eq!(add_layer_element(&mut m, &mut nesting, l1, beam, &mut diag), vec![0]);
        assert!(nesting.innermost_is(l1, ContainerKind::Beam));
        assert_eq!(add_layer_element(&mut m, &mut nesting, l1, note("note-2"), &mut diag), vec![0, 0]);
        assert_eq!(add_layer_element(&mut m, &mut nesting, l1, note("note-3"), &mut diag), vec![0, 1]);

        nesting.close(l1, ContainerKind::Beam);
        assert_eq!(add_layer_element(&mut m, &mut nesting, l1, note("note-4"), &mut diag), vec![1]);

        let elements = &m.staves[0].layers[0].elements;
        assert_eq!(element_at(elements, &[0, 1]).map(|e| e.id()), Some("note-3"));
        assert!(diag.warnings().is_empty());
    }
}
