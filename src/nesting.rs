//! Stack of open grouping containers (chord, beam, tuplet, tremolo).
//!
//! Containers live inside the layer tree; the stack only remembers where
//! they are, as a path of child indices from the layer root. Layer trees
//! only grow by appending during a measure, so paths stay valid until the
//! stack is cleared at the next measure.

use crate::model::{ContainerKind, LayerElement};

/// Position of a layer inside the measure being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerRef {
    /// Index into `Measure::staves`
    pub staff: usize,
    /// Index into `Staff::layers`
    pub layer: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenContainer {
    pub kind: ContainerKind,
    pub layer: LayerRef,
    /// Child indices from the layer's element list down to the container
    pub path: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct NestingStack {
    entries: Vec<OpenContainer>,
}

impl NestingStack {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn push(&mut self, container: OpenContainer) {
        self.entries.push(container);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Innermost open container of `layer`, where new events attach.
    pub fn innermost(&self, layer: LayerRef) -> Option<&OpenContainer> {
        self.entries.iter().rev().find(|c| c.layer == layer)
    }

    pub fn innermost_is(&self, layer: LayerRef, kind: ContainerKind) -> bool {
        self.innermost(layer).is_some_and(|c| c.kind == kind)
    }

    /// Remove the nearest open container of `kind` on `layer`, searching from
    /// the top. Entries above it stay where they are.
    pub fn close(&mut self, layer: LayerRef, kind: ContainerKind) -> Option<OpenContainer> {
        let pos = self
            .entries
            .iter()
            .rposition(|c| c.layer == layer && c.kind == kind)?;
        Some(self.entries.remove(pos))
    }
}

/// Child list reached by following `path` from a layer's element list.
pub fn children_at<'a>(
    elements: &'a mut Vec<LayerElement>,
    path: &[usize],
) -> Option<&'a mut Vec<LayerElement>> {
    let mut current = elements;
    for &idx in path {
        current = current.get_mut(idx)?.children_mut()?;
    }
    Some(current)
}

/// Element at `path`, if any.
#[cfg(test)]
pub fn element_at<'a>(elements: &'a [LayerElement], path: &[usize]) -> Option<&'a LayerElement> {
    let (last, parents) = path.split_last()?;
    let mut current = elements;
    for &idx in parents {
        current = current.get(idx)?.children()?;
    }
    current.get(*last)
}
