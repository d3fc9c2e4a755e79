// ============================================================================
// LAYERS — paintable surfaces + the ordered layer stack
// ============================================================================
//
// Layers are addressed by `LayerId`, never by index: the stack reorders and
// reallocates on insert/delete, so selection state must survive by id.
// Index 0 is the bottom of the stack (painted first).

use std::fmt;

use crate::error::PaintError;
use crate::surface::Surface;

/// Permanent handle to a layer.  Never reused within one canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u32);

impl LayerId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic id source owned by one layer stack.
#[derive(Debug)]
pub struct LayerIdAllocator {
    next: u32,
}

impl LayerIdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> LayerId {
        let id = LayerId(self.next);
        self.next += 1;
        id
    }
}

impl Default for LayerIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Layer {
    id: LayerId,
    name: String,
    visible: bool,
    alpha_locked: bool,
    surface: Surface,
}

impl Layer {
    fn new(id: LayerId, surface: Surface) -> Self {
        Self {
            id,
            name: format!("Layer {}", id),
            visible: true,
            alpha_locked: false,
            surface,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_alpha_locked(&self) -> bool {
        self.alpha_locked
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub(crate) fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn info(&self) -> LayerInfo {
        LayerInfo {
            id: self.id,
            name: self.name.clone(),
            visible: self.visible,
            alpha_locked: self.alpha_locked,
        }
    }
}

/// Snapshot of a layer's metadata for UI lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerInfo {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    pub alpha_locked: bool,
}

// ============================================================================
// LAYER STACK
// ============================================================================

pub struct LayerStack {
    layers: Vec<Layer>,
    ids: LayerIdAllocator,
    width: u32,
    height: u32,
}

impl LayerStack {
    /// Empty stack whose layers will be `width`×`height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            layers: Vec::new(),
            ids: LayerIdAllocator::new(),
            width,
            height,
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Bottom to top.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Layer> + '_ {
        self.layers.iter()
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Allocate a new layer directly above `selected`, or on top when there
    /// is no selection or the selected id no longer exists.
    pub fn insert_above(&mut self, selected: Option<LayerId>) -> Result<LayerId, PaintError> {
        let surface = Surface::new(self.width, self.height)?;
        let id = self.ids.allocate();
        let layer = Layer::new(id, surface);

        match selected.and_then(|sel| self.index_of(sel)) {
            Some(index) => self.layers.insert(index + 1, layer),
            None => self.layers.push(layer),
        }
        Ok(id)
    }

    /// Remove the selected layer and return the selection that should
    /// replace it:
    /// * `None` once the stack is empty,
    /// * otherwise the layer now at the deleted index, or the new top layer
    ///   when the deleted one was on top.
    ///
    /// A missing selection or an unknown id leaves the stack alone and hands
    /// the selection back unchanged.
    pub fn delete(&mut self, selected: Option<LayerId>) -> Option<LayerId> {
        let id = selected?;
        let Some(index) = self.index_of(id) else {
            return selected;
        };
        self.layers.remove(index);

        if self.layers.is_empty() {
            return None;
        }
        let successor = index.min(self.layers.len() - 1);
        Some(self.layers[successor].id)
    }

    /// Shift a layer by `delta` places (positive = towards the top), clamped
    /// to the stack.  Returns whether anything moved.
    pub fn move_by(&mut self, id: LayerId, delta: isize) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let last = self.layers.len() as isize - 1;
        let target = (index as isize).saturating_add(delta).clamp(0, last) as usize;
        if target == index {
            return false;
        }
        let layer = self.layers.remove(index);
        self.layers.insert(target, layer);
        true
    }

    pub fn set_visibility(&mut self, id: LayerId, visible: bool) {
        if let Some(layer) = self.get_mut(id) {
            layer.visible = visible;
        }
    }

    pub fn set_alpha_lock(&mut self, id: LayerId, locked: bool) {
        if let Some(layer) = self.get_mut(id) {
            layer.alpha_locked = locked;
        }
    }

    pub fn rename(&mut self, id: LayerId, name: &str) {
        if let Some(layer) = self.get_mut(id) {
            layer.name = name.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ids(stack: &LayerStack) -> Vec<u32> {
        stack.iter().map(|l| l.id().get()).collect()
    }

    #[test]
    fn new_layers_get_default_metadata() {
        let mut stack = LayerStack::new(8, 8);
        let id = stack.insert_above(None).unwrap();
        let layer = stack.get(id).unwrap();
        assert_eq!(layer.name(), "Layer 1");
        assert!(layer.is_visible());
        assert!(!layer.is_alpha_locked());
        assert_eq!(layer.surface().size(), (8, 8));
    }

    #[test]
    fn insert_goes_directly_above_selection() {
        let mut stack = LayerStack::new(4, 4);
        let a = stack.insert_above(None).unwrap();
        let b = stack.insert_above(Some(a)).unwrap();
        let c = stack.insert_above(Some(a)).unwrap();
        assert_eq!(ids(&stack), vec![a.get(), c.get(), b.get()]);
        // Unknown selection appends on top.
        let d = stack.insert_above(Some(LayerId(999))).unwrap();
        assert_eq!(stack.index_of(d), Some(3));
    }

    #[test]
    fn insert_without_selection_appends_on_top() {
        let mut stack = LayerStack::new(4, 4);
        let a = stack.insert_above(None).unwrap();
        let b = stack.insert_above(Some(a)).unwrap();
        let c = stack.insert_above(Some(a)).unwrap();
        assert_eq!(ids(&stack), vec![a.get(), c.get(), b.get()]);

        let e = stack.insert_above(None).unwrap();
        assert_eq!(stack.index_of(e), Some(stack.len() - 1));
        assert_eq!(ids(&stack), vec![a.get(), c.get(), b.get(), e.get()]);
    }

    #[test]
    fn failed_allocation_does_not_burn_an_id() {
        let mut stack = LayerStack::new(0, 4);
        assert!(stack.insert_above(None).is_err());
        assert!(stack.is_empty());
    }

    #[test]
    fn delete_successor_rules() {
        let mut stack = LayerStack::new(4, 4);
        let a = stack.insert_above(None).unwrap();
        let b = stack.insert_above(Some(a)).unwrap();
        let c = stack.insert_above(Some(b)).unwrap();
        let d = stack.insert_above(Some(c)).unwrap();

        // Middle: the layer that slid into the same index.
        assert_eq!(stack.delete(Some(b)), Some(c));
        // First: the new first layer.
        assert_eq!(stack.delete(Some(a)), Some(c));
        // Top: nothing at that index any more, fall back to the new top.
        assert_eq!(stack.delete(Some(d)), Some(c));
        // Last one standing.
        assert_eq!(stack.delete(Some(c)), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn delete_without_match_is_a_no_op() {
        let mut stack = LayerStack::new(4, 4);
        let a = stack.insert_above(None).unwrap();
        assert_eq!(stack.delete(None), None);
        assert_eq!(stack.delete(Some(LayerId(77))), Some(LayerId(77)));
        assert_eq!(ids(&stack), vec![a.get()]);
    }

    #[test]
    fn ids_stay_unique_across_churn() {
        let mut stack = LayerStack::new(2, 2);
        let mut seen = HashSet::new();
        let mut selected = None;
        for round in 0..40 {
            if round % 3 == 2 {
                selected = stack.delete(selected);
            } else {
                let id = stack.insert_above(selected).unwrap();
                assert!(seen.insert(id), "id {} reused", id);
                selected = Some(id);
            }
            let live: HashSet<_> = stack.iter().map(|l| l.id()).collect();
            assert_eq!(live.len(), stack.len());
        }
    }

    #[test]
    fn move_is_clamped_to_bounds() {
        let mut stack = LayerStack::new(2, 2);
        let a = stack.insert_above(None).unwrap();
        let b = stack.insert_above(Some(a)).unwrap();
        let c = stack.insert_above(Some(b)).unwrap();

        assert!(!stack.move_by(c, 1));
        assert!(stack.move_by(a, 10));
        assert_eq!(ids(&stack), vec![b.get(), c.get(), a.get()]);
        assert!(stack.move_by(a, -1));
        assert_eq!(ids(&stack), vec![b.get(), a.get(), c.get()]);
        assert!(!stack.move_by(LayerId(50), 1));
    }

    #[test]
    fn setters_ignore_unknown_ids() {
        let mut stack = LayerStack::new(2, 2);
        let a = stack.insert_above(None).unwrap();
        stack.set_visibility(a, false);
        stack.set_visibility(a, false);
        stack.set_alpha_lock(a, true);
        stack.set_visibility(LayerId(42), true);
        stack.rename(a, "Ink");
        let info = stack.get(a).unwrap().info();
        assert_eq!(
            info,
            LayerInfo { id: a, name: "Ink".into(), visible: false, alpha_locked: true }
        );
    }
}
