use eframe::egui::{Pos2, Vec2, pos2};

/// Drag-to-reposition state machine, one instance per floating panel.
///
/// Two states: Idle (`drag_offset == None`) and Dragging. On drag start the
/// vector from the panel's top-left corner to the pointer is frozen; every
/// subsequent pointer position maps straight to `pointer - offset`, so the
/// panel never drifts no matter how move events are coalesced. Releasing the
/// pointer anywhere ends the drag.
///
/// The controller is pure state: the frontend feeds it pointer events and
/// must only poll global pointer input on frames where `is_dragging()` holds.
#[derive(Clone, Debug)]
pub struct PanelController {
    position: Pos2,
    drag_offset: Option<Vec2>,
}

impl PanelController {
    pub fn new(position: Pos2) -> Self {
        Self { position, drag_offset: None }
    }

    // Default anchor: offset in from the viewport's top-right corner. The
    // viewport size is injected so positioning stays testable without a
    // real display.
    pub fn anchored_top_right(viewport: Vec2, from_right: f32, top: f32) -> Self {
        Self::new(pos2((viewport.x - from_right).max(0.0), top))
    }

    pub fn position(&self) -> Pos2 {
        self.position
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_offset.is_some()
    }

    // Idle -> Dragging; freezes the pointer-to-corner offset for the whole
    // drag. A second down-event mid-drag keeps the original offset.
    pub fn begin_drag(&mut self, pointer: Pos2) {
        if self.drag_offset.is_none() {
            self.drag_offset = Some(pointer - self.position);
        }
    }

    // Position is a function of the current pointer and the frozen offset
    // only, never of the previous position. No-op while Idle.
    pub fn drag_to(&mut self, pointer: Pos2) {
        if let Some(offset) = self.drag_offset {
            self.position = pointer - offset;
        }
    }

    // Dragging -> Idle, from any exit path (release, panel close, teardown)
    pub fn end_drag(&mut self) {
        self.drag_offset = None;
    }

    pub fn reset(&mut self, position: Pos2) {
        self.position = position;
        self.drag_offset = None;
    }
}
