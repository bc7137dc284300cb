use crate::photos::{ImageRef, PhotoBoard};

/// Pointer style the UI layer should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Affordance {
    /// Something clickable is under the pointer
    Pointer,
    #[default]
    Default,
}

/// Hover and click handling for the photo frames.
///
/// Hit testing happens in the scene; this only tracks which slot is
/// hovered and decides what a click emits.
#[derive(Debug, Clone, Default)]
pub struct PhotoInteraction {
    hovered: Option<usize>,
}

impl PhotoInteraction {
    pub fn new() -> Self {
        PhotoInteraction::default()
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Updates the hovered slot. Returns the affordance change, if any.
    pub fn pointer_moved(
        &mut self,
        hit: Option<usize>,
        board: &mut PhotoBoard,
    ) -> Option<Affordance> {
        if hit == self.hovered {
            return None;
        }
        let was_hovering = self.hovered.is_some();
        self.hovered = hit;
        board.set_hovered(hit);
        match (was_hovering, hit.is_some()) {
            (false, true) => Some(Affordance::Pointer),
            (true, false) => Some(Affordance::Default),
            _ => None,
        }
    }

    /// Image to hand to the viewer, only when the clicked slot has finished loading
    pub fn click(&self, hit: Option<usize>, board: &PhotoBoard) -> Option<ImageRef> {
        let image = hit
            .and_then(|slot| board.slot(slot))
            .and_then(|slot| slot.loaded_image())
            .cloned();
        if let Some(image) = &image {
            log::info!("photo clicked: {image}");
        }
        image
    }

    /// Clears any hover; the default affordance is always restored
    pub fn teardown(&mut self, board: &mut PhotoBoard) -> Affordance {
        if self.hovered.take().is_some() {
            board.set_hovered(None);
        }
        Affordance::Default
    }
}
