use crate::interaction::Affordance;
use crate::photos::{ImageRef, Texture};
use std::sync::Arc;

/// Photo currently open in the viewer
#[derive(Debug, Clone)]
pub struct ViewedPhoto {
    pub image: ImageRef,
    pub texture: Arc<Texture>,
}

/// Application state
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Enable debug mode
    pub debug: bool,
    /// Simulation paused
    pub paused: bool,
    /// Photo shown full screen, if any
    pub viewing: Option<ViewedPhoto>,
    /// Pointer style last requested by the scene
    pub affordance: Affordance,
    /// Leave the main loop
    pub quit: bool,
}
