//! A particle Christmas tree rendered in the terminal.
//!
//! Thousands of ornaments, photo frames and spiral stars morph between a
//! scattered sphere and an assembled cone. The morph engine is driven by an
//! explicit time step and is independent of the terminal front end.

pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graphics;
pub mod interaction;
pub mod math;
pub mod morph;
pub mod music;
pub mod particle;
pub mod photos;
pub mod scene;
pub mod state;
pub mod terminal;
pub mod vertex;
pub mod widget;

pub use config::{Cli, Config, MorphTarget};
pub use error::{Result, TreeError};
pub use morph::MorphEngine;
pub use scene::Scene;
