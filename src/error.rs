use std::path::PathBuf;

/// Errors raised while setting up the tree or talking to the terminal
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A photo could not be decoded
    #[error("Failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A photo decoded to zero pixels
    #[error("Image has no pixels: {}", .0.display())]
    EmptyImage(PathBuf),

    /// Configuration rejected before any group is built
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background track could not be opened or played
    #[error("Audio error: {0}")]
    Audio(String),

    /// Terminal setup or teardown failed
    #[error("Terminal error: {0}")]
    Terminal(String),
}

/// Result type for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;
