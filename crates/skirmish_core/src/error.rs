//! Error types for the skirmish simulation.

use thiserror::Error;

use crate::math::Fixed;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
///
/// Missing content, unreachable targets and out-of-bounds terrain
/// queries are recovered inside the core and never show up here.
#[derive(Debug, Error)]
pub enum GameError {
    /// No unit template is registered under this name.
    #[error("Unknown unit template: {0}")]
    UnknownTemplate(String),

    /// Team index outside {0, 1}.
    #[error("Invalid team: {0}")]
    InvalidTeam(u8),

    /// Explicit placement outside the grid.
    #[error("Cell ({col}, {row}) is outside the grid")]
    CellOutOfBounds {
        /// Column requested.
        col: i32,
        /// Row requested.
        row: i32,
    },

    /// Not enough elixir to deploy.
    #[error("Insufficient elixir: need {required}, have {available}")]
    InsufficientElixir {
        /// Deployment cost.
        required: Fixed,
        /// Current pool.
        available: Fixed,
    },

    /// Invalid unit identifier.
    #[error("Unit not found: {0}")]
    UnitNotFound(u32),

    /// Invalid structure identifier.
    #[error("Structure not found: {0}")]
    StructureNotFound(u32),

    /// Overlay tile map does not match the grid shape.
    #[error("Overlay is {cols}x{rows}, grid is {expected_cols}x{expected_rows}")]
    OverlayDimensions {
        /// Grid column count.
        expected_cols: usize,
        /// Grid row count.
        expected_rows: usize,
        /// Overlay column count.
        cols: usize,
        /// Overlay row count.
        rows: usize,
    },

    /// Content or config text failed to parse.
    #[error("Failed to parse '{source_name}': {message}")]
    DataParseError {
        /// Where the text came from.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Invalid match state.
    #[error("Invalid match state: {0}")]
    InvalidState(String),
}

impl GameError {
    /// Wrap a RON parse failure.
    pub(crate) fn parse(source_name: &str, err: &ron::error::SpannedError) -> Self {
        Self::DataParseError {
            source_name: source_name.to_string(),
            message: err.to_string(),
        }
    }
}
