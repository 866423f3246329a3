//! Error types for the trigger efficiency core

use thiserror::Error;

/// mtrcore error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The efficiency flag of a hit pattern is not one of the four known categories
    #[error("invalid crossed-elements category: {0}")]
    InvalidCategory(u16),

    /// RPC index outside the partition
    #[error("invalid RPC index: {0}")]
    InvalidRpc(u16),

    /// Local board outside 1..=234
    #[error("invalid local board: {0}")]
    InvalidBoard(u32),

    /// Detector element or plane absent from the efficiency source
    #[error("no efficiency data for detElemId {det_elem_id}, board {board}, plane {plane}")]
    MissingEfficiencyData {
        det_elem_id: u32,
        board: u32,
        plane: &'static str,
    },

    /// Efficiency outside [0, 1]
    #[error("efficiency {value} out of range for detElemId {det_elem_id}, board {board}, plane {plane}")]
    InvalidEfficiencyValue {
        det_elem_id: u32,
        board: u32,
        plane: &'static str,
        value: f64,
    },

    /// A per-plane vector does not hold one value per local board
    #[error("expected {expected} board efficiencies, found {found}")]
    BoardCount { expected: usize, found: usize },

    /// Local board to RPC partition is inconsistent
    #[error("invalid RPC partition: {0}")]
    InvalidPartition(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
