//! Error type shared by every stage of script-path spend construction.

use thiserror::Error;

/// Errors raised while building a taptree, its control blocks or a spend.
///
/// Every variant is raised at the point of detection and propagated
/// unchanged; nothing is retried since all inputs are caller-supplied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpendError {
    /// Malformed leaf policy or key encoding.
    #[error("Invalid leaf policy: {0}")]
    Policy(String),

    /// Empty leaf set or an unrepresentable tree shape.
    #[error("Invalid taptree: {0}")]
    Tree(String),

    #[error("Leaf index {index} out of range (tree has {leaves} leaves)")]
    Index { index: usize, leaves: usize },

    /// Invalid curve point or degenerate tweak.
    #[error("Curve operation failed: {0}")]
    Crypto(String),

    /// A signature or auxiliary value required by the chosen leaf is absent.
    #[error("Missing {0}")]
    MissingData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Signer error: {0}")]
    Signer(String),
}

pub type Result<T> = std::result::Result<T, SpendError>;
