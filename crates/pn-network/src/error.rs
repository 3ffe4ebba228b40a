//! Network-specific error types.

use pn_core::{Id, NodeId, PnError, PoreId};

/// Network construction and validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// The builder produced no elements.
    Empty,

    /// A pore refers to a node that doesn't exist.
    InvalidNodeRef { pore: PoreId, node: NodeId },

    /// A pore has no endpoint at all.
    DanglingPore { pore: PoreId },

    /// A pore connects a node to itself.
    SelfLoop { pore: PoreId },

    /// A geometric quantity is non-positive or non-finite.
    InvalidGeometry {
        what: &'static str,
        element: Id,
        value: f64,
    },

    /// Boundary pore length cannot be derived from coordinates.
    MissingLength { pore: PoreId },

    /// An element violates the closed-element invariant.
    ClosedInvariant { element: Id },

    /// ID not found.
    IdNotFound { what: &'static str },

    /// More elements than an `Id` can address.
    TooManyElements { count: usize },
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::Empty => write!(f, "Network has no elements"),
            NetworkError::InvalidNodeRef { pore, node } => {
                write!(f, "Pore {} refers to non-existent node {}", pore, node)
            }
            NetworkError::DanglingPore { pore } => {
                write!(f, "Pore {} has no endpoint nodes", pore)
            }
            NetworkError::SelfLoop { pore } => {
                write!(f, "Pore {} connects a node to itself", pore)
            }
            NetworkError::InvalidGeometry {
                what,
                element,
                value,
            } => {
                write!(f, "Element {} has invalid {}: {}", element, what, value)
            }
            NetworkError::MissingLength { pore } => {
                write!(
                    f,
                    "Boundary pore {} needs an explicit length (no domain face to measure from)",
                    pore
                )
            }
            NetworkError::ClosedInvariant { element } => {
                write!(f, "Element {} violates the closed-element invariant", element)
            }
            NetworkError::IdNotFound { what } => write!(f, "{} not found", what),
            NetworkError::TooManyElements { count } => {
                write!(f, "Network has {} elements, more than ids can address", count)
            }
        }
    }
}

impl std::error::Error for NetworkError {}

pub type NetworkResult<T> = Result<T, NetworkError>;

impl From<NetworkError> for PnError {
    fn from(err: NetworkError) -> Self {
        PnError::Invariant {
            what: err.to_string(),
        }
    }
}
