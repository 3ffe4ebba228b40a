//! pn-network: pore network model for porenet.
//!
//! Provides:
//! - Capillary element records (nodes and pores) and the network that owns them
//! - Incremental network builder with validation, plus a regular lattice generator
//! - Connectivity clustering with per-slot cluster registries
//! - Stable node ranking for solver integration
//!
//! # Example
//!
//! ```
//! use pn_network::{ClusterSlot, NetworkBuilder, NodeSpec, PoreSpec, cluster_elements};
//! use pn_network::element::CIRCLE_SHAPE_FACTOR;
//!
//! let mut builder = NetworkBuilder::new();
//! let n1 = builder.add_node(NodeSpec::new([1e-4, 0.0, 0.0], 1e-5, CIRCLE_SHAPE_FACTOR));
//! let n2 = builder.add_node(NodeSpec::new([2e-4, 0.0, 0.0], 1e-5, CIRCLE_SHAPE_FACTOR));
//! builder.add_pore(None, Some(n1), PoreSpec::new(5e-6, CIRCLE_SHAPE_FACTOR));
//! builder.add_pore(Some(n1), Some(n2), PoreSpec::new(5e-6, CIRCLE_SHAPE_FACTOR));
//! builder.add_pore(Some(n2), None, PoreSpec::new(5e-6, CIRCLE_SHAPE_FACTOR));
//! builder.set_extents([3e-4, 1e-4, 1e-4]);
//! let mut network = builder.build().unwrap();
//!
//! assert_eq!(network.node_count(), 2);
//! assert_eq!(cluster_elements(&mut network, ClusterSlot::Active, |_| true), 1);
//! ```

pub mod builder;
pub mod cluster;
pub mod element;
pub mod error;
pub mod indexing;
pub mod lattice;
pub mod network;
pub(crate) mod validate;

// Re-exports for ergonomics
pub use builder::{NetworkBuilder, NodeSpec, PoreSpec};
pub use cluster::{Cluster, ClusterRegistry, clear_slot, cluster_elements};
pub use element::{
    ClusterSlot, Element, ElementKind, ElementState, Geometry, NodeExt, Phase, PoreExt,
    ShapeClass, Wettability,
};
pub use error::{NetworkError, NetworkResult};
pub use indexing::RankMap;
pub use lattice::RegularLattice;
pub use network::{Network, VolumeTotals};
