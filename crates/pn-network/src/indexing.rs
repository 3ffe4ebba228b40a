//! Stable indexing for solver integration.
//!
//! Maps the node subset taking part in a pressure solve to contiguous solver
//! ranks (0..N) and back.

use pn_core::NodeId;

use crate::element::Element;
use crate::error::{NetworkError, NetworkResult};
use crate::network::Network;

/// Bidirectional map between node ids and solver ranks.
#[derive(Debug, Clone, Default)]
pub struct RankMap {
    /// rank -> NodeId
    node_ids: Vec<NodeId>,
    /// NodeId -> rank, sized to the network node count
    node_to_rank: Vec<Option<usize>>,
}

impl RankMap {
    /// Rank the open nodes satisfying `predicate`, in ascending id order.
    pub fn from_network<F>(network: &Network, predicate: F) -> Self
    where
        F: Fn(&Element) -> bool,
    {
        let mut node_ids = Vec::new();
        let mut node_to_rank = vec![None; network.node_count()];
        for node in network.nodes().iter().filter(|n| n.is_open() && predicate(n)) {
            node_to_rank[node.id.idx()] = Some(node_ids.len());
            node_ids.push(node.id);
        }
        Self {
            node_ids,
            node_to_rank,
        }
    }

    /// Number of ranked nodes (system size).
    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    /// Rank of `id`, or `None` if the node is not an unknown.
    pub fn rank(&self, id: NodeId) -> Option<usize> {
        self.node_to_rank.get(id.idx()).copied().flatten()
    }

    /// Rank of `id`, failing if the node is not ranked.
    pub fn require_rank(&self, id: NodeId) -> NetworkResult<usize> {
        self.rank(id).ok_or(NetworkError::IdNotFound { what: "NodeId" })
    }

    /// Node at `rank` (panics if out of bounds).
    pub fn node_id(&self, rank: usize) -> NodeId {
        self.node_ids[rank]
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{NetworkBuilder, NodeSpec, PoreSpec};
    use crate::element::CIRCLE_SHAPE_FACTOR;

    #[test]
    fn ranks_are_contiguous() {
        let mut b = NetworkBuilder::new();
        let spec = |x: f64| NodeSpec::new([x, 0.0, 0.0], 1e-5, CIRCLE_SHAPE_FACTOR);
        let n0 = b.add_node(spec(1e-4));
        let n1 = b.add_node(spec(2e-4));
        let n2 = b.add_node(spec(3e-4));
        b.add_pore(Some(n0), Some(n1), PoreSpec::new(5e-6, CIRCLE_SHAPE_FACTOR));
        b.add_pore(Some(n1), Some(n2), PoreSpec::new(5e-6, CIRCLE_SHAPE_FACTOR));
        b.close_node(n1);
        let net = b.build().unwrap();

        let ranks = RankMap::from_network(&net, |_| true);
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks.rank(n0), Some(0));
        assert_eq!(ranks.rank(n1), None);
        assert_eq!(ranks.rank(n2), Some(1));
        assert_eq!(ranks.node_id(1), n2);
        assert!(ranks.require_rank(NodeId::from_index(99)).is_err());
    }
}
