//! Connectivity clustering.
//!
//! Partitions the elements selected by a predicate into connected components
//! using union-find over pore/node adjacency. Clusters are numbered in
//! ascending order of their smallest element id, which is also the cluster
//! representative, so rerunning a pass on an unchanged network reproduces the
//! same partition and the same cluster ids.

use petgraph::unionfind::UnionFind;
use pn_core::timing::{Timer, engine_timing};
use pn_core::{ClusterId, ElementId};

use crate::element::{ClusterSlot, Element};
use crate::network::Network;

/// One connected component of predicate-selected elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    /// Smallest element id in the cluster
    pub representative: ElementId,
    pub size: usize,
    /// Touches the inlet face
    pub inlet: bool,
    /// Touches the outlet face
    pub outlet: bool,
    /// Summed element volume (m³)
    pub volume: f64,
}

impl Cluster {
    /// Touches both the inlet and the outlet.
    pub fn spanning(&self) -> bool {
        self.inlet && self.outlet
    }
}

/// Clusters produced by the latest pass for one [`ClusterSlot`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRegistry {
    slot: ClusterSlot,
    clusters: Vec<Cluster>,
}

impl ClusterRegistry {
    pub fn empty(slot: ClusterSlot) -> Self {
        Self {
            slot,
            clusters: Vec::new(),
        }
    }

    pub fn slot(&self) -> ClusterSlot {
        self.slot
    }

    pub fn clear(&mut self) {
        self.clusters.clear();
    }

    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.idx())
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Clusters touching both faces.
    pub fn spanning(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|c| c.spanning())
    }
}

/// Partition the open elements satisfying `predicate` into clusters, record
/// them in `slot`'s registry and write each element's back-reference.
///
/// Non-selected elements get `None` in `slot`. Returns the cluster count.
pub fn cluster_elements<F>(network: &mut Network, slot: ClusterSlot, predicate: F) -> usize
where
    F: Fn(&Element) -> bool,
{
    let timer = Timer::start();

    let n = network.element_count();
    let selected: Vec<bool> = network
        .elements()
        .iter()
        .map(|e| e.is_open() && predicate(e))
        .collect();

    // Every edge joins a pore to one of its endpoint nodes.
    let mut uf = UnionFind::<usize>::new(n);
    for pore in network.pores() {
        let p = pore.abs_id.idx();
        if !selected[p] {
            continue;
        }
        for node in pore.neighbors() {
            if selected[node.idx()] {
                uf.union(p, node.idx());
            }
        }
    }
    let labels = uf.into_labeling();

    let mut root_to_cluster: Vec<Option<usize>> = vec![None; n];
    let mut assignment: Vec<Option<usize>> = vec![None; n];
    let mut clusters: Vec<Cluster> = Vec::new();
    for (i, element) in network.elements().iter().enumerate() {
        if !selected[i] {
            continue;
        }
        let root = labels[i];
        let c = match root_to_cluster[root] {
            Some(c) => c,
            None => {
                let c = clusters.len();
                clusters.push(Cluster {
                    id: ClusterId::from_usize(c),
                    representative: element.abs_id,
                    size: 0,
                    inlet: false,
                    outlet: false,
                    volume: 0.0,
                });
                root_to_cluster[root] = Some(c);
                c
            }
        };
        let cluster = &mut clusters[c];
        cluster.size += 1;
        cluster.inlet |= element.inlet;
        cluster.outlet |= element.outlet;
        cluster.volume += element.geometry.volume;
        assignment[i] = Some(c);
    }

    for (element, c) in network.elements_mut().iter_mut().zip(&assignment) {
        element
            .state
            .clusters
            .set(slot, c.map(ClusterId::from_usize));
    }

    let count = clusters.len();
    let registry = network.registry_mut(slot);
    registry.clusters = clusters;

    timer.stop_into(&engine_timing::CLUSTERING);
    count
}

/// Drop every back-reference and cluster for `slot`.
pub fn clear_slot(network: &mut Network, slot: ClusterSlot) {
    for element in network.elements_mut() {
        element.state.clusters.set(slot, None);
    }
    network.registry_mut(slot).clear();
}
