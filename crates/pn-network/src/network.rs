//! The network graph model.

use pn_core::{ElementId, Id, NodeId, PoreId};

use crate::cluster::{Cluster, ClusterRegistry};
use crate::element::{ClusterSlot, Element, ElementState, Phase, Wettability};
use crate::error::{NetworkError, NetworkResult};

/// Aggregate volumes cached at build time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VolumeTotals {
    /// Volume of open nodes (m³)
    pub node_volume: f64,
    /// Volume of open pores (m³)
    pub pore_volume: f64,
}

impl VolumeTotals {
    pub fn total(&self) -> f64 {
        self.node_volume + self.pore_volume
    }
}

/// A validated pore network.
///
/// Elements are stored contiguously, nodes first: node `i` has absolute id `i`,
/// pore `j` has absolute id `node_count + j`. Topology (adjacency, endpoints,
/// boundary flags) is frozen at build time; simulation fields are mutable.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) elements: Vec<Element>,
    pub(crate) node_count: usize,
    pub(crate) extents: [f64; 3],
    pub(crate) is_2d: bool,
    pub(crate) max_coordination: usize,
    pub(crate) inlet_elements: Vec<ElementId>,
    pub(crate) outlet_elements: Vec<ElementId>,
    pub(crate) totals: VolumeTotals,
    pub(crate) registries: Vec<ClusterRegistry>,
}

impl Network {
    /// Return all elements (nodes then pores).
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Mutable access to element records. Topology fields stay private.
    pub fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn pore_count(&self) -> usize {
        self.elements.len() - self.node_count
    }

    /// Node elements.
    pub fn nodes(&self) -> &[Element] {
        &self.elements[..self.node_count]
    }

    /// Pore elements.
    pub fn pores(&self) -> &[Element] {
        &self.elements[self.node_count..]
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.idx())
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.idx())
    }

    /// Absolute id of node `id`.
    pub fn node_abs(&self, id: NodeId) -> ElementId {
        id
    }

    /// Absolute id of pore `id`.
    pub fn pore_abs(&self, id: PoreId) -> ElementId {
        Id::from_usize(self.node_count + id.idx())
    }

    pub fn node(&self, id: NodeId) -> Option<&Element> {
        if id.idx() < self.node_count {
            self.elements.get(id.idx())
        } else {
            None
        }
    }

    pub fn pore(&self, id: PoreId) -> Option<&Element> {
        self.elements.get(self.node_count + id.idx())
    }

    /// Absolute ids adjacent to `id` (empty if unknown).
    pub fn neighbors(&self, id: ElementId) -> &[ElementId] {
        self.element(id).map_or(&[], |e| e.neighbors())
    }

    /// Elements touching the inlet face.
    pub fn inlet_elements(&self) -> &[ElementId] {
        &self.inlet_elements
    }

    /// Elements touching the outlet face.
    pub fn outlet_elements(&self) -> &[ElementId] {
        &self.outlet_elements
    }

    /// Domain extents along x, y, z (m).
    pub fn extents(&self) -> [f64; 3] {
        self.extents
    }

    /// Cross-section normal to the main flow direction (m²).
    pub fn cross_section_area(&self) -> f64 {
        self.extents[1] * self.extents[2]
    }

    pub fn is_2d(&self) -> bool {
        self.is_2d
    }

    pub fn max_coordination(&self) -> usize {
        self.max_coordination
    }

    pub fn totals(&self) -> VolumeTotals {
        self.totals
    }

    /// Total open volume (m³).
    pub fn total_volume(&self) -> f64 {
        self.totals.total()
    }

    /// Volume-weighted water saturation over open elements.
    pub fn water_saturation(&self) -> f64 {
        self.saturation(Phase::Water)
    }

    pub fn oil_saturation(&self) -> f64 {
        self.saturation(Phase::Oil)
    }

    fn saturation(&self, phase: Phase) -> f64 {
        let total = self.total_volume();
        if total <= 0.0 {
            return 0.0;
        }
        let held: f64 = self
            .elements
            .iter()
            .filter(|e| e.is_open())
            .map(|e| e.state.fraction(phase) * e.geometry.volume)
            .sum();
        held / total
    }

    /// Volume-weighted mean tracer concentration over open elements.
    pub fn mean_concentration(&self) -> f64 {
        let total = self.total_volume();
        if total <= 0.0 {
            return 0.0;
        }
        let held: f64 = self
            .elements
            .iter()
            .filter(|e| e.is_open())
            .map(|e| e.state.concentration * e.geometry.volume)
            .sum();
        held / total
    }

    /// Close an element and refresh the cached totals.
    pub fn close_element(&mut self, id: ElementId) -> NetworkResult<()> {
        let element = self
            .elements
            .get_mut(id.idx())
            .ok_or(NetworkError::IdNotFound { what: "ElementId" })?;
        element.close();
        self.totals = compute_totals(&self.elements);
        Ok(())
    }

    /// Verify the closed-element invariant on every element.
    pub fn check_closed_invariant(&self) -> NetworkResult<()> {
        match self.elements.iter().find(|e| !e.closed_invariant_holds()) {
            Some(e) => Err(NetworkError::ClosedInvariant { element: e.abs_id }),
            None => Ok(()),
        }
    }

    /// Reset every open element to a fully saturated, uniformly wetted state.
    pub fn saturate(&mut self, phase: Phase, wettability: Wettability, contact_angle: f64) {
        for element in self.elements.iter_mut().filter(|e| e.is_open()) {
            element.state = ElementState {
                wettability,
                contact_angle,
                original_contact_angle: contact_angle,
                ..ElementState::default()
            };
            element.fill(phase);
        }
        for registry in &mut self.registries {
            registry.clear();
        }
    }

    /// Registry produced by the last clustering pass for `slot`.
    pub fn registry(&self, slot: ClusterSlot) -> &ClusterRegistry {
        &self.registries[slot.index()]
    }

    pub(crate) fn registry_mut(&mut self, slot: ClusterSlot) -> &mut ClusterRegistry {
        &mut self.registries[slot.index()]
    }

    /// Cluster holding `id` in `slot`, if any.
    pub fn cluster_of(&self, id: ElementId, slot: ClusterSlot) -> Option<&Cluster> {
        let cluster = self.element(id)?.cluster(slot)?;
        self.registry(slot).get(cluster)
    }

    /// Absolute ids of a pore's `(node_in, node_out)` endpoints.
    pub fn pore_endpoints(&self, pore: &Element) -> (Option<ElementId>, Option<ElementId>) {
        match pore.as_pore() {
            Some(p) => (
                p.node_in().map(|n| self.node_abs(n)),
                p.node_out().map(|n| self.node_abs(n)),
            ),
            None => (None, None),
        }
    }
}

pub(crate) fn compute_totals(elements: &[Element]) -> VolumeTotals {
    let mut totals = VolumeTotals::default();
    for e in elements.iter().filter(|e| e.is_open()) {
        if e.is_node() {
            totals.node_volume += e.geometry.volume;
        } else {
            totals.pore_volume += e.geometry.volume;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use crate::builder::{NetworkBuilder, NodeSpec, PoreSpec};
    use crate::element::{CIRCLE_SHAPE_FACTOR, Phase, Wettability};

    fn chain() -> crate::Network {
        let mut b = NetworkBuilder::new();
        let n0 = b.add_node(NodeSpec::new([1e-4, 5e-5, 5e-5], 2e-5, CIRCLE_SHAPE_FACTOR));
        let n1 = b.add_node(NodeSpec::new([3e-4, 5e-5, 5e-5], 2e-5, CIRCLE_SHAPE_FACTOR));
        b.add_pore(None, Some(n0), PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
        b.add_pore(Some(n0), Some(n1), PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
        b.add_pore(Some(n1), None, PoreSpec::new(1e-5, CIRCLE_SHAPE_FACTOR));
        b.set_extents([4e-4, 1e-4, 1e-4]);
        b.build().unwrap()
    }

    #[test]
    fn absolute_ids_put_nodes_first() {
        let net = chain();
        assert_eq!(net.node_count(), 2);
        assert_eq!(net.pore_count(), 3);
        assert_eq!(net.pore_abs(pn_core::Id::from_index(0)).index(), 2);
        assert!(net.pores().iter().all(|p| p.is_pore()));
    }

    #[test]
    fn saturations_follow_fractions() {
        let mut net = chain();
        net.saturate(Phase::Water, Wettability::WaterWet, 0.0);
        assert!((net.water_saturation() - 1.0).abs() < 1e-12);
        net.saturate(Phase::Oil, Wettability::WaterWet, 0.0);
        assert!((net.oil_saturation() - 1.0).abs() < 1e-12);
        assert!(net.water_saturation().abs() < 1e-12);
    }

    #[test]
    fn closing_keeps_invariant_and_totals() {
        let mut net = chain();
        let before = net.total_volume();
        let pore = net.pore_abs(pn_core::Id::from_index(1));
        let v = net.element(pore).unwrap().geometry.volume;
        net.close_element(pore).unwrap();
        assert!(net.check_closed_invariant().is_ok());
        assert!((net.total_volume() - (before - v)).abs() < 1e-24);
    }
}
