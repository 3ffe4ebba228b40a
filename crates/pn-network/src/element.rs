//! Capillary element data structures.
//!
//! Every node (pore body) and pore (throat) shares one [`Element`] record:
//! geometry, fluid state and cluster references. The kind-specific part
//! lives in [`ElementKind`].

use std::f64::consts::PI;

use pn_core::{CLOSED_CONDUCTIVITY, ClusterId, ElementId, Id, NodeId};

/// Shape factor of a circular cross-section, 1/(4π).
pub const CIRCLE_SHAPE_FACTOR: f64 = 1.0 / (4.0 * PI);

/// Largest shape factor treated as a triangle, √3/36.
pub const TRIANGLE_MAX_SHAPE_FACTOR: f64 = 0.048_112_522_432_468_816;

/// Largest shape factor treated as a square.
pub const SQUARE_SHAPE_FACTOR: f64 = 1.0 / 16.0;

/// Fluid occupying the bulk of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Oil,
    Water,
    /// Tracer-labelled water (or a temporary marker during transport stages).
    Tracer,
    Invalid,
}

impl Phase {
    /// The opposing phase in an oil/water displacement.
    pub fn opposite(self) -> Phase {
        match self {
            Phase::Oil => Phase::Water,
            Phase::Water | Phase::Tracer => Phase::Oil,
            Phase::Invalid => Phase::Invalid,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Oil => "oil",
            Phase::Water => "water",
            Phase::Tracer => "tracer",
            Phase::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wettability {
    OilWet,
    WaterWet,
    Invalid,
}

impl Wettability {
    /// Phase that wets the walls (and so keeps the corners) of the element.
    pub fn wetting_phase(self) -> Phase {
        match self {
            Wettability::OilWet => Phase::Oil,
            Wettability::WaterWet => Phase::Water,
            Wettability::Invalid => Phase::Invalid,
        }
    }
}

/// Idealized cross-section selected from the shape factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeClass {
    Triangle,
    Square,
    Circle,
}

impl ShapeClass {
    pub fn from_shape_factor(g: f64) -> Self {
        if g <= TRIANGLE_MAX_SHAPE_FACTOR {
            ShapeClass::Triangle
        } else if g <= SQUARE_SHAPE_FACTOR {
            ShapeClass::Square
        } else {
            ShapeClass::Circle
        }
    }

    /// Dimensionless constant `k` in g = k·A²·G/(μL).
    pub fn conductance_constant(self) -> f64 {
        match self {
            ShapeClass::Triangle => 0.6,
            ShapeClass::Square => 0.5623,
            ShapeClass::Circle => 0.5,
        }
    }

    /// Corner half-angles (rad). Empty for circles.
    pub fn corner_half_angles(self) -> &'static [f64] {
        const TRIANGLE: [f64; 3] = [PI / 6.0, PI / 6.0, PI / 6.0];
        const SQUARE: [f64; 4] = [PI / 4.0, PI / 4.0, PI / 4.0, PI / 4.0];
        match self {
            ShapeClass::Triangle => &TRIANGLE,
            ShapeClass::Square => &SQUARE,
            ShapeClass::Circle => &[],
        }
    }

    pub fn has_corners(self) -> bool {
        !matches!(self, ShapeClass::Circle)
    }
}

/// Static geometry of an element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Inscribed radius (m)
    pub radius: f64,
    /// Length along the flow path (m)
    pub length: f64,
    /// Pore volume (m³)
    pub volume: f64,
    /// Volume seen by transport (m³); equal to `volume` unless clay/microporosity is modelled
    pub effective_volume: f64,
    /// Shape factor G = A/P²
    pub shape_factor: f64,
    /// Conductance constant matching the shape class
    pub shape_factor_constant: f64,
}

impl Geometry {
    pub fn new(radius: f64, length: f64, shape_factor: f64) -> Self {
        let shape_factor_constant = ShapeClass::from_shape_factor(shape_factor).conductance_constant();
        let area = radius * radius / (4.0 * shape_factor);
        let volume = area * length;
        Self {
            radius,
            length,
            volume,
            effective_volume: volume,
            shape_factor,
            shape_factor_constant,
        }
    }

    /// Cross-section area A = r²/(4G).
    pub fn area(&self) -> f64 {
        self.radius * self.radius / (4.0 * self.shape_factor)
    }

    pub fn shape(&self) -> ShapeClass {
        ShapeClass::from_shape_factor(self.shape_factor)
    }
}

/// Which clustering pass a back-reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterSlot {
    /// Elements taking part in the current flow computation
    Active,
    Oil,
    Water,
    OilWet,
    WaterWet,
    /// Oil continuity through bulk oil and oil corner films
    OilFilm,
    /// Water continuity through bulk water and water corner films
    WaterFilm,
}

impl ClusterSlot {
    pub const COUNT: usize = 7;

    pub const ALL: [ClusterSlot; Self::COUNT] = [
        ClusterSlot::Active,
        ClusterSlot::Oil,
        ClusterSlot::Water,
        ClusterSlot::OilWet,
        ClusterSlot::WaterWet,
        ClusterSlot::OilFilm,
        ClusterSlot::WaterFilm,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Bulk-phase slot for an oil/water phase.
    pub fn for_phase(phase: Phase) -> Option<ClusterSlot> {
        match phase {
            Phase::Oil => Some(ClusterSlot::Oil),
            Phase::Water => Some(ClusterSlot::Water),
            _ => None,
        }
    }

    /// Film-continuity slot for an oil/water phase.
    pub fn film_for_phase(phase: Phase) -> Option<ClusterSlot> {
        match phase {
            Phase::Oil => Some(ClusterSlot::OilFilm),
            Phase::Water => Some(ClusterSlot::WaterFilm),
            _ => None,
        }
    }
}

/// Per-slot cluster indices from the latest clustering passes.
///
/// These are plain indices into the registry held by the network, never owning
/// references; every clustering pass overwrites its slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterRefs([Option<ClusterId>; ClusterSlot::COUNT]);

impl ClusterRefs {
    pub fn get(&self, slot: ClusterSlot) -> Option<ClusterId> {
        self.0[slot.index()]
    }

    pub fn set(&mut self, slot: ClusterSlot, cluster: Option<ClusterId>) {
        self.0[slot.index()] = cluster;
    }

    pub fn clear(&mut self) {
        self.0 = [None; ClusterSlot::COUNT];
    }
}

/// Mutable simulation fields of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementState {
    pub phase: Phase,
    pub wettability: Wettability,
    /// Current contact angle (rad)
    pub contact_angle: f64,
    /// Contact angle before any wettability alteration (rad)
    pub original_contact_angle: f64,
    pub oil_fraction: f64,
    pub water_fraction: f64,
    /// Tracer concentration in the bulk phase
    pub concentration: f64,
    pub oil_trapped: bool,
    pub water_trapped: bool,
    /// Hydraulic conductance used by the last pressure solve (m³/(Pa·s))
    pub conductivity: f64,
    /// Volumetric flow (m³/s); for pores signed from `node_in` to `node_out`,
    /// for nodes the total throughput
    pub flow: f64,
    /// Upwinded mass influx used by transport (m³/s × concentration)
    pub mass_flow: f64,
    pub oil_film_volume: f64,
    pub water_film_volume: f64,
    pub oil_film_conductivity: f64,
    pub water_film_conductivity: f64,
    pub closed: bool,
    pub active: bool,
    pub clusters: ClusterRefs,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            phase: Phase::Water,
            wettability: Wettability::WaterWet,
            contact_angle: 0.0,
            original_contact_angle: 0.0,
            oil_fraction: 0.0,
            water_fraction: 1.0,
            concentration: 0.0,
            oil_trapped: false,
            water_trapped: false,
            conductivity: 0.0,
            flow: 0.0,
            mass_flow: 0.0,
            oil_film_volume: 0.0,
            water_film_volume: 0.0,
            oil_film_conductivity: 0.0,
            water_film_conductivity: 0.0,
            closed: false,
            active: true,
            clusters: ClusterRefs::default(),
        }
    }
}

impl ElementState {
    /// State of a closed element: inactive, invalid flags, sentinel conductivity.
    pub fn closed() -> Self {
        Self {
            phase: Phase::Invalid,
            wettability: Wettability::Invalid,
            oil_fraction: 0.0,
            water_fraction: 0.0,
            conductivity: CLOSED_CONDUCTIVITY,
            closed: true,
            active: false,
            ..Self::default()
        }
    }

    /// Whether the given phase is trapped in this element.
    pub fn is_trapped(&self, phase: Phase) -> bool {
        match phase {
            Phase::Oil => self.oil_trapped,
            Phase::Water | Phase::Tracer => self.water_trapped,
            Phase::Invalid => false,
        }
    }

    pub fn set_trapped(&mut self, phase: Phase, trapped: bool) {
        match phase {
            Phase::Oil => self.oil_trapped = trapped,
            Phase::Water | Phase::Tracer => self.water_trapped = trapped,
            Phase::Invalid => {}
        }
    }

    /// Volume fraction of `phase` (tracer counts as water).
    pub fn fraction(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Oil => self.oil_fraction,
            Phase::Water | Phase::Tracer => self.water_fraction,
            Phase::Invalid => 0.0,
        }
    }

    /// Film volume held by `phase` in the corners.
    pub fn film_volume(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Oil => self.oil_film_volume,
            Phase::Water | Phase::Tracer => self.water_film_volume,
            Phase::Invalid => 0.0,
        }
    }

    pub fn film_conductivity(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Oil => self.oil_film_conductivity,
            Phase::Water | Phase::Tracer => self.water_film_conductivity,
            Phase::Invalid => 0.0,
        }
    }
}

/// Extension fields of a node (pore body).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeExt {
    /// Absolute coordinates (m)
    pub position: [f64; 3],
    /// Lattice indices, only meaningful for regular lattices
    pub lattice_index: Option<[u32; 3]>,
    pub(crate) connected_nodes: Vec<NodeId>,
    pub(crate) connected_pores: Vec<pn_core::PoreId>,
    /// Solver rank from the last pressure assembly (None if not an unknown)
    pub rank: Option<usize>,
    /// Nodal pressure (Pa)
    pub pressure: f64,
}

impl NodeExt {
    pub fn connected_nodes(&self) -> &[NodeId] {
        &self.connected_nodes
    }

    pub fn connected_pores(&self) -> &[pn_core::PoreId] {
        &self.connected_pores
    }

    pub fn coordination_number(&self) -> usize {
        self.connected_pores.len()
    }
}

/// Extension fields of a pore (throat).
#[derive(Debug, Clone, PartialEq)]
pub struct PoreExt {
    pub(crate) node_in: Option<NodeId>,
    pub(crate) node_out: Option<NodeId>,
    /// Centre-to-centre (or centre-to-face) length (m)
    pub full_length: f64,
    /// Stub length inside the inlet-side node (m)
    pub node_in_length: f64,
    /// Stub length inside the outlet-side node (m)
    pub node_out_length: f64,
}

impl PoreExt {
    pub fn node_in(&self) -> Option<NodeId> {
        self.node_in
    }

    pub fn node_out(&self) -> Option<NodeId> {
        self.node_out
    }

    /// Boundary pores have exactly one missing endpoint.
    pub fn is_boundary(&self) -> bool {
        self.node_in.is_none() || self.node_out.is_none()
    }
}

/// Kind-specific extension of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Node(NodeExt),
    Pore(PoreExt),
}

/// A capillary element: shared record plus kind extension.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Index within its own kind (node index or pore index)
    pub id: Id,
    /// Absolute index over all elements
    pub abs_id: ElementId,
    pub geometry: Geometry,
    pub state: ElementState,
    pub inlet: bool,
    pub outlet: bool,
    pub kind: ElementKind,
    pub(crate) neighbors: Vec<ElementId>,
}

impl Element {
    /// Absolute ids of the adjacent elements (pores of a node, nodes of a pore).
    pub fn neighbors(&self) -> &[ElementId] {
        &self.neighbors
    }

    pub fn is_node(&self) -> bool {
        matches!(self.kind, ElementKind::Node(_))
    }

    pub fn is_pore(&self) -> bool {
        matches!(self.kind, ElementKind::Pore(_))
    }

    pub fn as_node(&self) -> Option<&NodeExt> {
        match &self.kind {
            ElementKind::Node(n) => Some(n),
            ElementKind::Pore(_) => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut NodeExt> {
        match &mut self.kind {
            ElementKind::Node(n) => Some(n),
            ElementKind::Pore(_) => None,
        }
    }

    pub fn as_pore(&self) -> Option<&PoreExt> {
        match &self.kind {
            ElementKind::Pore(p) => Some(p),
            ElementKind::Node(_) => None,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.state.closed
    }

    pub fn is_boundary(&self) -> bool {
        self.inlet || self.outlet
    }

    pub fn cluster(&self, slot: ClusterSlot) -> Option<ClusterId> {
        self.state.clusters.get(slot)
    }

    /// Volume of oil held in the element.
    pub fn oil_volume(&self) -> f64 {
        self.state.oil_fraction * self.geometry.volume
    }

    /// Volume of water held in the element.
    pub fn water_volume(&self) -> f64 {
        self.state.water_fraction * self.geometry.volume
    }

    /// Fill the bulk with `phase`, leaving films untouched.
    pub fn fill(&mut self, phase: Phase) {
        self.state.phase = phase;
        match phase {
            Phase::Oil => {
                self.state.oil_fraction = 1.0;
                self.state.water_fraction = 0.0;
            }
            Phase::Water | Phase::Tracer => {
                self.state.oil_fraction = 0.0;
                self.state.water_fraction = 1.0;
            }
            Phase::Invalid => {
                self.state.oil_fraction = 0.0;
                self.state.water_fraction = 0.0;
            }
        }
    }

    /// Close the element, enforcing the closed invariant.
    pub fn close(&mut self) {
        let clusters = ClusterRefs::default();
        self.state = ElementState {
            clusters,
            ..ElementState::closed()
        };
    }

    /// True if the closed invariant holds for this element.
    pub fn closed_invariant_holds(&self) -> bool {
        let s = &self.state;
        if s.closed {
            !s.active
                && s.phase == Phase::Invalid
                && s.wettability == Wettability::Invalid
                && s.conductivity == CLOSED_CONDUCTIVITY
                && ClusterSlot::ALL.iter().all(|slot| s.clusters.get(*slot).is_none())
        } else {
            s.phase != Phase::Invalid
                && s.wettability != Wettability::Invalid
                && s.conductivity != CLOSED_CONDUCTIVITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_classes_follow_shape_factor() {
        assert_eq!(ShapeClass::from_shape_factor(0.03), ShapeClass::Triangle);
        assert_eq!(ShapeClass::from_shape_factor(0.0625), ShapeClass::Square);
        assert_eq!(
            ShapeClass::from_shape_factor(CIRCLE_SHAPE_FACTOR),
            ShapeClass::Circle
        );
        assert_eq!(ShapeClass::Circle.corner_half_angles().len(), 0);
        assert_eq!(ShapeClass::Square.corner_half_angles().len(), 4);
    }

    #[test]
    fn circular_geometry_area() {
        let g = Geometry::new(1e-5, 1e-4, CIRCLE_SHAPE_FACTOR);
        let expected = PI * 1e-10;
        assert!((g.area() - expected).abs() < 1e-22);
        assert!((g.volume - expected * 1e-4).abs() < 1e-26);
        assert_eq!(g.shape_factor_constant, 0.5);
    }

    #[test]
    fn cluster_refs_set_and_clear() {
        let mut refs = ClusterRefs::default();
        refs.set(ClusterSlot::Oil, Some(Id::from_index(3)));
        assert_eq!(refs.get(ClusterSlot::Oil), Some(Id::from_index(3)));
        assert_eq!(refs.get(ClusterSlot::Water), None);
        refs.clear();
        assert_eq!(refs.get(ClusterSlot::Oil), None);
    }

    #[test]
    fn phase_opposites() {
        assert_eq!(Phase::Oil.opposite(), Phase::Water);
        assert_eq!(Phase::Water.opposite(), Phase::Oil);
        assert_eq!(Wettability::OilWet.wetting_phase(), Phase::Oil);
    }
}
