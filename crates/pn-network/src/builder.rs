//! Incremental network builder.

use pn_core::{ElementId, Id, NodeId, PoreId};

use crate::cluster::ClusterRegistry;
use crate::element::{
    ClusterSlot, Element, ElementKind, ElementState, Geometry, NodeExt, PoreExt,
};
use crate::error::{NetworkError, NetworkResult};
use crate::network::{Network, compute_totals};
use crate::validate;

/// Shortest pore length kept when node stubs eat the centre-to-centre distance,
/// as a fraction of that distance.
const MIN_LENGTH_FRACTION: f64 = 0.05;

/// Description of a node (pore body).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub position: [f64; 3],
    pub radius: f64,
    pub shape_factor: f64,
    /// Defaults to the node diameter.
    pub length: Option<f64>,
    pub lattice_index: Option<[u32; 3]>,
}

impl NodeSpec {
    pub fn new(position: [f64; 3], radius: f64, shape_factor: f64) -> Self {
        Self {
            position,
            radius,
            shape_factor,
            length: None,
            lattice_index: None,
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_lattice_index(mut self, index: [u32; 3]) -> Self {
        self.lattice_index = Some(index);
        self
    }
}

/// Description of a pore (throat).
#[derive(Debug, Clone, PartialEq)]
pub struct PoreSpec {
    pub radius: f64,
    pub shape_factor: f64,
    /// Overrides the length derived from endpoint coordinates.
    pub length: Option<f64>,
}

impl PoreSpec {
    pub fn new(radius: f64, shape_factor: f64) -> Self {
        Self {
            radius,
            shape_factor,
            length: None,
        }
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PendingPore {
    pub(crate) node_in: Option<NodeId>,
    pub(crate) node_out: Option<NodeId>,
    pub(crate) spec: PoreSpec,
}

/// Builder for constructing a network incrementally.
///
/// Use `add_node` and `add_pore` to build up the topology, then call
/// `build()` to validate it and freeze it into a [`Network`].
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    pub(crate) nodes: Vec<NodeSpec>,
    pub(crate) pores: Vec<PendingPore>,
    node_inlet: Vec<NodeId>,
    node_outlet: Vec<NodeId>,
    closed_nodes: Vec<NodeId>,
    closed_pores: Vec<PoreId>,
    extents: Option<[f64; 3]>,
    is_2d: bool,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its ID.
    pub fn add_node(&mut self, spec: NodeSpec) -> NodeId {
        let id = NodeId::from_usize(self.nodes.len());
        self.nodes.push(spec);
        id
    }

    /// Add a pore between two nodes.
    ///
    /// A missing `node_in` makes it an inlet pore, a missing `node_out` an
    /// outlet pore.
    pub fn add_pore(
        &mut self,
        node_in: Option<NodeId>,
        node_out: Option<NodeId>,
        spec: PoreSpec,
    ) -> PoreId {
        let id = PoreId::from_usize(self.pores.len());
        self.pores.push(PendingPore {
            node_in,
            node_out,
            spec,
        });
        id
    }

    /// Flag a node as touching the inlet face directly.
    pub fn mark_node_inlet(&mut self, node: NodeId) {
        self.node_inlet.push(node);
    }

    /// Flag a node as touching the outlet face directly.
    pub fn mark_node_outlet(&mut self, node: NodeId) {
        self.node_outlet.push(node);
    }

    pub fn close_node(&mut self, node: NodeId) {
        self.closed_nodes.push(node);
    }

    pub fn close_pore(&mut self, pore: PoreId) {
        self.closed_pores.push(pore);
    }

    /// Domain extents (m). Defaults to the node bounding box.
    pub fn set_extents(&mut self, extents: [f64; 3]) {
        self.extents = Some(extents);
    }

    pub fn set_2d(&mut self, is_2d: bool) {
        self.is_2d = is_2d;
    }

    /// Validate and freeze the network.
    pub fn build(self) -> NetworkResult<Network> {
        validate::validate_structure(&self.nodes, &self.pores)?;

        let extents = self.extents.unwrap_or_else(|| self.bounding_extents());
        let node_count = self.nodes.len();

        // Node adjacency: pores and nodes touching each node, sorted for determinism.
        let mut node_pores: Vec<Vec<PoreId>> = vec![Vec::new(); node_count];
        let mut node_nodes: Vec<Vec<NodeId>> = vec![Vec::new(); node_count];
        for (j, pore) in self.pores.iter().enumerate() {
            let pid = PoreId::from_usize(j);
            for node in [pore.node_in, pore.node_out].into_iter().flatten() {
                node_pores[node.idx()].push(pid);
            }
            if let (Some(a), Some(b)) = (pore.node_in, pore.node_out) {
                node_nodes[a.idx()].push(b);
                node_nodes[b.idx()].push(a);
            }
        }
        for list in node_nodes.iter_mut() {
            list.sort();
            list.dedup();
        }

        let mut elements = Vec::with_capacity(node_count + self.pores.len());
        for (i, spec) in self.nodes.iter().enumerate() {
            let length = spec.length.unwrap_or(2.0 * spec.radius);
            let neighbors: Vec<ElementId> = node_pores[i]
                .iter()
                .map(|p| Id::from_usize(node_count + p.idx()))
                .collect();
            elements.push(Element {
                id: NodeId::from_usize(i),
                abs_id: ElementId::from_usize(i),
                geometry: Geometry::new(spec.radius, length, spec.shape_factor),
                state: ElementState::default(),
                inlet: false,
                outlet: false,
                kind: ElementKind::Node(NodeExt {
                    position: spec.position,
                    lattice_index: spec.lattice_index,
                    connected_nodes: std::mem::take(&mut node_nodes[i]),
                    connected_pores: std::mem::take(&mut node_pores[i]),
                    rank: None,
                    pressure: 0.0,
                }),
                neighbors,
            });
        }

        for (j, pore) in self.pores.iter().enumerate() {
            let pid = PoreId::from_usize(j);
            let ext = self.pore_lengths(pid, pore, extents)?;
            let length = pore.spec.length.unwrap_or_else(|| {
                let stub = ext.full_length - ext.node_in_length - ext.node_out_length;
                stub.max(MIN_LENGTH_FRACTION * ext.full_length)
            });
            let neighbors: Vec<ElementId> =
                [pore.node_in, pore.node_out].into_iter().flatten().collect();
            elements.push(Element {
                id: pid,
                abs_id: ElementId::from_usize(node_count + j),
                geometry: Geometry::new(pore.spec.radius, length, pore.spec.shape_factor),
                state: ElementState::default(),
                inlet: pore.node_in.is_none(),
                outlet: pore.node_out.is_none(),
                kind: ElementKind::Pore(ext),
                neighbors,
            });
        }

        for node in &self.node_inlet {
            if let Some(e) = elements.get_mut(node.idx()) {
                e.inlet = true;
            }
        }
        for node in &self.node_outlet {
            if let Some(e) = elements.get_mut(node.idx()) {
                e.outlet = true;
            }
        }
        for node in &self.closed_nodes {
            if let Some(e) = elements.get_mut(node.idx()) {
                e.close();
            }
        }
        for pore in &self.closed_pores {
            if let Some(e) = elements.get_mut(node_count + pore.idx()) {
                e.close();
            }
        }

        validate::validate_geometry(&elements)?;

        let inlet_elements = elements.iter().filter(|e| e.inlet).map(|e| e.abs_id).collect();
        let outlet_elements = elements.iter().filter(|e| e.outlet).map(|e| e.abs_id).collect();
        let max_coordination = elements
            .iter()
            .filter_map(|e| e.as_node())
            .map(|n| n.coordination_number())
            .max()
            .unwrap_or(0);
        let totals = compute_totals(&elements);
        let registries = ClusterSlot::ALL
            .iter()
            .map(|slot| ClusterRegistry::empty(*slot))
            .collect();

        Ok(Network {
            elements,
            node_count,
            extents,
            is_2d: self.is_2d,
            max_coordination,
            inlet_elements,
            outlet_elements,
            totals,
            registries,
        })
    }

    /// Derive full and stub lengths of a pore from its endpoint coordinates.
    fn pore_lengths(
        &self,
        pid: PoreId,
        pore: &PendingPore,
        extents: [f64; 3],
    ) -> NetworkResult<PoreExt> {
        let node_in = pore.node_in.map(|n| &self.nodes[n.idx()]);
        let node_out = pore.node_out.map(|n| &self.nodes[n.idx()]);

        let full_length = match (node_in, node_out) {
            (Some(a), Some(b)) => distance(a.position, b.position),
            // Inlet pore: from the x-min face to the node centre.
            (None, Some(b)) => b.position[0],
            // Outlet pore: from the node centre to the x-max face.
            (Some(a), None) => extents[0] - a.position[0],
            (None, None) => return Err(NetworkError::DanglingPore { pore: pid }),
        };

        let node_in_length = node_in.map_or(0.0, |n| n.radius);
        let node_out_length = node_out.map_or(0.0, |n| n.radius);
        if pore.spec.length.is_none()
            && (!full_length.is_finite() || full_length <= node_in_length + node_out_length)
            && (node_in.is_none() || node_out.is_none())
        {
            return Err(NetworkError::MissingLength { pore: pid });
        }

        Ok(PoreExt {
            node_in: pore.node_in,
            node_out: pore.node_out,
            full_length,
            node_in_length,
            node_out_length,
        })
    }

    fn bounding_extents(&self) -> [f64; 3] {
        let pad = self
            .nodes
            .iter()
            .map(|n| 2.0 * n.radius)
            .fold(0.0_f64, f64::max);
        let mut extents = [0.0; 3];
        for (axis, extent) in extents.iter_mut().enumerate() {
            let max = self
                .nodes
                .iter()
                .map(|n| n.position[axis])
                .fold(0.0_f64, f64::max);
            *extent = max + pad;
        }
        extents
    }
}

fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}
