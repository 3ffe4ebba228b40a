//! Assembly of the nodal mass-balance system.
//!
//! Unknowns are the nodes of active clusters touching a boundary face. Each
//! flowing pore contributes the throat conductance
//! `1/g = 1/g_pore + Σ 1/(2·g_node)` over its present endpoints; nodes flagged
//! as inlet or outlet additionally connect to their reservoir through `2·g_node`.

use pn_network::{ClusterSlot, Element, Network, RankMap, cluster_elements};

use crate::csr::{CsrBuilder, CsrMatrix};

/// Which side of a link holds the boundary reservoir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reservoir {
    Inlet,
    Outlet,
}

/// Per-element flow topology derived from the current network state.
#[derive(Debug, Clone)]
pub(crate) struct FlowTopology {
    /// Element takes part in the flow (by absolute index)
    pub(crate) flowing: Vec<bool>,
    /// Throat conductance for flowing pores (by pore index), 0 otherwise
    pub(crate) throat: Vec<f64>,
    pub(crate) ranks: RankMap,
}

fn participates(e: &Element) -> bool {
    e.is_open() && e.state.active && e.state.conductivity.is_finite() && e.state.conductivity > 0.0
}

/// Series conductance of a pore and the halves of its endpoint nodes.
pub(crate) fn throat_conductance(network: &Network, pore: &Element) -> Option<f64> {
    if !participates(pore) {
        return None;
    }
    let mut resistance = 1.0 / pore.state.conductivity;
    let (a, b) = network.pore_endpoints(pore);
    for node in [a, b].into_iter().flatten() {
        let node = network.element(node)?;
        if !participates(node) {
            return None;
        }
        resistance += 1.0 / (2.0 * node.state.conductivity);
    }
    Some(1.0 / resistance)
}

/// Cluster the flowing elements and rank the boundary-connected nodes.
pub(crate) fn flow_topology(network: &mut Network) -> FlowTopology {
    let node_count = network.node_count();
    let mut flowing = vec![false; network.element_count()];
    let mut throat = vec![0.0; network.pore_count()];

    for node in network.nodes() {
        flowing[node.abs_id.idx()] = participates(node);
    }
    for (j, pore) in network.pores().iter().enumerate() {
        if let Some(g) = throat_conductance(network, pore) {
            throat[j] = g;
            flowing[node_count + j] = true;
        }
    }

    cluster_elements(network, ClusterSlot::Active, |e| flowing[e.abs_id.idx()]);

    let ranks = {
        let net = &*network;
        RankMap::from_network(net, |n| {
            net.cluster_of(n.abs_id, ClusterSlot::Active)
                .is_some_and(|c| c.inlet || c.outlet)
        })
    };

    FlowTopology {
        flowing,
        throat,
        ranks,
    }
}

/// Assemble `A·p = b` for reservoir pressures `p_in`, `p_out`.
pub(crate) fn assemble(
    network: &Network,
    topo: &FlowTopology,
    p_in: f64,
    p_out: f64,
) -> (CsrMatrix, Vec<f64>) {
    let n = topo.ranks.len();
    let mut builder = CsrBuilder::new(n);
    let mut rhs = vec![0.0; n];
    let reservoir_pressure = |side: Reservoir| match side {
        Reservoir::Inlet => p_in,
        Reservoir::Outlet => p_out,
    };

    for (j, pore) in network.pores().iter().enumerate() {
        let g = topo.throat[j];
        if g <= 0.0 {
            continue;
        }
        let Some(ext) = pore.as_pore() else { continue };
        let rank_in = ext.node_in().and_then(|id| topo.ranks.rank(id));
        let rank_out = ext.node_out().and_then(|id| topo.ranks.rank(id));
        match (rank_in, rank_out) {
            (Some(i), Some(k)) => builder.add_link(i, k, g),
            (None, Some(k)) if ext.node_in().is_none() => {
                builder.add(k, k, g);
                rhs[k] += g * reservoir_pressure(Reservoir::Inlet);
            }
            (Some(i), None) if ext.node_out().is_none() => {
                builder.add(i, i, g);
                rhs[i] += g * reservoir_pressure(Reservoir::Outlet);
            }
            _ => {}
        }
    }

    for node in network.nodes() {
        let Some(i) = topo.ranks.rank(node.id) else { continue };
        for side in node_reservoirs(node) {
            let g = 2.0 * node.state.conductivity;
            builder.add(i, i, g);
            rhs[i] += g * reservoir_pressure(side);
        }
    }

    (builder.build(), rhs)
}

/// Reservoirs a node connects to directly.
pub(crate) fn node_reservoirs(node: &Element) -> impl Iterator<Item = Reservoir> {
    let inlet = node.inlet.then_some(Reservoir::Inlet);
    let outlet = node.outlet.then_some(Reservoir::Outlet);
    inlet.into_iter().chain(outlet)
}
