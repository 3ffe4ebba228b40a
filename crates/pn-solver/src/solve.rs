//! Pressure solve entry point and flow post-processing.

use pn_core::NodeId;
use pn_core::timing::{Timer, engine_timing};
use pn_network::{Element, Network};
use tracing::debug;

use crate::assembly::{FlowTopology, Reservoir, assemble, flow_topology, node_reservoirs};
use crate::error::{SolverError, SolverResult};
use crate::linear::linear_solver;
use crate::problem::{BoundaryCondition, PressureProblem, SolverConfig};

/// Result of a pressure solve.
///
/// Node pressures, pore flows (signed `node_in → node_out`) and node
/// throughputs are written into the network itself.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSolution {
    pub inlet_pressure: f64,
    pub outlet_pressure: f64,
    /// Flow entering through the inlet face (m³/s)
    pub inlet_flow: f64,
    /// Flow leaving through the outlet face (m³/s)
    pub outlet_flow: f64,
    /// Nodes solved for
    pub unknowns: usize,
    /// Open nodes cut off from both faces
    pub isolated_nodes: usize,
    pub iterations: usize,
    pub relative_residual: f64,
}

impl FlowSolution {
    pub fn pressure_drop(&self) -> f64 {
        self.inlet_pressure - self.outlet_pressure
    }

    /// Total flow rate through the sample (m³/s).
    pub fn total_flow(&self) -> f64 {
        self.inlet_flow
    }

    /// Overall conductance Q/ΔP (m³/(Pa·s)); zero without a pressure drop.
    pub fn conductance(&self) -> f64 {
        let dp = self.pressure_drop();
        if dp != 0.0 { self.inlet_flow / dp } else { 0.0 }
    }

    /// Darcy permeability K = Q·μ·L/(A·ΔP) (m²) over the network extents.
    pub fn permeability(&self, network: &Network, viscosity: f64) -> f64 {
        let area = network.cross_section_area();
        if area <= 0.0 {
            return 0.0;
        }
        self.conductance() * viscosity * network.extents()[0] / area
    }
}

/// Solve the pressure field for the network's current conductivities.
///
/// Elements take part when open, active and with positive conductivity.
/// Components cut off from both faces get the reference (outlet) pressure
/// and zero flow. A flow-rate condition on a network without any conductive
/// path between the faces is an [`SolverError::InconsistentBoundary`].
pub fn solve_pressure(network: &mut Network, problem: &PressureProblem) -> SolverResult<FlowSolution> {
    let timer = Timer::start();
    let topo = flow_topology(network);

    let (p_in, p_out, pressures, stats) = match problem.boundary {
        BoundaryCondition::PressureDrop { inlet, outlet } => {
            if !inlet.is_finite() || !outlet.is_finite() {
                return Err(SolverError::ProblemSetup {
                    what: "non-finite boundary pressure".into(),
                });
            }
            let (x, stats) = solve_field(network, &topo, inlet, outlet, &problem.config)?;
            (inlet, outlet, x, stats)
        }
        BoundaryCondition::FlowRate { rate, outlet } => {
            if !rate.is_finite() || rate <= 0.0 || !outlet.is_finite() {
                return Err(SolverError::ProblemSetup {
                    what: format!("flow rate must be positive and finite, got {rate}"),
                });
            }
            let (unit, stats) = solve_field(network, &topo, 1.0, 0.0, &problem.config)?;
            let (q_unit, _) = boundary_flows(network, &topo, &unit, 1.0, 0.0);
            if q_unit.is_nan() || q_unit <= 0.0 {
                return Err(SolverError::InconsistentBoundary {
                    what: format!("demanded {rate:e} m³/s through a network with zero boundary conductance"),
                });
            }
            let dp = rate / q_unit;
            let x = unit.iter().map(|p| outlet + dp * p).collect();
            (outlet + dp, outlet, x, stats)
        }
    };

    write_back(network, &topo, &pressures, p_in, p_out);
    let (inlet_flow, outlet_flow) = boundary_flows(network, &topo, &pressures, p_in, p_out);

    let isolated_nodes = network
        .nodes()
        .iter()
        .filter(|n| n.is_open() && topo.ranks.rank(n.id).is_none())
        .count();

    let solution = FlowSolution {
        inlet_pressure: p_in,
        outlet_pressure: p_out,
        inlet_flow,
        outlet_flow,
        unknowns: topo.ranks.len(),
        isolated_nodes,
        iterations: stats.0,
        relative_residual: stats.1,
    };
    debug!(
        unknowns = solution.unknowns,
        isolated = solution.isolated_nodes,
        iterations = solution.iterations,
        q = solution.inlet_flow,
        "pressure solve"
    );

    timer.stop_into(&engine_timing::PRESSURE_SOLVES);
    Ok(solution)
}

/// Solve for ranked node pressures; returns (pressures by rank, (iterations, residual)).
fn solve_field(
    network: &Network,
    topo: &FlowTopology,
    p_in: f64,
    p_out: f64,
    config: &SolverConfig,
) -> SolverResult<(Vec<f64>, (usize, f64))> {
    if topo.ranks.is_empty() {
        return Ok((Vec::new(), (0, 0.0)));
    }

    let (mut a, mut b) = assemble(network, topo, p_in, p_out);
    let scale = a.diagonal().into_iter().fold(0.0_f64, f64::max);
    if !scale.is_finite() || scale <= 0.0 {
        return Err(SolverError::Numeric {
            what: format!("degenerate pressure matrix diagonal {scale:e}"),
        });
    }
    a.scale(1.0 / scale);
    for v in &mut b {
        *v /= scale;
    }

    // Linear profile along x as the starting guess.
    let length = network.extents()[0];
    let x0: Vec<f64> = topo
        .ranks
        .node_ids()
        .iter()
        .map(|&id| {
            let x = network
                .node(id)
                .and_then(|n| n.as_node())
                .map_or(0.0, |n| n.position[0]);
            let t = if length > 0.0 { (x / length).clamp(0.0, 1.0) } else { 0.5 };
            p_in + (p_out - p_in) * t
        })
        .collect();

    let solution = linear_solver(config).solve(&a, &b, &x0)?;
    if let Some(bad) = solution.x.iter().find(|v| !v.is_finite()) {
        return Err(SolverError::Numeric {
            what: format!("non-finite node pressure {bad}"),
        });
    }
    Ok((solution.x, (solution.iterations, solution.relative_residual)))
}

fn node_pressure(topo: &FlowTopology, x: &[f64], node: NodeId, reference: f64) -> f64 {
    topo.ranks.rank(node).map_or(reference, |r| x[r])
}

/// Signed flow through a flowing pore (node_in → node_out).
fn pore_flow(network: &Network, topo: &FlowTopology, x: &[f64], j: usize, p_in: f64, p_out: f64) -> f64 {
    let g = topo.throat[j];
    if g <= 0.0 {
        return 0.0;
    }
    let pore = &network.pores()[j];
    let Some(ext) = pore.as_pore() else { return 0.0 };
    let pa = ext
        .node_in()
        .map_or(p_in, |n| node_pressure(topo, x, n, p_out));
    let pb = ext
        .node_out()
        .map_or(p_out, |n| node_pressure(topo, x, n, p_out));
    g * (pa - pb)
}

/// Flow from a node's reservoir into the node.
fn reservoir_inflow(node: &Element, side: Reservoir, pressure: f64, p_in: f64, p_out: f64) -> f64 {
    let g = 2.0 * node.state.conductivity;
    match side {
        Reservoir::Inlet => g * (p_in - pressure),
        Reservoir::Outlet => g * (p_out - pressure),
    }
}

fn write_back(network: &mut Network, topo: &FlowTopology, x: &[f64], p_in: f64, p_out: f64) {
    let node_count = network.node_count();
    let flows: Vec<f64> = (0..network.pore_count())
        .map(|j| pore_flow(network, topo, x, j, p_in, p_out))
        .collect();

    let mut throughput = vec![0.0; node_count];
    for (j, pore) in network.pores().iter().enumerate() {
        let q = flows[j];
        let Some(ext) = pore.as_pore() else { continue };
        if q > 0.0 {
            if let Some(n) = ext.node_out() {
                throughput[n.idx()] += q;
            }
        } else if q < 0.0 {
            if let Some(n) = ext.node_in() {
                throughput[n.idx()] -= q;
            }
        }
    }

    let pressures: Vec<f64> = (0..node_count)
        .map(|i| node_pressure(topo, x, NodeId::from_usize(i), p_out))
        .collect();

    for (i, node) in network.nodes().iter().enumerate() {
        if topo.ranks.rank(node.id).is_none() {
            continue;
        }
        for side in node_reservoirs(node) {
            let q = reservoir_inflow(node, side, pressures[i], p_in, p_out);
            if q > 0.0 {
                throughput[i] += q;
            }
        }
    }

    let elements = network.elements_mut();
    for i in 0..node_count {
        let node = &mut elements[i];
        let flowing = topo.flowing[i] && topo.ranks.rank(node.id).is_some();
        node.state.flow = if flowing { throughput[i] } else { 0.0 };
        if let Some(ext) = node.as_node_mut() {
            ext.pressure = pressures[i];
            ext.rank = topo.ranks.rank(NodeId::from_usize(i));
        }
    }
    for (j, q) in flows.into_iter().enumerate() {
        elements[node_count + j].state.flow = q;
    }
}

/// (inlet inflow, outlet outflow) for ranked pressures `x`.
fn boundary_flows(network: &Network, topo: &FlowTopology, x: &[f64], p_in: f64, p_out: f64) -> (f64, f64) {
    let mut inlet = 0.0;
    let mut outlet = 0.0;
    for (j, pore) in network.pores().iter().enumerate() {
        if pore.inlet {
            inlet += pore_flow(network, topo, x, j, p_in, p_out);
        }
        if pore.outlet {
            outlet += pore_flow(network, topo, x, j, p_in, p_out);
        }
    }
    for node in network.nodes() {
        let Some(r) = topo.ranks.rank(node.id) else { continue };
        for side in node_reservoirs(node) {
            let q = reservoir_inflow(node, side, x[r], p_in, p_out);
            match side {
                Reservoir::Inlet => inlet += q,
                Reservoir::Outlet => outlet -= q,
            }
        }
    }
    (inlet, outlet)
}

/// Net inflow at every node after a solve, reservoir links included.
///
/// Zero (to solver tolerance) for every node that was solved for.
pub fn node_net_flows(network: &Network, solution: &FlowSolution) -> Vec<f64> {
    let mut net = vec![0.0; network.node_count()];
    for pore in network.pores() {
        let q = pore.state.flow;
        let Some(ext) = pore.as_pore() else { continue };
        if let Some(n) = ext.node_in() {
            net[n.idx()] -= q;
        }
        if let Some(n) = ext.node_out() {
            net[n.idx()] += q;
        }
    }
    for (i, node) in network.nodes().iter().enumerate() {
        let Some(ext) = node.as_node() else { continue };
        if ext.rank.is_none() {
            continue;
        }
        for side in node_reservoirs(node) {
            net[i] += reservoir_inflow(
                node,
                side,
                ext.pressure,
                solution.inlet_pressure,
                solution.outlet_pressure,
            );
        }
    }
    net
}
