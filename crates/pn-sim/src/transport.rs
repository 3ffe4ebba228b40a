//! Explicit convection-diffusion of a tracer through the water phase.
//!
//! The carrier is bulk water of the spanning water cluster; everything else
//! is frozen. Each step uses the largest stable time step
//! `Δt = min 1/(|q|/V + Σd/V)` and the upwind update
//! `c' = c + Δt·(influx − |q|·c)/V + Δt·Σ d·(c_nb − c)/V`.

use pn_capillary::assign_phase;
use pn_core::{TIME_STEP_SENTINEL, is_unit_fraction};
use pn_core::timing::Timer;
use pn_network::{ClusterSlot, Network, Phase, cluster_elements};
use pn_solver::solve_pressure;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::connectivity::bulk_phase;
use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::events::{EventSink, Snapshot, SnapshotCadence, StageEvent, TransportSample, emit};
use crate::interrupt::InterruptFlag;
use crate::invasion::Termination;

/// Settings of a tracer stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TracerOptions {
    /// Concentration of the injected water
    pub inlet_concentration: f64,
    /// Stop after this many pore volumes have been injected
    pub injected_pore_volumes: f64,
    pub max_steps: usize,
    /// Allowed excursion outside [0, 1] before the run fails
    pub bound_tolerance: f64,
    pub diffusion: bool,
    /// Emit a transport sample every this many injected pore volumes (0: every step)
    pub sample_interval_pv: f64,
    /// Emit a snapshot every this many seconds of simulated time (0 disables)
    pub snapshot_time_interval: f64,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            inlet_concentration: 1.0,
            injected_pore_volumes: 2.0,
            max_steps: 1_000_000,
            bound_tolerance: 1e-9,
            diffusion: true,
            sample_interval_pv: 0.01,
            snapshot_time_interval: 0.0,
        }
    }
}

impl TracerOptions {
    pub fn validate(&self) -> SimResult<()> {
        if !(0.0..=1.0).contains(&self.inlet_concentration) {
            return Err(SimError::InvalidArg {
                what: "inlet concentration must lie in [0, 1]",
            });
        }
        if !self.injected_pore_volumes.is_finite() || self.injected_pore_volumes <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "injected pore volumes must be positive",
            });
        }
        if !self.bound_tolerance.is_finite() || self.bound_tolerance < 0.0 {
            return Err(SimError::InvalidArg {
                what: "bound tolerance must be non-negative",
            });
        }
        Ok(())
    }
}

/// Summary of a finished transport stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportOutcome {
    pub stage: String,
    pub termination: Termination,
    pub steps: usize,
    /// Simulated time (s)
    pub time: f64,
    pub injected_pore_volumes: f64,
    /// Last effluent concentration (water cut for saturation transport)
    pub effluent: f64,
}

/// Elements taking part in transport and the diffusive links between them.
#[derive(Debug, Clone, Default)]
pub(crate) struct TransportGrid {
    /// By absolute index
    pub(crate) live: Vec<bool>,
    /// (node index, pore index, diffusive conductance m³/s)
    pub(crate) links: Vec<(usize, usize, f64)>,
}

impl TransportGrid {
    pub(crate) fn new(network: &Network, live: Vec<bool>, diffusivity: Option<f64>) -> Self {
        let mut links = Vec::new();
        if let Some(dm) = diffusivity {
            for pore in network.pores() {
                let j = pore.abs_id.idx();
                if !live[j] {
                    continue;
                }
                for &nb in pore.neighbors() {
                    let i = nb.idx();
                    let Some(node) = network.element(nb) else { continue };
                    if !live[i] {
                        continue;
                    }
                    let area = node.geometry.area().min(pore.geometry.area());
                    let length = 0.5 * (node.geometry.length + pore.geometry.length);
                    if length > 0.0 {
                        links.push((i, j, dm * area / length));
                    }
                }
            }
        }
        Self { live, links }
    }

    fn diffusive_sum(&self, count: usize) -> Vec<f64> {
        let mut sum = vec![0.0; count];
        for &(i, j, d) in &self.links {
            sum[i] += d;
            sum[j] += d;
        }
        sum
    }
}

/// Flow exchanged by a node with its reservoir as (inflow, outflow).
pub(crate) fn reservoir_exchange(network: &Network, node: usize) -> (f64, f64) {
    let Some(element) = network.elements().get(node) else {
        return (0.0, 0.0);
    };
    let Some(ext) = element.as_node() else {
        return (0.0, 0.0);
    };
    if !element.is_boundary() {
        return (0.0, 0.0);
    }
    let (mut pore_in, mut pore_out) = (0.0, 0.0);
    for &pid in ext.connected_pores() {
        let Some(pore) = network.pore(pid) else { continue };
        let Some(pext) = pore.as_pore() else { continue };
        let q = pore.state.flow;
        // Positive q runs node_in → node_out.
        let into_node = if pext.node_out() == Some(element.id) { q } else { -q };
        if into_node > 0.0 {
            pore_in += into_node;
        } else {
            pore_out -= into_node;
        }
    }
    let throughput = element.state.flow;
    ((throughput - pore_in).max(0.0), (throughput - pore_out).max(0.0))
}

/// Largest stable explicit step; the sentinel when nothing moves.
pub(crate) fn stable_time_step(network: &Network, grid: &TransportGrid, slope: f64) -> f64 {
    let diffusive = grid.diffusive_sum(network.element_count());
    network
        .elements()
        .iter()
        .enumerate()
        .filter(|(i, _)| grid.live[*i])
        .filter_map(|(i, e)| {
            let v = e.geometry.effective_volume;
            if v <= 0.0 {
                return None;
            }
            let rate = (e.state.flow.abs() * slope + diffusive[i]) / v;
            (rate > 0.0).then(|| 1.0 / rate)
        })
        .fold(TIME_STEP_SENTINEL, f64::min)
}

/// One explicit upwind step of `values` (by absolute index).
///
/// `carried` maps a stored value to the fraction moving with the flow
/// (identity for tracer, fractional flow for saturation). Mass influx is
/// written to `mass_flow` of every live element.
pub(crate) fn explicit_step<F>(
    network: &mut Network,
    grid: &TransportGrid,
    values: &[f64],
    inlet_value: f64,
    dt: f64,
    carried: F,
) -> Vec<f64>
where
    F: Fn(f64) -> f64 + Sync,
{
    let net = &*network;
    let node_count = net.node_count();

    // Nodes first: pore inflows plus whatever the reservoir pushes in.
    let node_influx: Vec<f64> = (0..node_count)
        .into_par_iter()
        .map(|i| {
            let node = &net.elements()[i];
            if !grid.live[i] {
                return 0.0;
            }
            let Some(ext) = node.as_node() else { return 0.0 };
            let mut influx = 0.0;
            for &pid in ext.connected_pores() {
                let Some(pore) = net.pore(pid) else { continue };
                let j = pore.abs_id.idx();
                let Some(pext) = pore.as_pore() else { continue };
                if !grid.live[j] {
                    continue;
                }
                let q = pore.state.flow;
                let into_node = if pext.node_out() == Some(node.id) { q } else { -q };
                if into_node > 0.0 {
                    influx += into_node * carried(values[j]);
                }
            }
            let (reservoir_in, _) = reservoir_exchange(net, i);
            if reservoir_in > 0.0 {
                let source = if node.inlet { inlet_value } else { 0.0 };
                influx += reservoir_in * carried(source);
            }
            influx
        })
        .collect();

    // Pores: upwind node value, or the reservoir for boundary pores.
    let pore_influx: Vec<f64> = net
        .pores()
        .par_iter()
        .map(|pore| {
            if !grid.live[pore.abs_id.idx()] {
                return 0.0;
            }
            let Some(ext) = pore.as_pore() else { return 0.0 };
            let q = pore.state.flow;
            let upstream = if q > 0.0 {
                Some(ext.node_in().map_or(inlet_value, |n| values[n.idx()]))
            } else if q < 0.0 {
                Some(ext.node_out().map_or(0.0, |n| values[n.idx()]))
            } else {
                None
            };
            upstream.map_or(0.0, |c| q.abs() * carried(c))
        })
        .collect();

    let mut diffusion = vec![0.0; net.element_count()];
    for &(i, j, d) in &grid.links {
        let flux = d * (values[j] - values[i]);
        diffusion[i] += flux;
        diffusion[j] -= flux;
    }

    let updated: Vec<f64> = net
        .elements()
        .par_iter()
        .enumerate()
        .map(|(k, e)| {
            if !grid.live[k] {
                return values[k];
            }
            let influx = if k < node_count {
                node_influx[k]
            } else {
                pore_influx[k - node_count]
            };
            let v = e.geometry.effective_volume;
            let outflux = e.state.flow.abs() * carried(values[k]);
            values[k] + dt * (influx - outflux + diffusion[k]) / v
        })
        .collect();

    let elements = network.elements_mut();
    for (k, e) in elements.iter_mut().enumerate() {
        if grid.live[k] {
            e.state.mass_flow = if k < node_count {
                node_influx[k]
            } else {
                pore_influx[k - node_count]
            };
        }
    }
    updated
}

/// First live element whose value left [0, 1] by more than `tolerance`.
pub(crate) fn check_bounds(
    network: &Network,
    grid: &TransportGrid,
    values: &[f64],
    tolerance: f64,
    what: &'static str,
) -> SimResult<()> {
    for (k, &v) in values.iter().enumerate() {
        if grid.live[k] && !is_unit_fraction(v, tolerance) {
            return Err(SimError::OutOfBounds {
                what,
                element: network.elements()[k].abs_id,
                value: v,
            });
        }
    }
    Ok(())
}

/// Total boundary outflow and the carried amount leaving with it.
pub(crate) fn outlet_flux<F>(network: &Network, values: &[f64], carried: F) -> (f64, f64)
where
    F: Fn(f64) -> f64,
{
    let mut total = 0.0;
    let mut mass = 0.0;
    for pore in network.pores() {
        let Some(ext) = pore.as_pore() else { continue };
        let q = pore.state.flow;
        if ext.node_out().is_none() && q > 0.0 {
            total += q;
            mass += q * carried(values[pore.abs_id.idx()]);
        }
    }
    for (i, node) in network.nodes().iter().enumerate() {
        if !node.outlet {
            continue;
        }
        let (_, out) = reservoir_exchange(network, i);
        total += out;
        mass += out * carried(values[i]);
    }
    (total, mass)
}

/// Inject tracer at the inlet and march the concentration field.
pub fn run_tracer(
    network: &mut Network,
    ctx: &SimContext,
    options: &TracerOptions,
    interrupt: &InterruptFlag,
    mut sink: EventSink<'_>,
) -> SimResult<TransportOutcome> {
    options.validate()?;
    ctx.fluids.validate()?;
    let timer = Timer::start();
    let stage = "tracer".to_string();

    // Carrier: bulk water of spanning water clusters.
    cluster_elements(network, ClusterSlot::Water, |e| bulk_phase(e) == Phase::Water);
    let live: Vec<bool> = network
        .elements()
        .iter()
        .map(|e| {
            e.is_open()
                && network
                    .cluster_of(e.abs_id, ClusterSlot::Water)
                    .is_some_and(|c| c.spanning())
        })
        .collect();
    assign_phase(network, Phase::Water, &ctx.fluids, |e| live[e.abs_id.idx()]);
    let solution = solve_pressure(network, &ctx.flow_problem())?;
    let diffusivity = options.diffusion.then_some(ctx.fluids.tracer_diffusivity);
    let grid = TransportGrid::new(network, live, diffusivity);

    let mut values: Vec<f64> = network.elements().iter().map(|e| e.state.concentration).collect();
    check_bounds(network, &grid, &values, options.bound_tolerance, "concentration")?;

    let pore_volume = network.total_volume();
    let q_in = solution.total_flow().max(0.0);
    let dt = stable_time_step(network, &grid, 1.0);
    info!(q = q_in, dt, live = grid.live.iter().filter(|l| **l).count(), "tracer injection started");

    let mut outcome = TransportOutcome {
        stage: stage.clone(),
        termination: Termination::TargetReached,
        steps: 0,
        time: 0.0,
        injected_pore_volumes: 0.0,
        effluent: 0.0,
    };
    if dt >= TIME_STEP_SENTINEL || pore_volume <= 0.0 {
        warn!("no flux through the water phase; tracer stage skipped");
        outcome.termination = Termination::Exhausted;
        return Ok(outcome);
    }

    let mut cadence = SnapshotCadence::new(0.0, options.snapshot_time_interval, network.water_saturation(), 0.0);
    let mut next_sample = 0.0;
    let identity = |c: f64| c;

    loop {
        if interrupt.is_requested() {
            outcome.termination = Termination::Interrupted;
            break;
        }
        if outcome.injected_pore_volumes >= options.injected_pore_volumes {
            outcome.termination = Termination::TargetReached;
            break;
        }
        if outcome.steps >= options.max_steps {
            outcome.termination = Termination::StepLimit;
            break;
        }

        values = explicit_step(network, &grid, &values, options.inlet_concentration, dt, identity);
        check_bounds(network, &grid, &values, options.bound_tolerance, "concentration")?;
        for (e, &c) in network.elements_mut().iter_mut().zip(&values) {
            e.state.concentration = c;
        }

        outcome.steps += 1;
        outcome.time += dt;
        outcome.injected_pore_volumes = q_in * outcome.time / pore_volume;
        let (out_q, out_mass) = outlet_flux(network, &values, identity);
        outcome.effluent = if out_q > 0.0 { out_mass / out_q } else { 0.0 };

        if outcome.injected_pore_volumes >= next_sample {
            next_sample = outcome.injected_pore_volumes + options.sample_interval_pv;
            emit(
                &mut sink,
                StageEvent::Transport(TransportSample {
                    stage: stage.clone(),
                    step: outcome.steps,
                    time: outcome.time,
                    injected_pore_volumes: outcome.injected_pore_volumes,
                    effluent_concentration: outcome.effluent,
                    mean_concentration: network.mean_concentration(),
                    sw: network.water_saturation(),
                }),
            );
            emit(
                &mut sink,
                StageEvent::Progress {
                    fraction: (outcome.injected_pore_volumes / options.injected_pore_volumes).min(1.0),
                    status: format!(
                        "tracer: {:.3} PV injected, effluent c = {:.4}",
                        outcome.injected_pore_volumes, outcome.effluent
                    ),
                },
            );
        }
        if cadence.due(network.water_saturation(), outcome.time) {
            emit(&mut sink, StageEvent::Snapshot(Snapshot::capture(network, &stage, outcome.time)));
        }
    }

    debug!(steps = outcome.steps, time = outcome.time, "tracer steps done");
    info!(
        termination = ?outcome.termination,
        pv = outcome.injected_pore_volumes,
        effluent = outcome.effluent,
        elapsed_s = timer.stop().unwrap_or(0.0),
        "tracer injection finished"
    );
    Ok(outcome)
}
