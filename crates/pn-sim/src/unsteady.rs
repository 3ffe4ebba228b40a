//! Unsteady-state water flooding with explicit saturation transport.
//!
//! Total flow follows the saturation-weighted mixture conductance; water
//! moves with the upwind fractional flow. An oil element whose water
//! fraction reaches the flip threshold turns water-filled, after which oil
//! is reclustered and ganglia that lost the outlet are frozen.

use pn_capillary::mixture_conductance;
use pn_core::TIME_STEP_SENTINEL;
use pn_core::timing::Timer;
use pn_network::{Network, Phase};
use pn_solver::solve_pressure;
use tracing::{debug, info, warn};

use crate::connectivity::{bulk_phase, update_trapping};
use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::events::{EventSink, Snapshot, SnapshotCadence, StageEvent, TransportSample, emit};
use crate::interrupt::InterruptFlag;
use crate::invasion::Termination;
use crate::transport::{TransportGrid, TransportOutcome, check_bounds, explicit_step, outlet_flux, stable_time_step};

/// Settings of an unsteady flooding stage.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsteadyOptions {
    /// Stop after this many pore volumes of water have been injected
    pub injected_pore_volumes: f64,
    /// Water fraction at which an oil element flips to water
    pub flip_threshold: f64,
    pub max_steps: usize,
    pub bound_tolerance: f64,
    /// Re-solve the pressure field every this many steps
    pub pressure_update_interval: usize,
    pub sample_interval_pv: f64,
    pub snapshot_sw_interval: f64,
    pub snapshot_time_interval: f64,
}

impl Default for UnsteadyOptions {
    fn default() -> Self {
        Self {
            injected_pore_volumes: 3.0,
            flip_threshold: 0.5,
            max_steps: 1_000_000,
            bound_tolerance: 1e-9,
            pressure_update_interval: 1,
            sample_interval_pv: 0.01,
            snapshot_sw_interval: 0.0,
            snapshot_time_interval: 0.0,
        }
    }
}

impl UnsteadyOptions {
    pub fn validate(&self) -> SimResult<()> {
        if !self.injected_pore_volumes.is_finite() || self.injected_pore_volumes <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "injected pore volumes must be positive",
            });
        }
        if !(self.flip_threshold > 0.0 && self.flip_threshold < 1.0) {
            return Err(SimError::InvalidArg {
                what: "flip threshold must lie strictly between 0 and 1",
            });
        }
        if self.pressure_update_interval == 0 {
            return Err(SimError::InvalidArg {
                what: "pressure update interval must be at least 1",
            });
        }
        Ok(())
    }
}

/// Water fractional flow f = (s/μw) / (s/μw + (1 − s)/μo).
pub fn fractional_flow(s: f64, viscosity_ratio: f64) -> f64 {
    let s = s.clamp(0.0, 1.0);
    let denom = s + viscosity_ratio * (1.0 - s);
    if denom > 0.0 { s / denom } else { 0.0 }
}

/// Largest slope of [`fractional_flow`] over [0, 1] for μw/μo = `viscosity_ratio`.
pub fn max_fractional_slope(viscosity_ratio: f64) -> f64 {
    viscosity_ratio.max(1.0 / viscosity_ratio)
}

fn live_elements(network: &Network) -> Vec<bool> {
    network
        .elements()
        .iter()
        .map(|e| e.is_open() && !(bulk_phase(e) == Phase::Oil && e.state.oil_trapped))
        .collect()
}

fn assign_mixture(network: &mut Network, live: &[bool], ctx: &SimContext) {
    for (k, e) in network.elements_mut().iter_mut().enumerate() {
        if !e.is_open() {
            continue;
        }
        if live[k] {
            e.state.conductivity = mixture_conductance(&e.geometry, e.state.water_fraction, &ctx.fluids);
            e.state.active = true;
        } else {
            e.state.conductivity = 0.0;
            e.state.active = false;
            e.state.flow = 0.0;
        }
    }
}

/// Flip oil elements past the threshold; returns how many flipped.
fn flip_phases(network: &mut Network, threshold: f64) -> usize {
    let mut flipped = 0;
    for e in network.elements_mut().iter_mut().filter(|e| e.is_open()) {
        if bulk_phase(e) == Phase::Oil && !e.state.oil_trapped && e.state.water_fraction >= threshold {
            e.state.phase = Phase::Water;
            flipped += 1;
        }
    }
    flipped
}

/// Inject water at the inlet and advance the water fraction in time.
pub fn run_unsteady(
    network: &mut Network,
    ctx: &SimContext,
    options: &UnsteadyOptions,
    interrupt: &InterruptFlag,
    mut sink: EventSink<'_>,
) -> SimResult<TransportOutcome> {
    options.validate()?;
    ctx.fluids.validate()?;
    let timer = Timer::start();
    let stage = "unsteady water flood".to_string();

    let ratio = ctx.fluids.viscosity(Phase::Water) / ctx.fluids.viscosity(Phase::Oil);
    let slope = max_fractional_slope(ratio);
    let carried = move |s: f64| fractional_flow(s, ratio);
    let pore_volume = network.total_volume();

    update_trapping(network, Phase::Oil);
    let mut live = live_elements(network);
    let mut values: Vec<f64> = network.elements().iter().map(|e| e.state.water_fraction).collect();

    let mut outcome = TransportOutcome {
        stage: stage.clone(),
        termination: Termination::TargetReached,
        steps: 0,
        time: 0.0,
        injected_pore_volumes: 0.0,
        effluent: 0.0,
    };
    let mut cadence = SnapshotCadence::new(
        options.snapshot_sw_interval,
        options.snapshot_time_interval,
        network.water_saturation(),
        0.0,
    );
    let mut next_sample = 0.0;
    let mut q_in = 0.0;
    let mut flipped_total = 0;
    let mut resolve = true;
    info!(ratio, "unsteady water flood started");

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

        if resolve || outcome.steps % options.pressure_update_interval == 0 {
            resolve = false;
            assign_mixture(network, &live, ctx);
            q_in = solve_pressure(network, &ctx.flow_problem())?.total_flow().max(0.0);
        }
        let grid = TransportGrid::new(network, live.clone(), None);
        let dt = stable_time_step(network, &grid, slope);
        if dt >= TIME_STEP_SENTINEL || pore_volume <= 0.0 {
            warn!("no flux left; unsteady flood stopped");
            outcome.termination = Termination::Exhausted;
            break;
        }

        values = explicit_step(network, &grid, &values, 1.0, dt, carried);
        check_bounds(network, &grid, &values, options.bound_tolerance, "water fraction")?;
        for (k, e) in network.elements_mut().iter_mut().enumerate() {
            if grid.live[k] {
                e.state.water_fraction = values[k];
                e.state.oil_fraction = 1.0 - values[k];
            }
        }

        let flipped = flip_phases(network, options.flip_threshold);
        if flipped > 0 {
            flipped_total += flipped;
            let trapped = update_trapping(network, Phase::Oil);
            live = live_elements(network);
            resolve = true;
            debug!(flipped, trapped, "phase flips");
        }

        outcome.steps += 1;
        outcome.time += dt;
        outcome.injected_pore_volumes += q_in * dt / pore_volume;
        let (out_q, out_water) = outlet_flux(network, &values, carried);
        outcome.effluent = if out_q > 0.0 { out_water / out_q } else { 0.0 };

        let sw = network.water_saturation();
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
                    sw,
                }),
            );
            emit(
                &mut sink,
                StageEvent::Progress {
                    fraction: (outcome.injected_pore_volumes / options.injected_pore_volumes).min(1.0),
                    status: format!(
                        "unsteady flood: {:.3} PV injected, Sw = {:.4}",
                        outcome.injected_pore_volumes, sw
                    ),
                },
            );
        }
        if cadence.due(sw, outcome.time) {
            emit(&mut sink, StageEvent::Snapshot(Snapshot::capture(network, &stage, outcome.time)));
        }
    }

    info!(
        termination = ?outcome.termination,
        pv = outcome.injected_pore_volumes,
        flipped = flipped_total,
        sw = network.water_saturation(),
        elapsed_s = timer.stop().unwrap_or(0.0),
        "unsteady water flood finished"
    );
    Ok(outcome)
}
