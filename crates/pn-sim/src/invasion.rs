//! Quasi-static invasion skeleton shared by every displacement cycle.
//!
//! A stage walks the imposed capillary pressure from the strategy's start to
//! its extreme. At each pressure it alternates snap-off and frontier invasion
//! passes with trapping updates until nothing more invades, then refreshes
//! corner films and reports a curve sample.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use pn_capillary::{clear_films, update_films};
use pn_core::timing::Timer;
use pn_network::{Element, Network, Phase};
use tracing::{debug, info};

use crate::connectivity::{bulk_phase, cluster_phase_continuity, reaches_inlet, release_trapped, update_trapping};
use crate::context::SimContext;
use crate::error::{SimError, SimResult};
use crate::events::{CurveSample, EventSink, Snapshot, SnapshotCadence, StageEvent, emit};
use crate::interrupt::InterruptFlag;
use crate::relperm::RelPermEvaluator;
use crate::strategy::{Displacement, Sweep};

/// Numerical settings of a displacement stage.
#[derive(Debug, Clone, PartialEq)]
pub struct InvasionOptions {
    /// Capillary pressure increment per step (Pa)
    pub pressure_increment: f64,
    /// Magnitude of the sweep extreme (Pa)
    pub max_capillary_pressure: f64,
    /// Stop once water saturation reaches this value
    pub target_saturation: Option<f64>,
    /// Minimum ratio of the smaller endpoint node radius to the pore radius
    /// for a pore to snap off
    pub snap_off_aspect_ratio: f64,
    pub compute_relperm: bool,
    /// Emit a snapshot whenever Sw moves by this much (0 disables)
    pub snapshot_sw_interval: f64,
}

impl Default for InvasionOptions {
    fn default() -> Self {
        Self {
            pressure_increment: 500.0,
            max_capillary_pressure: 1.0e5,
            target_saturation: None,
            snap_off_aspect_ratio: 1.0,
            compute_relperm: false,
            snapshot_sw_interval: 0.0,
        }
    }
}

impl InvasionOptions {
    pub fn validate(&self) -> SimResult<()> {
        if !self.pressure_increment.is_finite() || self.pressure_increment <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "pressure increment must be positive",
            });
        }
        if !self.max_capillary_pressure.is_finite() || self.max_capillary_pressure <= 0.0 {
            return Err(SimError::InvalidArg {
                what: "maximum capillary pressure must be positive",
            });
        }
        if self.target_saturation.is_some_and(|t| !(0.0..=1.0).contains(&t)) {
            return Err(SimError::InvalidArg {
                what: "target saturation must lie in [0, 1]",
            });
        }
        if !self.snap_off_aspect_ratio.is_finite() || self.snap_off_aspect_ratio < 0.0 {
            return Err(SimError::InvalidArg {
                what: "snap-off aspect ratio must be non-negative",
            });
        }
        Ok(())
    }
}

/// Why a stage stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    TargetReached,
    /// Nothing left that could ever be invaded (or no flux left to transport)
    Exhausted,
    /// The sweep reached its extreme with nothing invadable
    ExtremeReached,
    /// The configured step limit was hit
    StepLimit,
    Interrupted,
}

/// Summary of a finished displacement stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub stage: String,
    pub termination: Termination,
    /// Pressure steps taken
    pub steps: usize,
    /// Elements filled by piston-like invasion
    pub invaded: usize,
    /// Pores filled by snap-off
    pub snapped: usize,
    /// Snap-off/frontier passes over all pressure steps
    pub passes: usize,
    pub final_pc: f64,
    pub final_sw: f64,
}

/// Run one displacement cycle on `network`.
///
/// Interruption is polled before every pressure step; the step in progress
/// always completes.
pub fn run_displacement(
    network: &mut Network,
    displacement: &dyn Displacement,
    ctx: &SimContext,
    options: &InvasionOptions,
    interrupt: &InterruptFlag,
    mut sink: EventSink<'_>,
) -> SimResult<StageOutcome> {
    options.validate()?;
    ctx.fluids.validate()?;
    let timer = Timer::start();

    let sweep = displacement.sweep();
    let invading = displacement.invading();
    let displaced = displacement.displaced();
    let start = displacement.start_pressure(options.max_capillary_pressure);
    let end = displacement.end_pressure(options.max_capillary_pressure);
    let sigma = ctx.fluids.interfacial_tension;
    info!(stage = displacement.name(), start, end, "displacement started");

    release_trapped(network, invading);
    update_trapping(network, displaced);
    let relperm = if options.compute_relperm {
        Some(RelPermEvaluator::new(network, ctx)?)
    } else {
        None
    };

    let mut cadence = SnapshotCadence::new(options.snapshot_sw_interval, 0.0, network.water_saturation(), 0.0);
    let mut outcome = StageOutcome {
        stage: displacement.name().to_string(),
        termination: Termination::Exhausted,
        steps: 0,
        invaded: 0,
        snapped: 0,
        passes: 0,
        final_pc: start,
        final_sw: network.water_saturation(),
    };
    let mut pc = start;
    let mut at_end = false;

    loop {
        if interrupt.is_requested() {
            outcome.termination = Termination::Interrupted;
            break;
        }
        if options
            .target_saturation
            .is_some_and(|t| displacement.target_reached(outcome.final_sw, t))
        {
            outcome.termination = Termination::TargetReached;
            break;
        }
        let remaining = remaining_thresholds(network, displacement, options, sigma);
        if remaining.is_empty() {
            outcome.termination = Termination::Exhausted;
            break;
        }
        if at_end {
            outcome.termination = Termination::ExtremeReached;
            break;
        }

        pc = next_pressure(sweep, pc, options.pressure_increment, end, &remaining);
        at_end = pc == end;

        let step = invade_at(network, displacement, options, sigma, pc);
        update_films(network, pc, &ctx.fluids, ctx.corner_resistance);
        outcome.steps += 1;
        outcome.invaded += step.invaded;
        outcome.snapped += step.snapped;
        outcome.passes += step.passes;
        outcome.final_pc = pc;
        outcome.final_sw = network.water_saturation();

        let kr = match &relperm {
            Some(eval) => Some(eval.evaluate(network, ctx)?),
            None => None,
        };
        debug!(
            step = outcome.steps,
            pc,
            sw = outcome.final_sw,
            invaded = step.invaded,
            snapped = step.snapped,
            passes = step.passes,
            "pressure step"
        );

        emit(
            &mut sink,
            StageEvent::Curve(CurveSample {
                stage: outcome.stage.clone(),
                step: outcome.steps,
                sw: outcome.final_sw,
                pc,
                krw: kr.map(|k| k.krw),
                kro: kr.map(|k| k.kro),
            }),
        );
        if cadence.due(outcome.final_sw, 0.0) {
            emit(&mut sink, StageEvent::Snapshot(Snapshot::capture(network, &outcome.stage, 0.0)));
        }
        emit(
            &mut sink,
            StageEvent::Progress {
                fraction: sweep_fraction(start, end, pc),
                status: format!("{}: Pc = {:.1} Pa, Sw = {:.4}", outcome.stage, pc, outcome.final_sw),
            },
        );
    }

    info!(
        stage = displacement.name(),
        termination = ?outcome.termination,
        steps = outcome.steps,
        sw = outcome.final_sw,
        elapsed_s = timer.stop().unwrap_or(0.0),
        "displacement finished"
    );
    Ok(outcome)
}

fn sweep_fraction(start: f64, end: f64, pc: f64) -> f64 {
    let span = end - start;
    if span == 0.0 {
        1.0
    } else {
        ((pc - start) / span).clamp(0.0, 1.0)
    }
}

/// Pressure of the next step: one increment ahead, or straight to the
/// nearest remaining threshold when none lies within the increment.
///
/// An increment lost to rounding at `pc` goes straight to `end`, so the
/// sweep always moves.
pub(crate) fn next_pressure(sweep: Sweep, pc: f64, increment: f64, end: f64, remaining: &[f64]) -> f64 {
    let stepped = sweep.advance(pc, increment, end);
    let nearest = remaining
        .iter()
        .copied()
        .filter(|t| sweep.ahead(pc, *t))
        .reduce(|a, b| sweep.nearer(a, b));
    match nearest {
        Some(t) if sweep.ahead(stepped, t) => sweep.nearer(t, end),
        _ if stepped == pc => end,
        _ => stepped,
    }
}

/// Whether `element` still holds untrapped displaced phase.
fn is_candidate(element: &Element, displaced: Phase) -> bool {
    element.is_open() && bulk_phase(element) == displaced && !element.state.is_trapped(displaced)
}

/// Ratio test between a pore and its narrowest endpoint node.
fn snap_off_geometry_ok(network: &Network, pore: &Element, aspect_ratio: f64) -> bool {
    let (a, b) = network.pore_endpoints(pore);
    let smallest = [a, b]
        .into_iter()
        .flatten()
        .filter_map(|id| network.element(id))
        .map(|n| n.geometry.radius)
        .reduce(f64::min);
    smallest.is_some_and(|r| r >= aspect_ratio * pore.geometry.radius)
}

fn snap_off_threshold(
    network: &Network,
    element: &Element,
    displacement: &dyn Displacement,
    options: &InvasionOptions,
    sigma: f64,
) -> Option<f64> {
    if !element.is_pore() || !snap_off_geometry_ok(network, element, options.snap_off_aspect_ratio) {
        return None;
    }
    displacement.snap_off_pressure(element, sigma)
}

/// Every threshold of elements that could still be invaded.
fn remaining_thresholds(
    network: &Network,
    displacement: &dyn Displacement,
    options: &InvasionOptions,
    sigma: f64,
) -> Vec<f64> {
    let displaced = displacement.displaced();
    network
        .elements()
        .iter()
        .filter(|e| is_candidate(e, displaced))
        .flat_map(|e| {
            [
                displacement.entry_pressure(e, sigma),
                snap_off_threshold(network, e, displacement, options, sigma),
            ]
        })
        .flatten()
        .filter(|t| t.is_finite())
        .collect()
}

/// Invasions made at one capillary pressure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct StepInvasion {
    invaded: usize,
    snapped: usize,
    passes: usize,
}

/// Repeat snap-off and frontier passes at `pc` until nothing invades.
fn invade_at(
    network: &mut Network,
    displacement: &dyn Displacement,
    options: &InvasionOptions,
    sigma: f64,
    pc: f64,
) -> StepInvasion {
    let invading = displacement.invading();
    let displaced = displacement.displaced();
    let sweep = displacement.sweep();
    let mut step = StepInvasion::default();

    loop {
        step.passes += 1;
        cluster_phase_continuity(network, invading);
        update_trapping(network, displaced);

        let net = &*network;
        let mut connected: Vec<bool> = net
            .elements()
            .iter()
            .map(|e| e.is_open() && bulk_phase(e) == invading && reaches_inlet(net, e, invading))
            .collect();

        // Snap-off needs connected invading films in the pore itself.
        let snap: Vec<usize> = net
            .elements()
            .iter()
            .filter(|e| is_candidate(e, displaced))
            .filter(|e| e.state.film_volume(invading) > 0.0 && reaches_inlet(net, e, invading))
            .filter(|e| {
                snap_off_threshold(net, e, displacement, options, sigma)
                    .is_some_and(|t| sweep.crossed(pc, t))
            })
            .map(|e| e.abs_id.idx())
            .collect();
        for &i in &snap {
            invade(&mut network.elements_mut()[i], invading);
            connected[i] = true;
        }

        let bulk = invade_frontier(network, displacement, sigma, pc, &mut connected);
        if snap.is_empty() && bulk == 0 {
            break;
        }
        step.snapped += snap.len();
        step.invaded += bulk;
    }
    step
}

/// Grow the invading phase from its inlet-connected front at `pc`.
///
/// Elements leave the frontier in ascending id; each invasion pushes the
/// neighbours whose entry threshold is crossed. Returns the number invaded.
fn invade_frontier(
    network: &mut Network,
    displacement: &dyn Displacement,
    sigma: f64,
    pc: f64,
    connected: &mut [bool],
) -> usize {
    let invading = displacement.invading();
    let displaced = displacement.displaced();
    let sweep = displacement.sweep();
    let qualifies = |e: &Element| {
        is_candidate(e, displaced)
            && displacement
                .entry_pressure(e, sigma)
                .is_some_and(|t| sweep.crossed(pc, t))
    };

    let mut queued = vec![false; network.element_count()];
    let mut frontier = BinaryHeap::new();
    for e in network.elements() {
        let touches_front = e.inlet || e.neighbors().iter().any(|n| connected[n.idx()]);
        if touches_front && qualifies(e) {
            queued[e.abs_id.idx()] = true;
            frontier.push(Reverse(e.abs_id.idx()));
        }
    }

    let mut invaded = 0;
    while let Some(Reverse(i)) = frontier.pop() {
        invade(&mut network.elements_mut()[i], invading);
        connected[i] = true;
        invaded += 1;

        let net = &*network;
        for &nb in net.elements()[i].neighbors() {
            let k = nb.idx();
            if !queued[k] && net.element(nb).is_some_and(qualifies) {
                queued[k] = true;
                frontier.push(Reverse(k));
            }
        }
    }
    invaded
}

/// Fill `element` with `phase`; corner films are rebuilt after the step.
fn invade(element: &mut Element, phase: Phase) {
    element.fill(phase);
    clear_films(element);
    element.state.set_trapped(phase, false);
    element.state.set_trapped(phase.opposite(), false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_pressure_steps_or_jumps() {
        // Threshold inside the increment: plain step.
        assert_eq!(next_pressure(Sweep::Rising, 0.0, 100.0, 1e4, &[50.0, 900.0]), 100.0);
        // Nothing within the increment: jump to the nearest threshold.
        assert_eq!(next_pressure(Sweep::Rising, 0.0, 100.0, 1e4, &[900.0, 700.0]), 700.0);
        // Jumps never pass the extreme.
        assert_eq!(next_pressure(Sweep::Rising, 0.0, 100.0, 500.0, &[900.0]), 500.0);
        // Thresholds already behind the pressure do not pull it back.
        assert_eq!(next_pressure(Sweep::Rising, 400.0, 100.0, 1e4, &[50.0]), 500.0);
        // Falling sweeps mirror the rule.
        assert_eq!(next_pressure(Sweep::Falling, 0.0, 100.0, -1e4, &[-800.0, -650.0]), -650.0);
        assert_eq!(next_pressure(Sweep::Falling, 1e4, 100.0, 0.0, &[9950.0]), 9900.0);
    }

    #[test]
    fn rounded_away_increment_goes_to_extreme() {
        let pc = 6825.749668401294;
        assert_eq!(pc + 1e-13, pc);
        assert_eq!(next_pressure(Sweep::Rising, pc, 1e-13, 1e5, &[50.0]), 1e5);
        assert_eq!(next_pressure(Sweep::Falling, -pc, 1e-13, -1e5, &[]), -1e5);
        // A threshold still ahead wins over the extreme.
        assert_eq!(next_pressure(Sweep::Rising, pc, 1e-13, 1e5, &[7000.0]), 7000.0);
    }

    #[test]
    fn rejects_bad_options() {
        let mut options = InvasionOptions::default();
        assert!(options.validate().is_ok());
        options.pressure_increment = 0.0;
        assert!(options.validate().is_err());
        options = InvasionOptions {
            target_saturation: Some(1.5),
            ..InvasionOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn sweep_fraction_is_clamped() {
        assert_eq!(sweep_fraction(0.0, 100.0, 50.0), 0.5);
        assert_eq!(sweep_fraction(100.0, 0.0, 25.0), 0.75);
        assert_eq!(sweep_fraction(0.0, 0.0, 25.0), 1.0);
    }
}
