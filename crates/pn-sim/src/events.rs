//! Samples and snapshots emitted while a stage runs.

use pn_network::Network;
use serde::Serialize;

/// One point of a capillary-pressure / relative-permeability curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurveSample {
    pub stage: String,
    pub step: usize,
    pub sw: f64,
    /// Capillary pressure P_oil − P_water (Pa)
    pub pc: f64,
    pub krw: Option<f64>,
    pub kro: Option<f64>,
}

/// One point of a transport history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportSample {
    pub stage: String,
    pub step: usize,
    /// Simulated time (s)
    pub time: f64,
    pub injected_pore_volumes: f64,
    /// Flux-weighted concentration leaving through the outlet
    pub effluent_concentration: f64,
    pub mean_concentration: f64,
    pub sw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementRecord {
    pub id: u32,
    pub phase: &'static str,
    pub concentration: f64,
    pub water_fraction: f64,
}

/// Per-element state at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub stage: String,
    pub sw: f64,
    pub time: f64,
    pub elements: Vec<ElementRecord>,
}

impl Snapshot {
    /// Capture the open elements of `network`.
    pub fn capture(network: &Network, stage: &str, time: f64) -> Self {
        let elements = network
            .elements()
            .iter()
            .filter(|e| e.is_open())
            .map(|e| ElementRecord {
                id: e.abs_id.index(),
                phase: e.state.phase.name(),
                concentration: e.state.concentration,
                water_fraction: e.state.water_fraction,
            })
            .collect();
        Self {
            stage: stage.to_string(),
            sw: network.water_saturation(),
            time,
            elements,
        }
    }
}

/// Everything a running stage reports.
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// Fraction of the stage completed in [0, 1] and a short status line
    Progress { fraction: f64, status: String },
    Curve(CurveSample),
    Transport(TransportSample),
    Snapshot(Snapshot),
}

/// Callback receiving stage events.
pub type EventSink<'a> = Option<&'a mut dyn FnMut(StageEvent)>;

pub(crate) fn emit(sink: &mut EventSink<'_>, event: StageEvent) {
    if let Some(cb) = sink.as_mut() {
        cb(event);
    }
}

/// Decides when a snapshot is due from saturation or time movement.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SnapshotCadence {
    sw_interval: f64,
    time_interval: f64,
    last_sw: f64,
    last_time: f64,
}

impl SnapshotCadence {
    pub(crate) fn new(sw_interval: f64, time_interval: f64, sw: f64, time: f64) -> Self {
        Self {
            sw_interval,
            time_interval,
            last_sw: sw,
            last_time: time,
        }
    }

    /// True (and the reference moves) when either interval has been exceeded.
    pub(crate) fn due(&mut self, sw: f64, time: f64) -> bool {
        let by_sw = self.sw_interval > 0.0 && (sw - self.last_sw).abs() >= self.sw_interval;
        let by_time = self.time_interval > 0.0 && time - self.last_time >= self.time_interval;
        if by_sw || by_time {
            self.last_sw = sw;
            self.last_time = time;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_triggers_on_either_interval() {
        let mut c = SnapshotCadence::new(0.1, 0.0, 1.0, 0.0);
        assert!(!c.due(0.95, 10.0));
        assert!(c.due(0.89, 10.0));
        assert!(!c.due(0.85, 20.0));

        let mut t = SnapshotCadence::new(0.0, 5.0, 1.0, 0.0);
        assert!(!t.due(0.5, 4.0));
        assert!(t.due(0.5, 5.0));
        assert!(!t.due(0.5, 9.0));
    }

    #[test]
    fn disabled_cadence_never_fires() {
        let mut c = SnapshotCadence::new(0.0, 0.0, 1.0, 0.0);
        assert!(!c.due(0.0, 1e9));
    }
}
