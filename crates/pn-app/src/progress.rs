use pn_sim::{CurveSample, Snapshot, TransportSample};

use crate::orchestrator::StageReport;

/// Run-level progress: overall percentage and the active stage's status.
#[derive(Debug, Clone, PartialEq)]
pub struct RunProgress {
    /// 0–100 over the whole stage list
    pub percent: u8,
    pub stage_index: usize,
    pub stage_count: usize,
    pub stage: String,
    pub status: String,
}

impl RunProgress {
    pub fn new(stage_index: usize, stage_count: usize, fraction: f64, stage: &str, status: String) -> Self {
        Self {
            percent: overall_percent(stage_index, stage_count, fraction),
            stage_index,
            stage_count,
            stage: stage.to_string(),
            status,
        }
    }
}

/// Fold a stage-local fraction into a percentage over `count` stages.
pub fn overall_percent(index: usize, count: usize, fraction: f64) -> u8 {
    if count == 0 {
        return 100;
    }
    let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    let overall = (index.min(count) as f64 + fraction) / count as f64;
    (overall * 100.0).floor().clamp(0.0, 100.0) as u8
}

/// Everything a run reports while it executes.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Progress(RunProgress),
    Curve(CurveSample),
    Transport(TransportSample),
    Snapshot(Snapshot),
    StageFinished(StageReport),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_spans_all_stages() {
        assert_eq!(overall_percent(0, 4, 0.0), 0);
        assert_eq!(overall_percent(1, 4, 0.5), 37);
        assert_eq!(overall_percent(3, 4, 1.0), 100);
        assert_eq!(overall_percent(2, 4, f64::NAN), 50);
    }
}
