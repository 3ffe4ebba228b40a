//! Sequential execution of the configured stages over one network.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use pn_capillary::apply_ageing;
use pn_core::timing::{PerfStats, engine_timing};
use pn_network::{Network, Phase, Wettability};
use pn_sim::{
    CurveSample, InterruptFlag, SimContext, SimResult, Snapshot, StageEvent, Termination,
    TransportSample, displacement, run_displacement, run_tracer, run_unsteady,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{SimulationConfig, StageDef, validate_config};
use crate::error::{AppError, AppResult};
use crate::progress::{RunEvent, RunProgress};

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Completed,
    TargetReached,
    Exhausted,
    ExtremeReached,
    StepLimit,
    Interrupted,
}

impl From<Termination> for StageStatus {
    fn from(t: Termination) -> Self {
        match t {
            Termination::TargetReached => StageStatus::TargetReached,
            Termination::Exhausted => StageStatus::Exhausted,
            Termination::ExtremeReached => StageStatus::ExtremeReached,
            Termination::StepLimit => StageStatus::StepLimit,
            Termination::Interrupted => StageStatus::Interrupted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub index: usize,
    pub label: String,
    pub status: StageStatus,
    /// Pressure steps or time steps taken
    pub steps: usize,
    pub final_sw: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_pc: Option<f64>,
    /// Simulated time for transport stages (s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injected_pore_volumes: Option<f64>,
    pub elapsed_s: f64,
}

/// Run metadata written to the run folder at finalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub started_at: String,
    pub finished_at: String,
    pub interrupted: bool,
    pub stages: Vec<StageReport>,
    /// Stages never started because of an interruption
    pub skipped: Vec<String>,
    pub final_sw: f64,
    pub total_time_s: f64,
}

/// Everything collected over one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_dir: Option<PathBuf>,
    pub curves: Vec<CurveSample>,
    pub transport: Vec<TransportSample>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<Snapshot>,
}

/// Callback receiving run events.
pub type RunObserver<'a> = Option<&'a mut dyn FnMut(RunEvent)>;

fn notify(observer: &mut RunObserver<'_>, event: RunEvent) {
    if let Some(cb) = observer.as_deref_mut() {
        cb(event);
    }
}

/// Runs a validated configuration's stages in order.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: SimulationConfig,
    ctx: SimContext,
    interrupt: InterruptFlag,
}

impl Orchestrator {
    /// Validate `config`; every issue is reported at once.
    pub fn new(config: SimulationConfig) -> AppResult<Self> {
        Self::with_interrupt(config, InterruptFlag::new())
    }

    pub fn with_interrupt(config: SimulationConfig, interrupt: InterruptFlag) -> AppResult<Self> {
        let issues = validate_config(&config);
        if !issues.is_empty() {
            return Err(AppError::Validation(issues));
        }
        let ctx = config.context();
        Ok(Self {
            config,
            ctx,
            interrupt,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Flag polled by the running stage; setting it skips the remaining stages.
    pub fn interrupt_flag(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Run every stage on `network`, starting from a water-saturated,
    /// water-wet state.
    pub fn run(&self, network: &mut Network, mut observer: RunObserver<'_>) -> AppResult<RunReport> {
        let wall = Instant::now();
        let started = Utc::now();
        let mut perf = PerfStats::default();
        engine_timing::reset_all();

        network.check_closed_invariant()?;
        let run_dir = match &self.config.output.run_root {
            Some(root) => Some(prepare_run_folder(root, &self.config, started)?),
            None => None,
        };
        network.saturate(Phase::Water, Wettability::WaterWet, self.config.initial_contact_angle());
        perf.setup_time_s = wall.elapsed().as_secs_f64();

        let count = self.config.stages.len();
        info!(name = %self.config.name, stages = count, "run started");

        let mut stages = Vec::with_capacity(count);
        let mut curves = Vec::new();
        let mut transport = Vec::new();
        let mut snapshots = Vec::new();
        let mut skipped = Vec::new();
        let mut interrupted = false;

        for (index, stage) in self.config.stages.iter().enumerate() {
            if interrupted || self.interrupt.is_requested() {
                interrupted = true;
                skipped.push(stage.label().to_string());
                continue;
            }
            let label = stage.label();
            notify(
                &mut observer,
                RunEvent::Progress(RunProgress::new(index, count, 0.0, label, format!("{label}: starting"))),
            );

            let stage_start = Instant::now();
            let keep_snapshots = self.config.output.keep_snapshots;
            let result = {
                let mut forward = |event: StageEvent| match event {
                    StageEvent::Progress { fraction, status } => notify(
                        &mut observer,
                        RunEvent::Progress(RunProgress::new(index, count, fraction, label, status)),
                    ),
                    StageEvent::Curve(sample) => {
                        curves.push(sample.clone());
                        notify(&mut observer, RunEvent::Curve(sample));
                    }
                    StageEvent::Transport(sample) => {
                        transport.push(sample.clone());
                        notify(&mut observer, RunEvent::Transport(sample));
                    }
                    StageEvent::Snapshot(snapshot) => {
                        if keep_snapshots {
                            snapshots.push(snapshot.clone());
                        }
                        notify(&mut observer, RunEvent::Snapshot(snapshot));
                    }
                };
                self.run_stage(index, stage, network, &mut forward)
            };

            let mut report = match result {
                Ok(report) => report,
                Err(e) => {
                    error!(stage = label, error = %e, "stage failed");
                    notify(
                        &mut observer,
                        RunEvent::Progress(RunProgress::new(index, count, 0.0, label, format!("{label} failed: {e}"))),
                    );
                    return Err(e.into());
                }
            };
            report.elapsed_s = stage_start.elapsed().as_secs_f64();
            perf.stage_times_s.push((label.to_string(), report.elapsed_s));
            match stage {
                StageDef::Tracer(_) | StageDef::UnsteadyFlood(_) => perf.time_steps += report.steps,
                _ => perf.pressure_steps += report.steps,
            }

            if report.status == StageStatus::Interrupted {
                warn!(stage = label, "run interrupted");
                interrupted = true;
            }
            let fraction = if interrupted { 0.0 } else { 1.0 };
            notify(
                &mut observer,
                RunEvent::Progress(RunProgress::new(
                    index,
                    count,
                    fraction,
                    label,
                    format!("{label}: {:?}", report.status),
                )),
            );
            notify(&mut observer, RunEvent::StageFinished(report.clone()));
            stages.push(report);
        }

        perf.total_time_s = wall.elapsed().as_secs_f64();
        for line in perf.summary_lines() {
            info!("{line}");
        }

        let summary = RunSummary {
            name: self.config.name.clone(),
            started_at: started.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            interrupted,
            stages,
            skipped,
            final_sw: network.water_saturation(),
            total_time_s: perf.total_time_s,
        };
        if let Some(dir) = &run_dir {
            write_json(&dir.join("summary.json"), &summary)?;
        }
        info!(
            name = %summary.name,
            interrupted,
            sw = summary.final_sw,
            elapsed_s = summary.total_time_s,
            "run finished"
        );

        Ok(RunReport {
            summary,
            run_dir,
            curves,
            transport,
            snapshots,
        })
    }

    fn run_stage(
        &self,
        index: usize,
        stage: &StageDef,
        network: &mut Network,
        forward: &mut dyn FnMut(StageEvent),
    ) -> SimResult<StageReport> {
        let output = &self.config.output;
        let mut report = StageReport {
            index,
            label: stage.label().to_string(),
            status: StageStatus::Completed,
            steps: 0,
            final_sw: network.water_saturation(),
            final_pc: None,
            time_s: None,
            injected_pore_volumes: None,
            elapsed_s: 0.0,
        };

        match stage {
            StageDef::Ageing(def) => {
                let altered = apply_ageing(network, &def.to_ageing());
                info!(altered, "wettability aged");
                forward(StageEvent::Progress {
                    fraction: 1.0,
                    status: format!("ageing: {altered} elements oil-wet"),
                });
            }
            StageDef::Tracer(def) => {
                let outcome = run_tracer(network, &self.ctx, &def.to_options(output), &self.interrupt, Some(forward))?;
                report.status = outcome.termination.into();
                report.steps = outcome.steps;
                report.time_s = Some(outcome.time);
                report.injected_pore_volumes = Some(outcome.injected_pore_volumes);
            }
            StageDef::UnsteadyFlood(def) => {
                let outcome =
                    run_unsteady(network, &self.ctx, &def.to_options(output), &self.interrupt, Some(forward))?;
                report.status = outcome.termination.into();
                report.steps = outcome.steps;
                report.time_s = Some(outcome.time);
                report.injected_pore_volumes = Some(outcome.injected_pore_volumes);
            }
            other => {
                // Every remaining variant is a displacement cycle.
                if let Some((kind, def)) = other.displacement() {
                    let strategy = displacement(kind);
                    let outcome = run_displacement(
                        network,
                        strategy.as_ref(),
                        &self.ctx,
                        &def.to_options(output),
                        &self.interrupt,
                        Some(forward),
                    )?;
                    report.status = outcome.termination.into();
                    report.steps = outcome.steps;
                    report.final_pc = Some(outcome.final_pc);
                }
            }
        }
        report.final_sw = network.water_saturation();
        Ok(report)
    }
}

/// Create `<root>/<name>-<timestamp>` and store the resolved configuration in it.
fn prepare_run_folder(root: &Path, config: &SimulationConfig, started: DateTime<Utc>) -> AppResult<PathBuf> {
    let slug: String = config
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let dir = root.join(format!("{slug}-{}", started.format("%Y%m%dT%H%M%S%.3f")));
    fs::create_dir_all(&dir).map_err(|source| AppError::OutputWrite {
        path: dir.clone(),
        source,
    })?;

    let path = dir.join("config.yaml");
    let yaml = serde_yaml::to_string(config)?;
    fs::write(&path, yaml).map_err(|source| AppError::OutputWrite { path, source })?;
    info!(dir = %dir.display(), "run folder ready");
    Ok(dir)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|source| AppError::OutputWrite {
        path: path.to_path_buf(),
        source,
    })
}
