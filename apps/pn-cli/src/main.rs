use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use pn_app::{
    AppError, AppResult, RunEvent, RunProgress, RunReport, SimulationWorker, WorkerMessage,
    build_network, load_config, validate_config,
};

#[derive(Parser)]
#[command(name = "pn-cli")]
#[command(about = "porenet CLI - pore network displacement and transport simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a run configuration
    Validate {
        /// Path to the configuration YAML file
        config_path: PathBuf,
    },
    /// Build the configured lattice and run every stage
    Run {
        /// Path to the configuration YAML file
        config_path: PathBuf,
        /// Write the collected curves as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the performance summary
        #[arg(long)]
        timing: bool,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config_path } => cmd_validate(&config_path),
        Commands::Run {
            config_path,
            output,
            timing,
        } => cmd_run(&config_path, output.as_deref(), timing),
    }
}

fn cmd_validate(config_path: &Path) -> AppResult<()> {
    println!("Validating configuration: {}", config_path.display());
    let config = load_config(config_path)?;
    let issues = validate_config(&config);
    if !issues.is_empty() {
        warn!(issues = issues.len(), "configuration rejected");
        for issue in &issues {
            println!("  ✗ {issue}");
        }
        return Err(AppError::Validation(issues));
    }
    info!(name = %config.name, stages = config.stages.len(), "configuration valid");
    println!("✓ Configuration is valid ({} stages)", config.stages.len());
    Ok(())
}

fn cmd_run(config_path: &Path, output: Option<&Path>, timing: bool) -> AppResult<()> {
    if timing {
        pn_core::timing::enable_timing();
    }
    let config = load_config(config_path)?;
    let network = build_network(&config)?;
    info!(
        nodes = network.node_count(),
        pores = network.pore_count(),
        "network built"
    );
    println!(
        "Running '{}': {} nodes, {} pores, {} stages",
        config.name,
        network.node_count(),
        network.pore_count(),
        config.stages.len()
    );

    let started = Instant::now();
    let worker = SimulationWorker::start(config, network)?;
    let mut last_emit = Instant::now();
    let mut last_stage = usize::MAX;
    let mut report = None;
    let mut failure = None;

    for message in worker.progress_rx.iter() {
        match message {
            WorkerMessage::Event(RunEvent::Progress(progress)) => {
                let emit_now = progress.stage_index != last_stage || last_emit.elapsed().as_millis() >= 100;
                if emit_now {
                    render_progress(&progress, started.elapsed().as_secs_f64());
                    last_stage = progress.stage_index;
                    last_emit = Instant::now();
                }
            }
            WorkerMessage::Event(RunEvent::StageFinished(stage)) => {
                clear_progress_line();
                println!(
                    "✓ {:<26} {:?}  steps={}  Sw={:.4}  {:.2}s",
                    stage.label, stage.status, stage.steps, stage.final_sw, stage.elapsed_s
                );
            }
            WorkerMessage::Event(_) => {}
            WorkerMessage::Finished(r) => report = Some(r),
            WorkerMessage::Failed { message } => failure = Some(message),
        }
    }
    clear_progress_line();
    worker.join()?;

    if let Some(message) = failure {
        warn!(%message, "run failed");
        return Err(AppError::Simulation(message));
    }
    let report = report.ok_or_else(|| AppError::Worker("run ended without a report".to_string()))?;
    print_summary(&report);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).map_err(|source| AppError::OutputWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "curves written");
        println!("  Curves written to {}", path.display());
    }
    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_progress(progress: &RunProgress, elapsed_s: f64) {
    let width = 28usize;
    let filled = (progress.percent as usize * width / 100).min(width);
    print!(
        "\r[{}{}] {:>3}%  stage {}/{}  {}  elapsed={:.1}s",
        "#".repeat(filled),
        "-".repeat(width - filled),
        progress.percent,
        progress.stage_index + 1,
        progress.stage_count,
        progress.status,
        elapsed_s
    );
    let _ = io::stdout().flush();
}

fn print_summary(report: &RunReport) {
    let summary = &report.summary;
    if summary.interrupted {
        println!("! Run interrupted; skipped: {}", summary.skipped.join(", "));
    } else {
        println!("✓ Run completed");
    }
    println!("  Final Sw:          {:.4}", summary.final_sw);
    println!("  Curve samples:     {}", report.curves.len());
    println!("  Transport samples: {}", report.transport.len());
    println!("  Total time:        {:.3}s", summary.total_time_s);
    if let Some(dir) = &report.run_dir {
        println!("  Run folder:        {}", dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos").join(name)
    }

    #[test]
    fn demo_config_validates() {
        assert!(cmd_validate(&demo("mixed_wet_cycle.yaml")).is_ok());
    }

    #[test]
    fn missing_config_is_an_error() {
        assert!(cmd_validate(&demo("does_not_exist.yaml")).is_err());
    }
}
