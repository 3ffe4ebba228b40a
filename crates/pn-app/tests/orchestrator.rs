//! Integration tests for running configured stage lists.

use std::fs;

use pn_app::{
    AppError, Orchestrator, RunEvent, SimulationConfig, StageStatus, build_network, parse_config,
};
use pn_network::{Network, Phase};

const CYCLE: &str = r#"
name: drainage imbibition
network:
  nx: 4
  ny: 3
  spacing_um: 100
  node_radius_um: 20
  pore_radius_um: 8
  radius_spread: 0.3
stages:
  - type: primary_drainage
    pressure_increment_pa: 1000
  - type: spontaneous_imbibition
    pressure_increment_pa: 1000
"#;

fn cycle() -> (SimulationConfig, Network) {
    let config = parse_config(CYCLE).unwrap();
    let network = build_network(&config).unwrap();
    (config, network)
}

#[test]
fn stages_run_in_order_with_monotone_progress() {
    let (config, mut network) = cycle();
    let orchestrator = Orchestrator::new(config).unwrap();

    let mut percents = Vec::new();
    let mut finished = Vec::new();
    let report = orchestrator
        .run(
            &mut network,
            Some(&mut |event| match event {
                RunEvent::Progress(p) => percents.push(p.percent),
                RunEvent::StageFinished(s) => finished.push(s.label),
                _ => {}
            }),
        )
        .unwrap();

    assert_eq!(finished, vec!["primary drainage", "spontaneous imbibition"]);
    assert!(!report.summary.interrupted);
    assert!(report.summary.skipped.is_empty());
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.last(), Some(&100));

    let drainage_sw = report
        .curves
        .iter()
        .filter(|c| c.stage == "primary drainage")
        .map(|c| c.sw)
        .last()
        .unwrap();
    assert!(drainage_sw < 1.0);
    assert!(report.summary.final_sw >= drainage_sw);
    assert!(report.summary.stages.iter().all(|s| s.status != StageStatus::Interrupted));
}

#[test]
fn interruption_skips_remaining_stages() {
    let (config, mut network) = cycle();
    let orchestrator = Orchestrator::new(config).unwrap();
    let flag = orchestrator.interrupt_flag();

    let report = orchestrator
        .run(
            &mut network,
            Some(&mut |event| {
                if matches!(event, RunEvent::Curve(_)) {
                    flag.request();
                }
            }),
        )
        .unwrap();

    assert!(report.summary.interrupted);
    assert_eq!(report.summary.stages.len(), 1);
    assert_eq!(report.summary.stages[0].status, StageStatus::Interrupted);
    assert_eq!(report.summary.stages[0].steps, 1);
    assert_eq!(report.summary.skipped, vec!["spontaneous imbibition"]);
    assert_eq!(report.curves.len(), 1);
}

#[test]
fn interrupt_before_start_leaves_network_saturated() {
    let (config, mut network) = cycle();
    let orchestrator = Orchestrator::new(config).unwrap();
    orchestrator.interrupt_flag().request();

    let report = orchestrator.run(&mut network, None).unwrap();
    assert!(report.summary.stages.is_empty());
    assert_eq!(report.summary.skipped.len(), 2);
    assert!(network
        .elements()
        .iter()
        .filter(|e| e.is_open())
        .all(|e| e.state.phase == Phase::Water));
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let (mut config, _) = cycle();
    config.fluids.oil_viscosity_pa_s = -1.0;
    config.stages.clear();
    match Orchestrator::new(config) {
        Err(AppError::Validation(issues)) => assert_eq!(issues.len(), 2),
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn run_folder_holds_config_and_summary() {
    let (mut config, mut network) = cycle();
    let root = std::env::temp_dir().join(format!("pn-app-run-folder-{}", std::process::id()));
    config.output.run_root = Some(root.clone());
    config.stages.truncate(1);

    let report = Orchestrator::new(config).unwrap().run(&mut network, None).unwrap();
    let dir = report.run_dir.clone().unwrap();
    assert!(dir.starts_with(&root));
    assert!(dir.join("config.yaml").exists());

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["name"], "drainage imbibition");
    assert_eq!(summary["stages"][0]["label"], "primary drainage");

    let reloaded = pn_app::load_config(&dir.join("config.yaml")).unwrap();
    assert_eq!(reloaded.stages.len(), 1);

    let _ = fs::remove_dir_all(&root);
}
