//! Integration tests for the simulation worker thread.

use pn_app::{RunEvent, SimulationWorker, StageStatus, WorkerMessage, build_network, parse_config};

const DRAINAGE: &str = r#"
name: worker drainage
network:
  nx: 3
  ny: 3
  spacing_um: 100
  node_radius_um: 20
  pore_radius_um: 8
stages:
  - type: primary_drainage
    pressure_increment_pa: 2000
"#;

#[test]
fn worker_streams_events_and_returns_network() {
    let config = parse_config(DRAINAGE).unwrap();
    let network = build_network(&config).unwrap();
    let worker = SimulationWorker::start(config, network).unwrap();

    let mut curves = 0;
    let mut report = None;
    for message in worker.progress_rx.iter() {
        match message {
            WorkerMessage::Event(RunEvent::Curve(_)) => curves += 1,
            WorkerMessage::Event(_) => {}
            WorkerMessage::Finished(r) => report = Some(r),
            WorkerMessage::Failed { message } => panic!("run failed: {message}"),
        }
    }

    let report = report.expect("finished message");
    assert_eq!(report.curves.len(), curves);
    assert_eq!(report.summary.stages[0].status, StageStatus::Exhausted);

    let network = worker.join().unwrap();
    assert!((network.water_saturation() - report.summary.final_sw).abs() < 1e-15);
    assert!(network.water_saturation() < 1.0);
}

#[test]
fn interrupted_worker_finishes_gracefully() {
    let config = parse_config(DRAINAGE).unwrap();
    let network = build_network(&config).unwrap();
    let worker = SimulationWorker::start(config, network).unwrap();
    let handle = worker.interrupt_handle();
    handle.interrupt();
    assert!(handle.is_interrupted());

    let finished = worker
        .progress_rx
        .iter()
        .find_map(|m| match m {
            WorkerMessage::Finished(r) => Some(r),
            _ => None,
        })
        .expect("finished message");
    // The run may end before the request lands; either way nothing is left half-done.
    if finished.summary.interrupted {
        assert_eq!(finished.summary.stages.len() + finished.summary.skipped.len(), 1);
    }
    assert!(worker.join().is_ok());
}

#[test]
fn invalid_configuration_never_starts_a_thread() {
    let mut config = parse_config(DRAINAGE).unwrap();
    let network = build_network(&config).unwrap();
    config.stages.clear();
    assert!(SimulationWorker::start(config, network).is_err());
}
