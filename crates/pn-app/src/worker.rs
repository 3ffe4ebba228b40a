//! Dedicated worker thread running one simulation.
//!
//! Events travel over an unbounded channel so the step loop never blocks
//! on a slow consumer.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};

use pn_network::Network;
use pn_sim::InterruptFlag;

use crate::config::SimulationConfig;
use crate::error::{AppError, AppResult};
use crate::orchestrator::{Orchestrator, RunReport};
use crate::progress::RunEvent;

#[derive(Debug, Clone)]
pub enum WorkerMessage {
    Event(RunEvent),
    Finished(Box<RunReport>),
    Failed { message: String },
}

/// Requests a graceful stop of the worker's run.
#[derive(Debug, Clone)]
pub struct InterruptHandle(InterruptFlag);

impl InterruptHandle {
    /// The stage in progress finishes its current step; later stages are skipped.
    pub fn interrupt(&self) {
        self.0.request();
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.is_requested()
    }
}

pub struct SimulationWorker {
    pub progress_rx: Receiver<WorkerMessage>,
    interrupt: InterruptHandle,
    handle: JoinHandle<AppResult<Network>>,
}

impl SimulationWorker {
    /// Validate `config` and start running it on `network` in a new thread.
    pub fn start(config: SimulationConfig, network: Network) -> AppResult<Self> {
        let flag = InterruptFlag::new();
        let orchestrator = Orchestrator::with_interrupt(config, flag.clone())?;
        let (tx, rx) = channel();

        let handle = thread::Builder::new()
            .name("pn-worker".to_string())
            .spawn(move || Self::run(orchestrator, network, &tx))?;

        Ok(Self {
            progress_rx: rx,
            interrupt: InterruptHandle(flag),
            handle,
        })
    }

    fn run(orchestrator: Orchestrator, mut network: Network, tx: &Sender<WorkerMessage>) -> AppResult<Network> {
        // A dropped receiver only means nobody is listening any more.
        let mut forward = |event: RunEvent| {
            let _ = tx.send(WorkerMessage::Event(event));
        };
        match orchestrator.run(&mut network, Some(&mut forward)) {
            Ok(report) => {
                let _ = tx.send(WorkerMessage::Finished(Box::new(report)));
                Ok(network)
            }
            Err(e) => {
                let _ = tx.send(WorkerMessage::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end and take back the network in its final state.
    pub fn join(self) -> AppResult<Network> {
        self.handle
            .join()
            .map_err(|_| AppError::Worker("worker thread panicked".to_string()))?
    }
}
