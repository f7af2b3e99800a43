//! Background tick driver
//!
//! Runs one race on a tokio task so a renderer is never blocked. The loop body
//! owns the engine outright, so all mutations stay sequential. Snapshots are
//! pushed after every tick. Cancellation is checked at each tick boundary.

use rand::Rng;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::{Contestant, OddsBoard, Outcome, RaceEngine, RaceState};
use crate::error::RaceError;
use crate::models::RaceSnapshot;

/// How a driven race ended
#[derive(Debug)]
pub enum DriveReport {
    Completed {
        outcome: Outcome,
        ticks: u32,
        odds: OddsBoard,
        roster: Vec<Contestant>,
    },
    Cancelled {
        ticks: u32,
        roster: Vec<Contestant>,
    },
}

/// Handle to a race running in the background
pub struct RaceHandle {
    cancel_tx: watch::Sender<bool>,
    snapshots: Option<mpsc::UnboundedReceiver<RaceSnapshot>>,
    task: JoinHandle<Result<DriveReport, RaceError>>,
}

impl RaceHandle {
    /// Ask the driver to stop at the next tick boundary
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Snapshot stream; can be taken once
    pub fn take_snapshots(&mut self) -> Option<mpsc::UnboundedReceiver<RaceSnapshot>> {
        self.snapshots.take()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the race to end
    pub async fn join(self) -> Result<DriveReport, RaceError> {
        self.task
            .await
            .map_err(|e| RaceError::Driver(e.to_string()))?
    }
}

pub struct RaceDriver;

impl RaceDriver {
    /// Start ticking `engine` every `tick_delay` on a new task
    pub fn spawn<R>(engine: RaceEngine<R>, tick_delay: Duration) -> RaceHandle
    where
        R: Rng + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive(engine, tick_delay, cancel_rx, snapshot_tx));

        RaceHandle {
            cancel_tx,
            snapshots: Some(snapshot_rx),
            task,
        }
    }
}

async fn drive<R: Rng>(
    mut engine: RaceEngine<R>,
    tick_delay: Duration,
    mut cancel: watch::Receiver<bool>,
    snapshots: mpsc::UnboundedSender<RaceSnapshot>,
) -> Result<DriveReport, RaceError> {
    loop {
        if *cancel.borrow() {
            engine.cancel();
            info!(ticks = engine.tick_count(), "Driver stopped by cancellation");
            return Ok(DriveReport::Cancelled {
                ticks: engine.tick_count(),
                roster: engine.into_roster(),
            });
        }

        let snapshot = engine.tick()?;
        let finished = snapshot.state == RaceState::Finished;
        if snapshots.send(snapshot).is_err() {
            debug!("Snapshot receiver dropped");
        }

        if finished {
            let outcome = engine
                .take_outcome()
                .ok_or_else(|| RaceError::Driver("finished race has no outcome".to_string()))?;
            return Ok(DriveReport::Completed {
                outcome,
                ticks: engine.tick_count(),
                odds: engine.odds().clone(),
                roster: engine.into_roster(),
            });
        }

        if !tick_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(tick_delay) => {}
                Ok(()) = cancel.changed() => {}
            }
        }
    }
}
