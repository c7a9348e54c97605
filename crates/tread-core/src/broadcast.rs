//! Snapshot fan-out between the controller and its observers.
//!
//! The controller publishes after every mutation and on every ticker period;
//! transports subscribe and forward to their clients. The latest snapshot is
//! cached so a freshly connected subscriber can be served the current state
//! synchronously without taking the controller lock.

use crate::session::WorkoutSnapshot;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

#[derive(Default)]
pub struct SnapshotBus {
    latest: Mutex<Option<WorkoutSnapshot>>,
    subscribers: Mutex<Vec<Sender<WorkoutSnapshot>>>,
}

impl SnapshotBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. The receiver sees every snapshot published
    /// after this call.
    pub fn subscribe(&self) -> Receiver<WorkoutSnapshot> {
        let (tx, rx) = channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Push a snapshot to every live subscriber. Subscribers whose receiver
    /// has been dropped are pruned here.
    pub fn publish(&self, snapshot: WorkoutSnapshot) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        *self.latest.lock().unwrap() = Some(snapshot);
    }

    /// The most recently published snapshot, if any.
    pub fn latest(&self) -> Option<WorkoutSnapshot> {
        self.latest.lock().unwrap().clone()
    }
}
