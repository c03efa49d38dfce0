// src/pipeline/frame_slot.rs
//
// Single-slot handoff between an acquisition thread and the control loop.
// The producer never waits: a frame nobody picked up yet is overwritten.

use crate::types::Frame;
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug)]
pub enum SlotTake {
    Frame(Frame),
    Failed(String),
    TimedOut,
}

#[derive(Default)]
struct SlotState {
    frame: Option<Frame>,
    failure: Option<String>,
    dropped: u64,
}

#[derive(Default)]
pub struct FrameSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `frame`, replacing any unconsumed one. Returns true if a stale
    /// frame was dropped.
    pub fn publish(&self, frame: Frame) -> bool {
        let mut state = self.state.lock();
        let overwrote = state.frame.replace(frame).is_some();
        if overwrote {
            state.dropped += 1;
        }
        drop(state);
        self.ready.notify_one();
        overwrote
    }

    pub fn fail(&self, reason: String) {
        self.state.lock().failure = Some(reason);
        self.ready.notify_all();
    }

    /// Waits up to `timeout` for the newest frame. A pending frame is handed
    /// out before a producer failure is reported.
    pub fn take(&self, timeout: Duration) -> SlotTake {
        let mut state = self.state.lock();
        if state.frame.is_none() && state.failure.is_none() {
            let _ = self.ready.wait_for(&mut state, timeout);
        }
        if let Some(frame) = state.frame.take() {
            return SlotTake::Frame(frame);
        }
        match &state.failure {
            Some(reason) => SlotTake::Failed(reason.clone()),
            None => SlotTake::TimedOut,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.state.lock().dropped
    }
}
