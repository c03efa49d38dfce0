// src/pipeline/mod.rs

pub mod control_loop;
pub mod frame_context;
pub mod frame_slot;
pub mod metrics;
pub mod shutdown;

pub use control_loop::{ControlLoop, LoopParts};
pub use frame_slot::{FrameSlot, SlotTake};
pub use shutdown::ShutdownToken;
