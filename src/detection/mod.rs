// src/detection/mod.rs

mod distance;
mod edge_image;
mod edge_sampler;
mod fusion;
mod lane_estimator;
mod obstruction;
mod steering;
mod types;

// Re-export public APIs
pub use distance::DistanceGuard;
pub use edge_image::BinaryEdgeImage;
pub use fusion::SteeringFusion;
pub use lane_estimator::{LaneEstimate, LaneEstimator};
pub use obstruction::{GateDecision, ObstructionGate};
pub use steering::{SideContributions, SteeringMapper};
pub use types::*;
