//! triad-hybrid
//!
//! Runs vector, graph and keyword backends concurrently behind an adapter
//! registry with failover, and fuses their answers into one ranking.
pub mod engine;
pub mod facade;
pub mod factory;
pub mod fusion;
pub mod registry;
pub mod simulated;

pub use engine::FusionEngine;
pub use facade::HybridRetriever;
pub use fusion::{fuse, BackendHits};
pub use registry::{AdapterRegistry, BackendStatus, Route};
pub use simulated::SimulatedAdapter;
