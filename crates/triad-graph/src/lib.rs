//! triad-graph
//!
//! Relationship backend: a petgraph store loaded from a JSON snapshot and the
//! [`GraphAdapter`] that answers queries by entity lookup and traversal.
pub mod adapter;
pub mod store;

pub use adapter::GraphAdapter;
pub use store::{EdgeRecord, GraphSnapshot, GraphStore, NodeRecord, Reach};
