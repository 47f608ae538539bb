#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod data_processor;
pub mod error;
pub mod filter;
pub mod traits;
pub mod types;
pub mod weights;

pub use error::{Error, Result};
pub use traits::{BackendAdapter, Embedder};
pub use types::{BackendKind, BackendRequest, Document, DocumentRef, Filters, Metadata, SearchQuery, SearchResult, SIMULATED_FLAG};
pub use weights::{FusionWeights, WeightPreset};
