//! triad-vector
//!
//! Dense vector backends. [`FlatVectorAdapter`] is always available; the
//! LanceDB adapter is compiled with the `lance` feature.
pub mod flat;
#[cfg(feature = "lance")]
pub mod lance;

pub use flat::{FlatVectorAdapter, FlatVectorIndex, VectorRecord};
#[cfg(feature = "lance")]
pub use lance::LanceVectorAdapter;
