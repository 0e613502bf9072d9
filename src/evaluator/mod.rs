//! Evaluator seam
//!
//! The domain computation behind a task (loading a dataset, fitting a model,
//! scoring an explanation method) lives behind the traits in this module.
//! benchgrid only schedules, caches and transports results; implementations
//! of [`Evaluator`] and [`Catalog`] supply the math.

mod mock;
mod registry;
mod traits;

pub use mock::{SyntheticCatalog, SyntheticEvaluator};
pub use registry::MatrixRegistry;
pub use traits::{Catalog, Dataset, Evaluator, Model};
