//! Local task execution

mod local;

pub use local::{run_experiment, run_experiments, ExperimentContext, LocalExecutor};
