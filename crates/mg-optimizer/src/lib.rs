//! # mg-optimizer
//!
//! Grid search and calibration over ModelGrid models.
//!
//! Provides parameter grid definitions with lazy cartesian-product
//! enumeration, a runner that evaluates a model type or a live instance at
//! every grid point, run records, and objective-driven selection of the best
//! run.

mod grid;
mod record;
mod runner;
mod selection;

pub use grid::{GridIter, ParamGrid, ParameterDef, ParameterKind};
pub use record::{RunRecord, RunResults, RunnerConfig, SweepId};
pub use runner::{run_on_param_grid, Constructor, GridRunner, GridTarget};
pub use selection::{
    calibrate_on_param_grid, calibrate_on_run_results, ObjectiveDirection, Selected, Selector,
};
