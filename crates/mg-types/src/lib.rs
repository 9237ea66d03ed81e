//! # mg-types
//!
//! Core contracts for ModelGrid: parameter values, ordered trees and the
//! leaf walker, model nodes with tree-wide reparametrization, calibrators and
//! the persistence boundary used by `run_and_save`.

pub mod calibrator;
pub mod errors;
pub mod model;
pub mod params;
pub mod sink;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tree;

pub use calibrator::*;
pub use errors::*;
pub use model::*;
pub use params::*;
pub use sink::*;
pub use tree::*;
