//! # mg-data
//!
//! Filesystem persistence for model runs: one directory per run holding the
//! model's parameter tree as JSON and the raw output blob.

pub mod store;

pub use store::{ResultStore, StoreConfig, MODEL_TREE_FILE, OUTPUT_FILE, RESULTS_DIR_ENV};
