//! Boundary to the persistence collaborator used by `run_and_save`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::errors::MgResult;
use crate::model::Node;

/// Unique label for one model run: type name plus a fresh v4 UUID.
pub fn new_run_label(type_name: &str) -> (String, Uuid) {
    let id = Uuid::new_v4();
    (format!("{type_name}-{id}"), id)
}

/// Where a persisted run ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRun {
    pub label: String,
    pub location: PathBuf,
}

/// Receives a model and its serialized output after a run.
pub trait RunSink {
    /// Persist the model's parameter tree and the opaque output blob under a
    /// fresh location. Must fail rather than overwrite an existing one.
    fn persist(&self, model: &dyn Node, output: &[u8]) -> MgResult<SavedRun>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_unique_and_prefixed() {
        let (first, first_id) = new_run_label("Foo");
        let (second, second_id) = new_run_label("Foo");

        assert!(first.starts_with("Foo-"));
        assert!(first.ends_with(&first_id.to_string()));
        assert_ne!(first, second);
        assert_ne!(first_id, second_id);
    }
}
