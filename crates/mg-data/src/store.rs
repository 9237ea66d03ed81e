use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use mg_types::{new_run_label, MgError, MgResult, Node, ParamValue, RunSink, SavedRun, Tree};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Environment variable overriding the results directory.
pub const RESULTS_DIR_ENV: &str = "MODELGRID_RESULTS_DIR";

/// Parameter tree document inside a run directory.
pub const MODEL_TREE_FILE: &str = "model_tree.json";

/// Opaque output blob inside a run directory.
pub const OUTPUT_FILE: &str = "output.bin";

/// Where run directories are created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Read the root from `MODELGRID_RESULTS_DIR`, falling back to `results`.
    pub fn from_env() -> Self {
        std::env::var(RESULTS_DIR_ENV)
            .map(Self::new)
            .unwrap_or_default()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("results")
    }
}

/// Storage manager for run outputs
#[derive(Debug)]
pub struct ResultStore {
    data_root: PathBuf,
}

impl ResultStore {
    pub fn new<P: AsRef<Path>>(data_root: P) -> MgResult<Self> {
        let data_root = data_root.as_ref().to_path_buf();
        fs::create_dir_all(&data_root)?;

        Ok(Self { data_root })
    }

    pub fn from_config(config: &StoreConfig) -> MgResult<Self> {
        Self::new(&config.root)
    }

    pub fn root(&self) -> &Path {
        &self.data_root
    }

    /// Directory of the run labelled `label`
    fn run_dir(&self, label: &str) -> PathBuf {
        self.data_root.join(label)
    }

    /// Write one run. Fails if a run with the same label already exists.
    pub fn save(&self, label: &str, tree: &Tree<ParamValue>, output: &[u8]) -> MgResult<PathBuf> {
        let dir = self.run_dir(label);
        fs::create_dir(&dir).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => MgError::AlreadyExists {
                path: dir.display().to_string(),
            },
            _ => MgError::Io(e),
        })?;

        let mut writer = BufWriter::new(File::create(dir.join(MODEL_TREE_FILE))?);
        serde_json::to_writer_pretty(&mut writer, tree)?;
        writer.flush()?;

        fs::write(dir.join(OUTPUT_FILE), output)?;

        info!("Saved run {} to {}", label, dir.display());
        Ok(dir)
    }

    pub fn exists(&self, label: &str) -> bool {
        self.run_dir(label).is_dir()
    }

    /// Parameter tree of a saved run, as a JSON document.
    pub fn load_tree(&self, label: &str) -> MgResult<serde_json::Value> {
        let file = File::open(self.run_dir(label).join(MODEL_TREE_FILE))?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Raw output blob of a saved run.
    pub fn load_output(&self, label: &str) -> MgResult<Vec<u8>> {
        Ok(fs::read(self.run_dir(label).join(OUTPUT_FILE))?)
    }

    /// Output blob decoded as JSON into `T`.
    pub fn load_output_as<T: DeserializeOwned>(&self, label: &str) -> MgResult<T> {
        let blob = self.load_output(label)?;
        Ok(serde_json::from_slice(&blob)?)
    }

    /// Labels of every saved run, sorted.
    pub fn list_runs(&self) -> MgResult<Vec<String>> {
        let mut labels = Vec::new();
        for entry in fs::read_dir(&self.data_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                labels.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        labels.sort();
        debug!("Found {} saved runs under {}", labels.len(), self.data_root.display());
        Ok(labels)
    }
}

impl RunSink for ResultStore {
    fn persist(&self, model: &dyn Node, output: &[u8]) -> MgResult<SavedRun> {
        let (label, _) = new_run_label(model.type_name());
        let tree = model.model_tree()?;
        let location = self.save(&label, &tree, output)?;
        Ok(SavedRun { label, location })
    }
}
