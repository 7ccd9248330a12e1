//! Content manifest: repository-relative path to sha256 of the file at the
//! time the index was built. Comparing the previous manifest against a fresh
//! scan tells the indexer what drifted since the last run.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::QuarryResult;
use crate::index::store::write_staged;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    files: BTreeMap<String, String>,
}

/// Paths that changed between two manifests.
#[derive(Debug, Default, PartialEq)]
pub struct Drift {
    pub new: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl Drift {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

impl Manifest {
    pub fn insert(&mut self, path: String, digest: String) {
        self.files.insert(path, digest);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Changes from `self` (the previous state) to `current`. Output vectors
    /// are sorted because the underlying maps are.
    pub fn diff(&self, current: &Manifest) -> Drift {
        let mut drift = Drift::default();
        for (path, digest) in &current.files {
            match self.files.get(path) {
                None => drift.new.push(path.clone()),
                Some(previous) if previous != digest => drift.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        for path in self.files.keys() {
            if !current.files.contains_key(path) {
                drift.deleted.push(path.clone());
            }
        }
        drift
    }

    pub fn save(&self, dir: &Path) -> QuarryResult<()> {
        std::fs::create_dir_all(dir)?;
        write_staged(
            &dir.join(MANIFEST_FILE),
            serde_json::to_vec_pretty(self)?.as_slice(),
        )
    }

    /// A missing manifest reads as empty, so a first run sees every file as
    /// new.
    pub fn load(dir: &Path) -> QuarryResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Manifest::default());
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}
