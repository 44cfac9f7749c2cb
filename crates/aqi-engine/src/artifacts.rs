//! Persistence of the scaler, linear model and tree model
//!
//! Each artifact lives at a fixed file name inside the artifact directory and
//! is replaced via write-to-temp-then-rename. A manifest written last records
//! the SHA-256 of every artifact from the same training run. Loading verifies
//! all three checksums against the manifest, so a run interrupted between two
//! renames leaves a mismatch that is rejected instead of served.

use crate::error::{EngineError, Result};
use crate::linear::LinearModel;
use crate::scaler::StandardScaler;
use crate::trainer::{TrainedModels, TrainingReport};
use crate::tree::RegressionTree;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default artifact directory
pub const DEFAULT_ARTIFACT_DIR: &str = "ml_models/models";

pub const SCALER_FILE: &str = "scaler.json";
pub const LINEAR_FILE: &str = "linear_regression.json";
pub const TREE_FILE: &str = "decision_tree.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Bumped whenever the on-disk artifact layout changes
pub const FORMAT_VERSION: u32 = 1;

/// Checksum entry for one artifact file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub sha256: String,
    pub size_bytes: usize,
}

/// Describes one consistent set of artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub training_id: String,
    pub created_at: DateTime<Utc>,
    pub artifacts: BTreeMap<String, ArtifactEntry>,
    pub report: TrainingReport,
}

/// Artifacts read back from disk and verified against their manifest
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub scaler: StandardScaler,
    pub linear: LinearModel,
    pub tree: RegressionTree,
    pub manifest: Manifest,
}

/// Write `bytes` to `path` so readers see either the old or the new content
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }

    let temp_path = path.with_extension("tmp");
    let written = write_temp(&temp_path, bytes)
        .and_then(|()| fs::rename(&temp_path, path).map_err(|e| EngineError::io(path, e)));
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

fn write_temp(temp_path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(temp_path).map_err(|e| EngineError::io(temp_path, e))?;
    file.write_all(bytes)
        .map_err(|e| EngineError::io(temp_path, e))?;
    file.sync_all().map_err(|e| EngineError::io(temp_path, e))
}

/// Flush directory entries so completed renames survive a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| EngineError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Persist a trained trio and its manifest into `dir`
pub fn save(dir: &Path, models: &TrainedModels) -> Result<Manifest> {
    let created_at = Utc::now();
    let payloads = [
        (SCALER_FILE, serde_json::to_vec_pretty(&models.scaler)?),
        (LINEAR_FILE, serde_json::to_vec_pretty(&models.linear)?),
        (TREE_FILE, serde_json::to_vec(&models.tree)?),
    ];

    let mut artifacts = BTreeMap::new();
    for (name, bytes) in &payloads {
        let path = dir.join(name);
        write_atomic(&path, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "Artifact written");
        artifacts.insert(
            name.to_string(),
            ArtifactEntry {
                sha256: compute_checksum(bytes),
                size_bytes: bytes.len(),
            },
        );
    }

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        training_id: created_at.format("%Y%m%dT%H%M%S%.3fZ").to_string(),
        created_at,
        artifacts,
        report: models.report.clone(),
    };
    write_atomic(
        &dir.join(MANIFEST_FILE),
        &serde_json::to_vec_pretty(&manifest)?,
    )?;
    sync_dir(dir)?;

    info!(
        dir = %dir.display(),
        training_id = %manifest.training_id,
        "Model artifacts persisted"
    );
    Ok(manifest)
}

/// Load and verify all artifacts from `dir`.
///
/// # Errors
///
/// `ModelsUnavailable` naming the offending file if the manifest or any
/// artifact is missing, unreadable, fails its checksum, or holds invalid
/// parameters.
pub fn load(dir: &Path) -> Result<LoadedArtifacts> {
    let manifest_bytes = read_artifact(dir, MANIFEST_FILE)?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| EngineError::unavailable(MANIFEST_FILE, format!("corrupt manifest: {}", e)))?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(EngineError::unavailable(
            MANIFEST_FILE,
            format!(
                "unsupported format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            ),
        ));
    }

    let scaler: StandardScaler = load_verified(dir, SCALER_FILE, &manifest)?;
    scaler
        .validate()
        .map_err(|reason| EngineError::unavailable(SCALER_FILE, reason))?;

    let linear: LinearModel = load_verified(dir, LINEAR_FILE, &manifest)?;
    linear
        .validate()
        .map_err(|reason| EngineError::unavailable(LINEAR_FILE, reason))?;

    let tree: RegressionTree = load_verified(dir, TREE_FILE, &manifest)?;
    tree.validate()
        .map_err(|reason| EngineError::unavailable(TREE_FILE, reason))?;

    info!(
        dir = %dir.display(),
        training_id = %manifest.training_id,
        "Model artifacts loaded"
    );
    Ok(LoadedArtifacts {
        scaler,
        linear,
        tree,
        manifest,
    })
}

fn read_artifact(dir: &Path, name: &str) -> Result<Vec<u8>> {
    let path: PathBuf = dir.join(name);
    fs::read(&path).map_err(|e| {
        let reason = match e.kind() {
            ErrorKind::NotFound => format!(
                "{} not found; train the models first",
                path.display()
            ),
            _ => format!("failed to read {}: {}", path.display(), e),
        };
        EngineError::unavailable(name, reason)
    })
}

fn load_verified<T: DeserializeOwned>(dir: &Path, name: &str, manifest: &Manifest) -> Result<T> {
    let entry = manifest
        .artifacts
        .get(name)
        .ok_or_else(|| EngineError::unavailable(name, "not listed in manifest"))?;
    let bytes = read_artifact(dir, name)?;

    let checksum = compute_checksum(&bytes);
    if checksum != entry.sha256 {
        return Err(EngineError::unavailable(
            name,
            format!(
                "checksum mismatch (expected {}, got {}); artifacts are from different training runs or were modified",
                entry.sha256, checksum
            ),
        ));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| EngineError::unavailable(name, format!("corrupt artifact: {}", e)))
}
