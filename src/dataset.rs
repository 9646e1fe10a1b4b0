use std::path::Path;

use anyhow::Context;

use crate::error::FetchError;
use crate::model::GroupModel;

pub const DEFAULT_DATASET_FILE: &str = "cards_data.json";

/// Reads `{ "contentGroups": ..., "functionGroups": ... }` from disk.
///
/// The file is read afresh on every call; nothing is cached between loads. Missing top-level keys
/// load as empty trees.
pub fn load_dataset(path: &Path) -> Result<GroupModel, FetchError> {
    let bytes = std::fs::read(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let model: GroupModel = serde_json::from_slice(&bytes).map_err(|source| FetchError::Shape {
        path: path.to_path_buf(),
        source,
    })?;
    model.validate().map_err(|source| FetchError::Model {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(model)
}

/// Writes the model back out in the dataset shape, uploaded categories included.
pub fn export_dataset(model: &GroupModel, path: &Path) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(model).context("serialize dataset")?;
    std::fs::write(path, text).with_context(|| format!("write dataset: {}", path.display()))?;
    Ok(())
}
