use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::registry::{Command, EntryPoint, RegistryBuilder};
use crate::validator;

/// Register every command artifact found in `dir`, in file-name order.
///
/// Metadata is lowered from each artifact's source; the handler is bound from
/// `entry_points` by name. Artifacts that fail to lower, have no compiled
/// entry point, or collide with an already registered name are skipped with a
/// warning. Returns the number of commands registered.
pub fn load_artifacts(
    builder: &mut RegistryBuilder,
    dir: &Path,
    entry_points: &[EntryPoint],
) -> CoreResult<usize> {
    let mut loaded = 0;
    for (name, path) in artifact_files(dir)? {
        let source = std::fs::read_to_string(&path).map_err(|error| {
            CoreError::Internal(format!(
                "failed to read command artifact {}: {error}",
                path.display()
            ))
        })?;
        let meta = match validator::describe(&source, &name) {
            Ok(meta) => meta,
            Err(error) => {
                tracing::warn!("skipping command artifact {}: {error}", path.display());
                continue;
            }
        };
        let Some(entry) = entry_points.iter().find(|entry| entry.name == name) else {
            tracing::warn!(
                "skipping command {name}: no compiled entry point, rebuild required"
            );
            continue;
        };
        let command = Command::new(meta.name, meta.description, &meta.pattern, Arc::new(*entry))?;
        if let Err(error) = builder.register(command) {
            tracing::warn!("skipping command artifact {}: {error}", path.display());
            continue;
        }
        loaded += 1;
    }
    Ok(loaded)
}

/// `(name, path)` of every `<name>.rs` artifact in `dir`, sorted by name.
/// A missing directory holds no artifacts.
pub fn artifact_files(dir: &Path) -> CoreResult<Vec<(String, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|error| {
        CoreError::Internal(format!(
            "failed to read commands directory {}: {error}",
            dir.display()
        ))
    })? {
        let entry = entry.map_err(|error| {
            CoreError::Internal(format!("failed to read command entry: {error}"))
        })?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("rs") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if stem == "mod" {
            continue;
        }
        found.push((stem.to_string(), path.clone()));
    }
    found.sort();
    Ok(found)
}
