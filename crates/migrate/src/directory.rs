use std::fs;
use std::path::{Path, PathBuf};

use modelql_core::{Error, MigrationError, ROLLBACK_UNAVAILABLE, Result};

use crate::executor::validate_name;

const MIGRATION_FILE: &str = "migration.sql";
const ROLLBACK_FILE: &str = "rollback.sql";

/// One `migrations/<name>/` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationDirectory {
    pub name: String,
    pub path: PathBuf,
}

impl MigrationDirectory {
    pub fn forward_script(&self) -> Result<String> {
        read_file(&self.path.join(MIGRATION_FILE))
    }

    /// Rollback text; an empty or missing file reads as the
    /// rollback-unavailable sentinel.
    pub fn rollback_script(&self) -> Result<String> {
        let path = self.path.join(ROLLBACK_FILE);
        if !path.exists() {
            return Ok(ROLLBACK_UNAVAILABLE.to_string());
        }
        let raw = read_file(&path)?;
        if raw.trim().is_empty() {
            return Ok(ROLLBACK_UNAVAILABLE.to_string());
        }
        Ok(raw)
    }
}

/// Lists migration directories under `root`, sorted by name. Entries
/// whose names fall outside `[a-zA-Z0-9_]+` are rejected rather than
/// skipped; a typo in a directory name should not silently drop a
/// migration.
pub fn list_migrations(root: &Path) -> Result<Vec<MigrationDirectory>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(root).map_err(|source| unreadable(root, &source))?;
    let mut migrations = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|source| unreadable(root, &source))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        validate_name(&name)?;
        migrations.push(MigrationDirectory { name, path });
    }

    migrations.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(migrations)
}

/// Writes a migration directory with forward and rollback scripts.
pub fn write_migration(root: &Path, name: &str, forward: &str, rollback: &str) -> Result<()> {
    validate_name(name)?;
    let directory = root.join(name);
    fs::create_dir_all(&directory).map_err(|source| unreadable(&directory, &source))?;
    fs::write(directory.join(MIGRATION_FILE), forward)
        .map_err(|source| unreadable(&directory, &source))?;
    fs::write(directory.join(ROLLBACK_FILE), rollback)
        .map_err(|source| unreadable(&directory, &source))?;
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| unreadable(path, &source))
}

fn unreadable(path: &Path, source: &std::io::Error) -> Error {
    MigrationError::UnreadableDirectory {
        path: path.display().to_string(),
        reason: source.to_string(),
    }
    .into()
}
