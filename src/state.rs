//! Durable registry of package databases linked into a project
//!
//! One `installed_packages` file per project environment, newline-delimited
//! database paths in registration order. Appends are fsynced before the
//! caller proceeds: the next plan resolution treats the on-disk registry as
//! authoritative, so a crash right after a successful install must not lose
//! the registration.

use crate::error::{CoupError, CoupResult};
use console::style;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

const REGISTRY_FILE: &str = "installed_packages";

/// Ordered, deduplicated set of database paths registered with a project
#[derive(Debug)]
pub struct InstallRegistry {
    path: PathBuf,
    entries: Vec<PathBuf>,
}

impl InstallRegistry {
    /// Load the registry for a project environment. Entries whose database no
    /// longer exists on disk were removed out-of-band: they are pruned with a
    /// warning and the pruned list is rewritten immediately so the next load
    /// does not warn again.
    pub async fn load(project_dir: &Path) -> CoupResult<Self> {
        let path = project_dir.join(REGISTRY_FILE);

        let mut registry = Self {
            path: path.clone(),
            entries: Vec::new(),
        };
        if !path.exists() {
            return Ok(registry);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CoupError::io(format!("reading registry {}", path.display()), e))?;

        let mut seen = HashSet::new();
        let mut pruned = false;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || !seen.insert(line.to_string()) {
                continue;
            }
            let entry = PathBuf::from(line);
            if entry.exists() {
                registry.entries.push(entry);
            } else {
                pruned = true;
                eprintln!(
                    "{} Pruned stale database from registry: {}",
                    style("!").yellow(),
                    entry.display()
                );
            }
        }

        if pruned {
            registry.rewrite().await?;
        }

        debug!(
            "Loaded registry with {} databases from {}",
            registry.entries.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Registered database paths, in registration order
    pub fn paths(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|p| p == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a database path. No-op when already present; otherwise the
    /// entry is appended and fsynced before this returns.
    pub async fn append(&mut self, path: &Path) -> CoupResult<()> {
        if self.contains(path) {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| CoupError::io(format!("opening registry {}", self.path.display()), e))?;

        file.write_all(format!("{}\n", path.display()).as_bytes())
            .await
            .map_err(|e| CoupError::io("appending to registry", e))?;
        file.sync_all()
            .await
            .map_err(|e| CoupError::io("syncing registry", e))?;

        self.entries.push(path.to_path_buf());
        debug!("Registered database {}", path.display());
        Ok(())
    }

    async fn rewrite(&self) -> CoupResult<()> {
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(&entry.display().to_string());
            content.push('\n');
        }

        let mut file = File::create(&self.path)
            .await
            .map_err(|e| CoupError::io(format!("rewriting registry {}", self.path.display()), e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| CoupError::io("rewriting registry", e))?;
        file.sync_all()
            .await
            .map_err(|e| CoupError::io("syncing registry", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_db(dir: &Path, name: &str) -> PathBuf {
        let db = dir.join(name).join("package.conf.d");
        std::fs::create_dir_all(&db).unwrap();
        db
    }

    #[tokio::test]
    async fn load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let registry = InstallRegistry::load(temp.path()).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn append_then_reload() {
        let temp = TempDir::new().unwrap();
        let db = make_db(temp.path(), "text-2.0.2-abc");

        let mut registry = InstallRegistry::load(temp.path()).await.unwrap();
        registry.append(&db).await.unwrap();
        assert!(registry.contains(&db));

        // a fresh load, as after a crash between nodes, still sees the entry
        let reloaded = InstallRegistry::load(temp.path()).await.unwrap();
        assert_eq!(reloaded.paths(), &[db]);
    }

    #[tokio::test]
    async fn append_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let db = make_db(temp.path(), "text-2.0.2-abc");

        let mut registry = InstallRegistry::load(temp.path()).await.unwrap();
        registry.append(&db).await.unwrap();
        registry.append(&db).await.unwrap();
        assert_eq!(registry.len(), 1);

        let reloaded = InstallRegistry::load(temp.path()).await.unwrap();
        assert_eq!(reloaded.len(), 1);
    }

    #[tokio::test]
    async fn load_preserves_registration_order() {
        let temp = TempDir::new().unwrap();
        let a = make_db(temp.path(), "a-1.0-d1");
        let b = make_db(temp.path(), "b-1.0-d2");

        let mut registry = InstallRegistry::load(temp.path()).await.unwrap();
        registry.append(&b).await.unwrap();
        registry.append(&a).await.unwrap();

        let reloaded = InstallRegistry::load(temp.path()).await.unwrap();
        assert_eq!(reloaded.paths(), &[b, a]);
    }

    #[tokio::test]
    async fn stale_entries_pruned_and_rewritten() {
        let temp = TempDir::new().unwrap();
        let keep = make_db(temp.path(), "keep-1.0-d1");
        let stale = make_db(temp.path(), "stale-1.0-d2");

        let mut registry = InstallRegistry::load(temp.path()).await.unwrap();
        registry.append(&keep).await.unwrap();
        registry.append(&stale).await.unwrap();

        std::fs::remove_dir_all(stale.parent().unwrap()).unwrap();

        let pruned = InstallRegistry::load(temp.path()).await.unwrap();
        assert_eq!(pruned.paths(), &[keep.clone()]);

        // pruned list was rewritten, so the stale path is gone from disk too
        let content =
            std::fs::read_to_string(temp.path().join(REGISTRY_FILE)).unwrap();
        assert!(!content.contains("stale-1.0-d2"));
        assert!(content.contains("keep-1.0-d1"));
    }

    #[tokio::test]
    async fn duplicate_lines_collapse_on_load() {
        let temp = TempDir::new().unwrap();
        let db = make_db(temp.path(), "text-2.0.2-abc");
        let line = format!("{}\n{}\n", db.display(), db.display());
        std::fs::write(temp.path().join(REGISTRY_FILE), line).unwrap();

        let registry = InstallRegistry::load(temp.path()).await.unwrap();
        assert_eq!(registry.len(), 1);
    }
}
