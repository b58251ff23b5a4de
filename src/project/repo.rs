//! Local registry mirror
//!
//! Each project environment carries a minimal local repo holding just the
//! metadata for its declared packages: a `00-index.tar` the toolchain can
//! read, one extracted `.cabal` file per package, and a symlink to the
//! downloaded archive. Archives themselves are cached once per (name,
//! version) under the shared cache root.

use crate::declaration::{Declaration, PackageSpec};
use crate::error::{CoupError, CoupResult};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

const INDEX_FILE: &str = "00-index.tar";

/// Bring the project's local repo in sync with its declaration. Everything
/// here is populate-once: existing archives, metadata and index entries are
/// left alone.
pub async fn sync_local_repo(
    repo_dir: &Path,
    cache_dir: &Path,
    declaration: &Declaration,
) -> CoupResult<()> {
    tokio::fs::create_dir_all(repo_dir)
        .await
        .map_err(|e| CoupError::io(format!("creating repo dir {}", repo_dir.display()), e))?;
    tokio::fs::create_dir_all(cache_dir)
        .await
        .map_err(|e| CoupError::io(format!("creating cache dir {}", cache_dir.display()), e))?;

    ensure_index(repo_dir).await?;

    for (url, specs) in declaration.sections() {
        for spec in specs {
            let archive = archive_path(cache_dir, spec);
            if !archive.exists() {
                fetch_archive(url, spec, &archive).await?;
            }

            let cabal_file = repo_dir
                .join(&spec.name)
                .join(&spec.version)
                .join(format!("{}.cabal", spec.name));
            if !cabal_file.exists() {
                add_to_index(repo_dir, spec, &archive, &cabal_file).await?;
            }
        }
    }

    Ok(())
}

/// Where the downloaded archive for `spec` lives in the shared cache
pub fn archive_path(cache_dir: &Path, spec: &PackageSpec) -> PathBuf {
    cache_dir
        .join(&spec.name)
        .join(&spec.version)
        .join(format!("{}.tar.gz", spec.token()))
}

/// Old-style hackage serves nested per-package paths; other mirrors are flat
fn archive_url(repo_url: &str, spec: &PackageSpec) -> String {
    let file = format!("{}.tar.gz", spec.token());
    if repo_url.contains("hackage.haskell.org") {
        format!("{}/{}/{}/{}", repo_url, spec.name, spec.version, file)
    } else {
        format!("{}/{}", repo_url, file)
    }
}

async fn fetch_archive(repo_url: &str, spec: &PackageSpec, dest: &Path) -> CoupResult<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoupError::io(format!("creating {}", parent.display()), e))?;
    }

    let url = archive_url(repo_url, spec);
    info!("Fetching {}", url);

    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> CoupResult<()> {
        let mut response = ureq::get(&url).call().map_err(|e| CoupError::FetchFailed {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| CoupError::FetchFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        std::fs::write(&dest, bytes)
            .map_err(|e| CoupError::io(format!("writing archive {}", dest.display()), e))
    })
    .await
    .map_err(|e| CoupError::io("joining download task", std::io::Error::other(e)))?
}

/// Seed the index so the toolchain accepts the repo before any package
/// metadata lands in it
async fn ensure_index(repo_dir: &Path) -> CoupResult<()> {
    if repo_dir.join(INDEX_FILE).exists() {
        return Ok(());
    }

    tokio::fs::write(repo_dir.join("dummy"), "")
        .await
        .map_err(|e| CoupError::io("seeding repo index", e))?;
    run_tar(repo_dir, &["cf", INDEX_FILE, "dummy"]).await
}

/// Extract the package's `.cabal` file from its archive, add it to the index,
/// and symlink the archive next to it
async fn add_to_index(
    repo_dir: &Path,
    spec: &PackageSpec,
    archive: &Path,
    cabal_file: &Path,
) -> CoupResult<()> {
    let member = format!("{}/{}.cabal", spec.token(), spec.name);
    let archive_arg = archive.display().to_string();
    let output = Command::new("tar")
        .args(["xOf", &archive_arg, &member])
        .output()
        .await
        .map_err(|e| CoupError::command_failed(format!("tar xOf {}", archive_arg), e))?;
    if !output.status.success() {
        return Err(CoupError::command_exec(
            format!("tar xOf {} {}", archive_arg, member),
            String::from_utf8_lossy(&output.stderr),
        ));
    }

    if let Some(parent) = cabal_file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CoupError::io(format!("creating {}", parent.display()), e))?;
    }
    tokio::fs::write(cabal_file, &output.stdout)
        .await
        .map_err(|e| CoupError::io(format!("writing {}", cabal_file.display()), e))?;

    let entry = format!("./{}/{}/{}.cabal", spec.name, spec.version, spec.name);
    run_tar(repo_dir, &["uf", INDEX_FILE, &entry]).await?;

    #[cfg(unix)]
    {
        let link = cabal_file
            .parent()
            .map(|p| p.join(format!("{}.tar.gz", spec.token())))
            .unwrap_or_default();
        if !link.exists() {
            tokio::fs::symlink(archive, &link)
                .await
                .map_err(|e| CoupError::io(format!("linking archive {}", link.display()), e))?;
        }
    }

    debug!("Added {} to local repo", spec.token());
    Ok(())
}

async fn run_tar(cwd: &Path, args: &[&str]) -> CoupResult<()> {
    let output = Command::new("tar")
        .args(args)
        .current_dir(cwd)
        .output()
        .await
        .map_err(|e| CoupError::command_failed(format!("tar {:?}", args), e))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(CoupError::command_exec(
            format!("tar {:?}", args),
            String::from_utf8_lossy(&output.stderr),
        ))
    }
}
