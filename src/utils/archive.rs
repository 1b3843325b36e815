//! Packing staged backup directories into tar archives

use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tar::Builder;
use tracing::debug;

/// Pack `source_dir` into `archive_path`, entries rooted at the directory's name
pub fn pack_directory(source_dir: &Path, archive_path: &Path) -> Result<()> {
    if !source_dir.exists() {
        return Err(anyhow!(
            "Archive source directory doesn't exist: {}",
            source_dir.display()
        ));
    }
    if !source_dir.is_dir() {
        return Err(anyhow!(
            "Archive source is not a directory: {}",
            source_dir.display()
        ));
    }

    let root_name = source_dir
        .file_name()
        .ok_or_else(|| anyhow!("Archive source has no name: {}", source_dir.display()))?;

    let file = File::create(archive_path)
        .with_context(|| format!("Failed to create archive {}", archive_path.display()))?;
    let mut builder = Builder::new(BufWriter::new(file));
    builder.follow_symlinks(false);
    builder
        .append_dir_all(root_name, source_dir)
        .with_context(|| format!("Failed to pack {}", source_dir.display()))?;

    let mut writer = builder
        .into_inner()
        .context("Failed to finish archive")?;
    std::io::Write::flush(&mut writer).context("Failed to flush archive")?;

    debug!("Packed {} into {}", source_dir.display(), archive_path.display());
    Ok(())
}

/// Pack on the blocking pool
pub async fn pack_directory_async(source_dir: PathBuf, archive_path: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || pack_directory(&source_dir, &archive_path))
        .await
        .context("Archive task panicked")?
}
