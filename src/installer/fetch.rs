//! Archive download and extraction.
//!
//! Archive locators are fetched over HTTP(S) with reqwest, or copied when
//! they are `file://` URLs or plain paths. Supported formats are `.tar.gz`,
//! `.tgz`, `.tar` and `.zip`. Archives are unpacked into a staging
//! directory next to the destination; when everything sits under one
//! top-level directory (`eigen-3.4.0/...`) that directory is stripped.
//! The destination is replaced wholesale, so a re-fetch never mixes two
//! versions of a source tree.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::core::SuperbuildError;
use crate::utils::fs::{ensure_dir, move_dir_contents, remove_dir_all};
use crate::utils::platform::absolutize;

/// Archive formats superbuild can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from a file name or URL.
    #[must_use]
    pub fn detect(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Last path segment of `url`, without query or fragment.
#[must_use]
pub fn archive_file_name(url: &str) -> String {
    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    without_suffix
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("archive")
        .to_string()
}

/// Local path of a `file://` URL or plain path; `None` for remote URLs.
///
/// Relative plain paths resolve against `base`.
#[must_use]
pub fn local_path(url: &str, base: &Path) -> Option<PathBuf> {
    if let Some(rest) = url.strip_prefix("file://") {
        // file:///C:/x on Windows
        let rest = if cfg!(windows) && rest.starts_with('/') && rest.get(2..3) == Some(":") {
            &rest[1..]
        } else {
            rest
        };
        return Some(PathBuf::from(rest));
    }
    if url.contains("://") {
        return None;
    }
    Some(absolutize(base, Path::new(url)))
}

/// Fetch the archive at `url` into `scratch` and unpack it into `destination`.
///
/// # Errors
///
/// [`SuperbuildError::UnsupportedArchive`] for unknown formats,
/// [`SuperbuildError::DownloadFailed`] when the archive cannot be
/// retrieved, and extraction errors.
pub async fn fetch_archive(
    url: &str,
    scratch: &Path,
    destination: &Path,
    base: &Path,
    context: &str,
) -> Result<()> {
    let file_name = archive_file_name(url);
    let format = ArchiveFormat::detect(&file_name).ok_or_else(|| {
        SuperbuildError::UnsupportedArchive {
            path: url.to_string(),
        }
    })?;

    ensure_dir(scratch)?;
    let archive_path = scratch.join(&file_name);

    if let Some(source) = local_path(url, base) {
        tracing::debug!("({}) Copying {} to {}", context, source.display(), archive_path.display());
        tokio::fs::copy(&source, &archive_path).await.map_err(|e| {
            SuperbuildError::DownloadFailed {
                url: url.to_string(),
                reason: format!("{}: {e}", source.display()),
            }
        })?;
    } else {
        download(url, &archive_path, context).await?;
    }

    let archive = archive_path.clone();
    let target = destination.to_path_buf();
    tokio::task::spawn_blocking(move || extract_archive(&archive, format, &target))
        .await
        .context("spawn_blocking panicked")??;

    tracing::debug!("({}) Extracted {} into {}", context, file_name, destination.display());
    Ok(())
}

async fn download(url: &str, target: &Path, context: &str) -> Result<()> {
    let failed = |reason: String| SuperbuildError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    tracing::debug!("({}) Downloading {}", context, url);
    let client = reqwest::Client::new();
    let response = client.get(url).send().await.map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())).into());
    }
    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    tokio::fs::write(target, &bytes)
        .await
        .with_context(|| format!("Failed to write download to {}", target.display()))?;
    tracing::debug!("({}) Downloaded {} bytes from {}", context, bytes.len(), url);
    Ok(())
}

/// Unpack `archive` into `destination`, replacing whatever was there.
///
/// # Errors
///
/// Fails if the archive is corrupt or the destination cannot be written.
pub fn extract_archive(archive: &Path, format: ArchiveFormat, destination: &Path) -> Result<()> {
    let parent = destination
        .parent()
        .with_context(|| format!("{} has no parent directory", destination.display()))?;
    ensure_dir(parent)?;

    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(parent)
        .with_context(|| format!("Failed to create staging directory in {}", parent.display()))?;

    let file =
        File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
    match format {
        ArchiveFormat::TarGz => tar::Archive::new(GzDecoder::new(file)).unpack(staging.path()),
        ArchiveFormat::Tar => tar::Archive::new(file).unpack(staging.path()),
        ArchiveFormat::Zip => zip::ZipArchive::new(file)
            .and_then(|mut zip| zip.extract(staging.path()))
            .map_err(std::io::Error::other),
    }
    .with_context(|| format!("Failed to extract {}", archive.display()))?;

    let root = single_top_level_dir(staging.path())?.unwrap_or_else(|| staging.path().to_path_buf());
    remove_dir_all(destination)?;
    move_dir_contents(&root, destination)?;
    Ok(())
}

fn single_top_level_dir(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    if entries.len() != 1 {
        return Ok(None);
    }
    let entry = entries.remove(0);
    Ok(entry.file_type()?.is_dir().then(|| entry.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_tar_gz, write_zip};
    use tempfile::tempdir;

    #[test]
    fn test_detect_format() {
        assert_eq!(ArchiveFormat::detect("eigen-3.4.0.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("X.TGZ"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect("a.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::detect("swig.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect("a.tar.bz2"), None);
    }

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name("https://example.org/dl/eigen-3.4.0.tar.gz?raw=1"),
            "eigen-3.4.0.tar.gz"
        );
        assert_eq!(archive_file_name("vendor/zlib.tgz"), "zlib.tgz");
    }

    #[cfg(unix)]
    #[test]
    fn test_local_path() {
        let base = Path::new("/p");
        assert_eq!(local_path("file:///tmp/a.tgz", base), Some(PathBuf::from("/tmp/a.tgz")));
        assert_eq!(local_path("vendor/a.tgz", base), Some(PathBuf::from("/p/vendor/a.tgz")));
        assert_eq!(local_path("https://example.org/a.tgz", base), None);
    }

    #[test]
    fn test_extract_strips_single_top_level_dir() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("lib.tar.gz");
        write_tar_gz(&archive, &[("lib-1.0/CMakeLists.txt", "project(lib)\n"), ("lib-1.0/src/a.c", "")])
            .unwrap();

        let dest = temp.path().join("_sources/lib");
        extract_archive(&archive, ArchiveFormat::TarGz, &dest).unwrap();
        assert!(dest.join("CMakeLists.txt").exists());
        assert!(dest.join("src/a.c").exists());
        assert!(!dest.join("lib-1.0").exists());
    }

    #[test]
    fn test_extract_keeps_flat_layout_and_replaces_destination() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("bin.zip");
        write_zip(&archive, &[("bin/swig", "#!/bin/sh\n"), ("share/doc.txt", "doc")]).unwrap();

        let dest = temp.path().join("swig");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale"), "old").unwrap();

        extract_archive(&archive, ArchiveFormat::Zip, &dest).unwrap();
        assert!(dest.join("bin/swig").exists());
        assert!(dest.join("share/doc.txt").exists());
        assert!(!dest.join("stale").exists());
    }

    #[tokio::test]
    async fn test_fetch_local_archive() {
        let temp = tempdir().unwrap();
        let archive = temp.path().join("zlib-1.3.tar.gz");
        write_tar_gz(&archive, &[("zlib-1.3/zlib.h", "/* zlib */")]).unwrap();

        let url = format!("file://{}", archive.display());
        let dest = temp.path().join("build/_sources/zlib");
        let scratch = temp.path().join("build/zlib/tmp");
        fetch_archive(&url, &scratch, &dest, temp.path(), "zlib").await.unwrap();
        assert!(dest.join("zlib.h").exists());
        assert!(scratch.join("zlib-1.3.tar.gz").exists());
    }

    #[tokio::test]
    async fn test_fetch_missing_local_archive() {
        let temp = tempdir().unwrap();
        let err = fetch_archive(
            "missing.tar.gz",
            &temp.path().join("tmp"),
            &temp.path().join("src"),
            temp.path(),
            "x",
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SuperbuildError>(),
            Some(SuperbuildError::DownloadFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let temp = tempdir().unwrap();
        let err = fetch_archive("a.rar", temp.path(), &temp.path().join("x"), temp.path(), "x")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SuperbuildError>(),
            Some(SuperbuildError::UnsupportedArchive { .. })
        ));
    }
}
