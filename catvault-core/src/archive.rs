use crate::{catalog::Entity, filter::Selectors};
use eyre::WrapErr as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Archive file extensions accepted for backup targets and restore sources.
pub const RECOGNIZED_EXTENSIONS: &[&str] = &["zip", "tar", "tgz", "gz", "bak"];

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("no archive file was given")]
    Missing,
    #[error("archive file {} does not exist", .0.display())]
    NotFound(PathBuf),
    #[error("archive file {} is a directory", .0.display())]
    IsDirectory(PathBuf),
    #[error("archive file {} has no recognized extension", .0.display())]
    UnrecognizedExtension(PathBuf),
    #[error("target archive file {} already exists, use overwrite to replace it", .0.display())]
    AlreadyExists(PathBuf),
    #[error("the path to target archive file {} is unreachable", .0.display())]
    UnreachableParent(PathBuf),
}

fn has_recognized_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            RECOGNIZED_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Checks that `path` can become a new archive: the parent directory exists,
/// the path is not a directory, the extension is recognized, and an existing
/// non-empty archive is only replaced when `overwrite` is set.
pub fn validate_backup_target(path: &Path, overwrite: bool) -> Result<(), ArchiveError> {
    if path.as_os_str().is_empty() {
        return Err(ArchiveError::Missing);
    }
    if path.is_dir() {
        return Err(ArchiveError::IsDirectory(path.to_owned()));
    }
    if !has_recognized_extension(path) {
        return Err(ArchiveError::UnrecognizedExtension(path.to_owned()));
    }
    match path.metadata() {
        Ok(metadata) => {
            if metadata.len() > 0 && !overwrite {
                return Err(ArchiveError::AlreadyExists(path.to_owned()));
            }
        }
        Err(_) => {
            let parent_exists = path.parent().map(Path::is_dir).unwrap_or(false);
            if !parent_exists {
                return Err(ArchiveError::UnreachableParent(path.to_owned()));
            }
        }
    }
    Ok(())
}

/// Checks that `path` is an existing, readable archive file with a
/// recognized extension.
pub fn validate_restore_source(path: &Path) -> Result<(), ArchiveError> {
    if path.as_os_str().is_empty() {
        return Err(ArchiveError::Missing);
    }
    if path.is_dir() {
        return Err(ArchiveError::IsDirectory(path.to_owned()));
    }
    if !path.exists() {
        return Err(ArchiveError::NotFound(path.to_owned()));
    }
    if !has_recognized_extension(path) {
        return Err(ArchiveError::UnrecognizedExtension(path.to_owned()));
    }
    Ok(())
}

/// First line of a manifest archive: format version plus the selectors the
/// archive was written with, so a later unscoped restore can fall back to
/// the same scope.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    #[serde(default)]
    pub selectors: Selectors,
}

/// Catalog manifest as stored inside an archive: a JSON header line followed
/// by one JSON line per catalog entry.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Manifest {
    pub header: Header,
    pub entries: Vec<Entity>,
}

impl Manifest {
    pub fn new(selectors: Selectors) -> Self {
        Manifest {
            header: Header {
                version: MANIFEST_VERSION,
                selectors,
            },
            entries: Vec::new(),
        }
    }

    pub fn to_string(&self) -> eyre::Result<String> {
        let mut out = serde_json::to_string(&self.header)?;
        out.push('\n');
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn parse(s: &str) -> eyre::Result<Manifest> {
        let mut lines = s.lines().filter(|line| !line.trim().is_empty());
        let header_line = lines.next().ok_or_else(|| eyre::eyre!("empty archive"))?;
        let header: Header =
            serde_json::from_str(header_line).wrap_err("invalid archive header")?;
        if header.version != MANIFEST_VERSION {
            eyre::bail!("unsupported archive version {}", header.version);
        }
        let entries = lines
            .map(|line| serde_json::from_str(line).wrap_err("invalid archive entry"))
            .collect::<eyre::Result<Vec<Entity>>>()?;
        Ok(Manifest { header, entries })
    }

    pub async fn read(path: &Path) -> eyre::Result<Manifest> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("failed to read archive {}", path.display()))?;
        Self::parse(&contents)
    }

    pub async fn write(&self, path: &Path) -> eyre::Result<()> {
        tokio::fs::write(path, self.to_string()?)
            .await
            .wrap_err_with(|| format!("failed to write archive {}", path.display()))
    }
}
