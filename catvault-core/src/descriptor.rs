use crate::{
    archive::{self, ArchiveError},
    filter::{ScopeFilter, Selectors},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Backup,
    Restore,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Backup => write!(f, "backup"),
            Direction::Restore => write!(f, "restore"),
        }
    }
}

/// Named boolean options of a launch request. `dry_run` is only meaningful
/// for restore jobs.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionFlags {
    pub overwrite: bool,
    pub best_effort: bool,
    pub cleanup_temp: bool,
    pub dry_run: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("invalid archive")]
    ArchiveInvalid(#[from] ArchiveError),
    #[error("option '{option}' is not supported for {direction} jobs")]
    UnsupportedOption {
        option: &'static str,
        direction: Direction,
    },
}

/// Immutable description of a requested backup or restore operation.
/// Constructing one validates the archive location and option combination;
/// nothing is launched here.
#[derive(Debug, PartialEq, Clone)]
pub struct Descriptor {
    pub direction: Direction,
    pub archive: PathBuf,
    pub selectors: Selectors,
    pub scope: ScopeFilter,
    pub options: OptionFlags,
}

impl Descriptor {
    pub fn new(
        direction: Direction,
        archive: impl Into<PathBuf>,
        selectors: Selectors,
        options: OptionFlags,
    ) -> Result<Descriptor, DescriptorError> {
        let archive = archive.into();
        if options.dry_run && direction == Direction::Backup {
            return Err(DescriptorError::UnsupportedOption {
                option: "dry-run",
                direction,
            });
        }
        match direction {
            Direction::Backup => archive::validate_backup_target(&archive, options.overwrite)?,
            Direction::Restore => archive::validate_restore_source(&archive)?,
        }
        let scope = ScopeFilter::from_selectors(&selectors);
        Ok(Descriptor {
            direction,
            archive,
            selectors,
            scope,
            options,
        })
    }

    /// Copy of this descriptor rescoped to other selectors. Used when an
    /// unscoped restore adopts the scope embedded in the archive.
    pub fn with_selectors(&self, selectors: Selectors) -> Descriptor {
        let scope = ScopeFilter::from_selectors(&selectors);
        Descriptor {
            selectors,
            scope,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> OptionFlags {
        OptionFlags::default()
    }

    #[test]
    fn should_build_backup_descriptor_for_valid_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");

        let descriptor = Descriptor::new(
            Direction::Backup,
            &path,
            Selectors::default(),
            OptionFlags {
                best_effort: true,
                ..flags()
            },
        )
        .unwrap();

        assert_eq!(descriptor.direction, Direction::Backup);
        assert_eq!(descriptor.scope, ScopeFilter::All);
        assert!(descriptor.options.best_effort);
    }

    #[test]
    fn should_reject_restore_from_nonexistent_archive() {
        let result = Descriptor::new(
            Direction::Restore,
            "/nonexistent.zip",
            Selectors::default(),
            flags(),
        );

        assert!(matches!(
            result,
            Err(DescriptorError::ArchiveInvalid(ArchiveError::NotFound(_)))
        ));
    }

    #[test]
    fn should_reject_dry_run_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");

        let result = Descriptor::new(
            Direction::Backup,
            &path,
            Selectors::default(),
            OptionFlags {
                dry_run: true,
                ..flags()
            },
        );

        assert!(matches!(
            result,
            Err(DescriptorError::UnsupportedOption { option: "dry-run", .. })
        ));
    }

    #[test]
    fn should_derive_scope_from_selectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");

        let descriptor = Descriptor::new(
            Direction::Backup,
            &path,
            Selectors {
                workspace: Some("ws1".to_string()),
                store: None,
                layer: None,
            },
            flags(),
        )
        .unwrap();

        assert!(!descriptor.scope.is_match_all());
    }

    #[test]
    fn should_rescope_with_other_selectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");
        let descriptor =
            Descriptor::new(Direction::Backup, &path, Selectors::default(), flags()).unwrap();

        let rescoped = descriptor.with_selectors(Selectors {
            workspace: Some("ws1".to_string()),
            store: None,
            layer: None,
        });

        assert!(descriptor.scope.is_match_all());
        assert!(!rescoped.scope.is_match_all());
        assert_eq!(rescoped.archive, descriptor.archive);
    }
}
