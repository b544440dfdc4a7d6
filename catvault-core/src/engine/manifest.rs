use crate::{
    archive::{Header, Manifest, MANIFEST_VERSION},
    catalog::{Catalog, Entity, Kind},
    descriptor::{Descriptor, Direction},
    engine::{Engine, Plan, Step, StepReport},
    filter::Selectors,
};
use eyre::WrapErr as _;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::io::AsyncWriteExt as _;

/// Minimal archive engine that serializes the catalog tree as a line-based
/// JSON manifest. It implements just enough of the archive contract to drive
/// full job runs: scoped entry selection, staged writes, embedded selectors,
/// and the dry-run/cleanup-temp/overwrite options.
#[derive(Debug)]
pub struct ManifestEngine {
    catalog: Arc<Catalog>,
}

fn staging_path(archive: &Path) -> PathBuf {
    let mut name = archive
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    archive.with_file_name(name)
}

impl ManifestEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        ManifestEngine { catalog }
    }

    async fn write_header(&self, descriptor: &Descriptor) -> eyre::Result<()> {
        let header = Header {
            version: MANIFEST_VERSION,
            selectors: descriptor.selectors.clone(),
        };
        let mut line = serde_json::to_string(&header)?;
        line.push('\n');
        let staging = staging_path(&descriptor.archive);
        tokio::fs::write(&staging, line)
            .await
            .wrap_err_with(|| format!("failed to create staging file {}", staging.display()))
    }

    async fn append_entry(&self, descriptor: &Descriptor, entity: &Entity) -> eyre::Result<()> {
        let mut line = serde_json::to_string(entity)?;
        line.push('\n');
        let staging = staging_path(&descriptor.archive);
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&staging)
            .await
            .wrap_err_with(|| format!("failed to open staging file {}", staging.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn finalize(&self, descriptor: &Descriptor) -> eyre::Result<()> {
        let staging = staging_path(&descriptor.archive);
        tokio::fs::copy(&staging, &descriptor.archive)
            .await
            .wrap_err_with(|| {
                format!("failed to finalize archive {}", descriptor.archive.display())
            })?;
        if descriptor.options.cleanup_temp {
            tokio::fs::remove_file(&staging).await.wrap_err_with(|| {
                format!("failed to remove staging file {}", staging.display())
            })?;
        }
        Ok(())
    }

    fn apply_entry(&self, descriptor: &Descriptor, entity: &Entity) -> eyre::Result<StepReport> {
        let mut report = StepReport::default();
        match entity.kind {
            Kind::Workspace => {}
            Kind::Store => {
                let workspace = entity.workspace.as_deref().or(entity.chain_workspace.as_deref());
                if let Some(workspace) = workspace {
                    let known = self
                        .catalog
                        .workspaces
                        .keys()
                        .any(|name| name.0 == workspace);
                    if !known {
                        eyre::bail!(
                            "cannot restore store '{}': workspace '{}' is not present",
                            entity.name,
                            workspace
                        );
                    }
                }
            }
            Kind::Layer => {
                if let Some(workspace) = entity.chain_workspace.as_deref() {
                    let known = self
                        .catalog
                        .workspaces
                        .keys()
                        .any(|name| name.0 == workspace);
                    if !known {
                        eyre::bail!(
                            "cannot restore layer '{}': workspace '{}' is not present",
                            entity.name,
                            workspace
                        );
                    }
                }
            }
        }
        let already_present = self
            .catalog
            .entities()
            .iter()
            .any(|existing| existing.kind == entity.kind && existing.name == entity.name);
        if already_present {
            report.warnings.push(eyre::eyre!(
                "{} already present, overwriting",
                entity.label()
            ));
        }
        if descriptor.options.dry_run {
            tracing::info!(entity = %entity.label(), "dry-run: would restore");
        } else {
            tracing::info!(entity = %entity.label(), "restored");
        }
        Ok(report)
    }
}

#[async_trait::async_trait]
impl Engine for ManifestEngine {
    async fn plan(&self, descriptor: &Descriptor) -> eyre::Result<Plan> {
        match descriptor.direction {
            Direction::Backup => {
                let entries = self
                    .catalog
                    .entities()
                    .into_iter()
                    .filter(|entity| descriptor.scope.matches(entity))
                    .collect::<Vec<_>>();
                let mut steps = Vec::with_capacity(entries.len() + 2);
                steps.push(Step::new("prepare"));
                steps.extend(entries.into_iter().map(Step::for_entity));
                steps.push(Step::new("finalize"));
                Ok(Plan { steps })
            }
            Direction::Restore => {
                let manifest = Manifest::read(&descriptor.archive).await?;
                let steps = manifest
                    .entries
                    .into_iter()
                    .filter(|entity| descriptor.scope.matches(entity))
                    .map(Step::for_entity)
                    .collect();
                Ok(Plan { steps })
            }
        }
    }

    async fn run_step(
        &self,
        descriptor: &Descriptor,
        plan: &Plan,
        index: usize,
    ) -> eyre::Result<StepReport> {
        let step = plan
            .steps
            .get(index)
            .ok_or_else(|| eyre::eyre!("step index {} out of range", index))?;
        match descriptor.direction {
            Direction::Backup => {
                if index == 0 {
                    self.write_header(descriptor).await?;
                } else if index == plan.steps.len() - 1 {
                    self.finalize(descriptor).await?;
                } else {
                    let entity = step
                        .entity
                        .as_ref()
                        .ok_or_else(|| eyre::eyre!("backup step {} has no entity", index))?;
                    self.append_entry(descriptor, entity).await?;
                }
                Ok(StepReport::default())
            }
            Direction::Restore => {
                let entity = step
                    .entity
                    .as_ref()
                    .ok_or_else(|| eyre::eyre!("restore step {} has no entity", index))?;
                self.apply_entry(descriptor, entity)
            }
        }
    }

    async fn embedded_selectors(&self, archive: &Path) -> eyre::Result<Option<Selectors>> {
        let manifest = Manifest::read(archive).await?;
        if manifest.header.selectors.is_empty() {
            Ok(None)
        } else {
            Ok(Some(manifest.header.selectors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::OptionFlags;

    fn catalog() -> Arc<Catalog> {
        Arc::new(
            Catalog::parse(
                //language=TOML
                r#"
                [workspaces.ws1.stores.shapes.layers.roads]
                [workspaces.ws2.stores.grids.layers.elevation]
                "#,
            )
            .unwrap(),
        )
    }

    async fn run_to_completion(engine: &ManifestEngine, descriptor: &Descriptor) -> Plan {
        let plan = engine.plan(descriptor).await.unwrap();
        for index in 0..plan.steps.len() {
            engine.run_step(descriptor, &plan, index).await.unwrap();
        }
        plan
    }

    fn backup_descriptor(path: &Path, selectors: Selectors) -> Descriptor {
        Descriptor::new(Direction::Backup, path, selectors, OptionFlags::default()).unwrap()
    }

    #[tokio::test]
    async fn should_write_scoped_manifest_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");
        let engine = ManifestEngine::new(catalog());
        let descriptor = backup_descriptor(
            &path,
            Selectors {
                workspace: Some("ws1".to_string()),
                store: None,
                layer: None,
            },
        );

        run_to_completion(&engine, &descriptor).await;

        let manifest = Manifest::read(&path).await.unwrap();
        assert_eq!(
            manifest.header.selectors.workspace,
            Some("ws1".to_string())
        );
        // ws1 + shapes + roads, nothing from ws2
        assert_eq!(manifest.entries.len(), 3);
        assert!(manifest.entries.iter().all(|e| e.name != "elevation"));
    }

    #[tokio::test]
    async fn should_keep_staging_file_unless_cleanup_temp_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");
        let engine = ManifestEngine::new(catalog());

        let descriptor = backup_descriptor(&path, Selectors::default());
        run_to_completion(&engine, &descriptor).await;
        assert!(staging_path(&path).exists());

        let descriptor = Descriptor::new(
            Direction::Backup,
            &path,
            Selectors::default(),
            OptionFlags {
                overwrite: true,
                cleanup_temp: true,
                ..OptionFlags::default()
            },
        )
        .unwrap();
        run_to_completion(&engine, &descriptor).await;
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn should_expose_embedded_selectors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");
        let engine = ManifestEngine::new(catalog());
        let descriptor = backup_descriptor(
            &path,
            Selectors {
                workspace: Some("ws1".to_string()),
                store: None,
                layer: None,
            },
        );
        run_to_completion(&engine, &descriptor).await;

        let embedded = engine.embedded_selectors(&path).await.unwrap();
        assert_eq!(
            embedded,
            Some(Selectors {
                workspace: Some("ws1".to_string()),
                store: None,
                layer: None,
            })
        );

        // a full backup embeds no selectors
        let full = dir.path().join("full.zip");
        let descriptor = backup_descriptor(&full, Selectors::default());
        run_to_completion(&engine, &descriptor).await;
        assert_eq!(engine.embedded_selectors(&full).await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_fail_restore_step_for_missing_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");
        let engine = ManifestEngine::new(catalog());
        let descriptor = backup_descriptor(&path, Selectors::default());
        run_to_completion(&engine, &descriptor).await;

        // restore against a catalog that lost ws2
        let smaller = Arc::new(
            Catalog::parse("[workspaces.ws1.stores.shapes.layers.roads]").unwrap(),
        );
        let engine = ManifestEngine::new(smaller);
        let descriptor = Descriptor::new(
            Direction::Restore,
            &path,
            Selectors::default(),
            OptionFlags::default(),
        )
        .unwrap();

        let plan = engine.plan(&descriptor).await.unwrap();
        let mut failures = 0;
        for index in 0..plan.steps.len() {
            if engine.run_step(&descriptor, &plan, index).await.is_err() {
                failures += 1;
            }
        }
        // the ws2 store and layer cannot be applied
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn should_warn_when_restoring_an_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.zip");
        let engine = ManifestEngine::new(catalog());
        let descriptor = backup_descriptor(&path, Selectors::default());
        run_to_completion(&engine, &descriptor).await;

        let descriptor = Descriptor::new(
            Direction::Restore,
            &path,
            Selectors::default(),
            OptionFlags {
                dry_run: true,
                ..OptionFlags::default()
            },
        )
        .unwrap();
        let plan = engine.plan(&descriptor).await.unwrap();
        let report = engine.run_step(&descriptor, &plan, 0).await.unwrap();

        assert_eq!(report.warnings.len(), 1);
    }
}
