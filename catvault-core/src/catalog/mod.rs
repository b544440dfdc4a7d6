use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

pub mod layer;
pub mod store;
pub mod workspace;

/// Read-only view of the server's configuration tree: workspaces containing
/// stores containing layers. Jobs never mutate this, they only enumerate it.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub workspaces: HashMap<workspace::Name, workspace::Definition>,

    /// path of the catalog file, if the catalog was loaded from a file
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogLoadError {
    #[error("invalid catalog string")]
    InvalidCatalogString(#[source] eyre::Report),
    #[error("invalid catalog file {}", .0.display())]
    InvalidCatalogFile(PathBuf, #[source] eyre::Report),
    #[error("i/o error reading catalog file {}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("unknown workspace '{}'", (self.0).0)]
pub struct UnknownWorkspace(pub workspace::Name);

impl Catalog {
    pub fn parse(s: &str) -> Result<Catalog, CatalogLoadError> {
        toml::from_str(s).map_err(|e| CatalogLoadError::InvalidCatalogString(e.into()))
    }

    pub async fn parse_file(p: &Path) -> Result<Catalog, CatalogLoadError> {
        let catalog_string = tokio::fs::read_to_string(p)
            .await
            .map_err(|e| CatalogLoadError::IoError(p.to_owned(), e))?;
        let mut catalog: Catalog = toml::from_str(&catalog_string)
            .map_err(|e| CatalogLoadError::InvalidCatalogFile(p.to_owned(), e.into()))?;
        catalog.source = Some(p.to_owned());
        Ok(catalog)
    }

    pub fn workspace(
        &self,
        name: &workspace::Name,
    ) -> Result<&workspace::Definition, UnknownWorkspace> {
        self.workspaces
            .get(name)
            .ok_or_else(|| UnknownWorkspace(name.clone()))
    }

    /// Flattens the tree into filterable entities, workspaces first, then
    /// each workspace's stores, then each store's layers.
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities = Vec::new();
        let mut workspaces = self.workspaces.iter().collect::<Vec<_>>();
        workspaces.sort_by_key(|(name, _)| name.0.clone());
        for (ws_name, ws) in workspaces {
            entities.push(Entity {
                kind: Kind::Workspace,
                name: ws_name.0.clone(),
                workspace: None,
                store: None,
                chain_workspace: None,
            });
            let mut stores = ws.stores.iter().collect::<Vec<_>>();
            stores.sort_by_key(|(name, _)| name.0.clone());
            for (st_name, st) in stores {
                entities.push(Entity {
                    kind: Kind::Store,
                    name: st_name.0.clone(),
                    workspace: Some(ws_name.0.clone()),
                    store: None,
                    chain_workspace: Some(ws_name.0.clone()),
                });
                let mut layers = st.layers.keys().collect::<Vec<_>>();
                layers.sort();
                for ly_name in layers {
                    entities.push(Entity {
                        kind: Kind::Layer,
                        name: ly_name.0.clone(),
                        workspace: None,
                        store: Some(st_name.0.clone()),
                        chain_workspace: Some(ws_name.0.clone()),
                    });
                }
            }
        }
        entities
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Workspace,
    Store,
    Layer,
}

/// One catalog entry flattened for filter evaluation. The optional fields
/// mirror the property paths of the layered model: a store knows its
/// workspace directly, a layer only reaches its workspace through its store.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub kind: Kind,
    pub name: String,
    /// immediate parent workspace (stores)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub workspace: Option<String>,
    /// immediate parent store (layers)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub store: Option<String>,
    /// workspace reached through the store chain (stores and layers)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chain_workspace: Option<String>,
}

impl Entity {
    pub fn label(&self) -> String {
        match self.kind {
            Kind::Workspace => format!("workspace.{}", self.name),
            Kind::Store => format!("store.{}", self.name),
            Kind::Layer => format!("layer.{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn should_parse_complex_catalog() -> eyre::Result<()> {
        let catalog = Catalog::parse(
            //language=TOML
            r#"
            [workspaces.ws1]
            title = "First workspace"

            [workspaces.ws1.stores.shapes]
            location = "file:data/shapes"

            [workspaces.ws1.stores.shapes.layers.roads]
            title = "Roads"
            enabled = true

            [workspaces.ws1.stores.shapes.layers.rivers]

            [workspaces.ws2]
            "#,
        )?;

        assert_eq!(
            catalog,
            Catalog {
                workspaces: hashmap! {
                    workspace::Name("ws1".to_string()) => workspace::Definition {
                        title: Some("First workspace".to_string()),
                        stores: hashmap! {
                            store::Name("shapes".to_string()) => store::Definition {
                                location: Some("file:data/shapes".to_string()),
                                layers: hashmap! {
                                    layer::Name("roads".to_string()) => layer::Definition {
                                        title: Some("Roads".to_string()),
                                        enabled: Some(true),
                                    },
                                    layer::Name("rivers".to_string()) => layer::Definition::default(),
                                },
                            },
                        },
                    },
                    workspace::Name("ws2".to_string()) => workspace::Definition::default(),
                },
                source: None,
            }
        );
        Ok(())
    }

    #[test]
    fn should_flatten_entities_with_parent_chain() -> eyre::Result<()> {
        let catalog = Catalog::parse(
            //language=TOML
            r#"
            [workspaces.ws1.stores.shapes.layers.roads]
            "#,
        )?;

        let entities = catalog.entities();

        assert_eq!(
            entities,
            vec![
                Entity {
                    kind: Kind::Workspace,
                    name: "ws1".to_string(),
                    workspace: None,
                    store: None,
                    chain_workspace: None,
                },
                Entity {
                    kind: Kind::Store,
                    name: "shapes".to_string(),
                    workspace: Some("ws1".to_string()),
                    store: None,
                    chain_workspace: Some("ws1".to_string()),
                },
                Entity {
                    kind: Kind::Layer,
                    name: "roads".to_string(),
                    workspace: None,
                    store: Some("shapes".to_string()),
                    chain_workspace: Some("ws1".to_string()),
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn should_fail_lookup_of_unknown_workspace() {
        let catalog = Catalog::default();
        let result = catalog.workspace(&workspace::Name("nope".to_string()));
        assert!(result.is_err());
    }
}
