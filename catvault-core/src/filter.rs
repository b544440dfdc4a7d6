use crate::catalog::Entity;
use serde::{Deserialize, Serialize};

/// The workspace/store/layer names a request narrows a job to, each
/// independently optional. Serializable so that archives can carry the scope
/// they were written with.
#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub workspace: Option<String>,
    pub store: Option<String>,
    pub layer: Option<String>,
}

impl Selectors {
    pub fn is_empty(&self) -> bool {
        self.workspace.is_none() && self.store.is_none() && self.layer.is_none()
    }
}

/// Property paths of the layered catalog model an equality filter can test.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// the entity's own name
    Name,
    /// `workspace.name`, the immediate parent workspace
    WorkspaceName,
    /// `store.name`, the immediate parent store
    StoreName,
    /// `resource.store.workspace.name`, the workspace reached through the
    /// store chain
    StoreWorkspaceName,
}

impl Entity {
    fn property(&self, property: Property) -> Option<&str> {
        match property {
            Property::Name => Some(&self.name),
            Property::WorkspaceName => self.workspace.as_deref(),
            Property::StoreName => self.store.as_deref(),
            Property::StoreWorkspaceName => self.chain_workspace.as_deref(),
        }
    }
}

/// Combinable predicate over catalog entities. `All` places no restriction
/// (full backup or restore).
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum ScopeFilter {
    All,
    Equals { property: Property, value: String },
    AnyOf(Vec<ScopeFilter>),
    AllOf(Vec<ScopeFilter>),
}

impl Default for ScopeFilter {
    fn default() -> Self {
        ScopeFilter::All
    }
}

impl ScopeFilter {
    fn equals(property: Property, value: &str) -> Self {
        ScopeFilter::Equals {
            property,
            value: value.to_owned(),
        }
    }

    /// Builds the scope for a launch request. Each given selector matches an
    /// entity by its own name or by any parent along the containment chain;
    /// multiple selectors narrow progressively.
    pub fn from_selectors(selectors: &Selectors) -> Self {
        let mut parts = Vec::new();
        if let Some(workspace) = &selectors.workspace {
            parts.push(ScopeFilter::AnyOf(vec![
                Self::equals(Property::Name, workspace),
                Self::equals(Property::WorkspaceName, workspace),
                Self::equals(Property::StoreWorkspaceName, workspace),
            ]));
        }
        if let Some(store) = &selectors.store {
            parts.push(ScopeFilter::AnyOf(vec![
                Self::equals(Property::Name, store),
                Self::equals(Property::StoreName, store),
            ]));
        }
        if let Some(layer) = &selectors.layer {
            parts.push(ScopeFilter::AnyOf(vec![Self::equals(
                Property::Name,
                layer,
            )]));
        }
        match parts.len() {
            0 => ScopeFilter::All,
            1 => parts.into_iter().next().unwrap(),
            _ => ScopeFilter::AllOf(parts),
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, ScopeFilter::All)
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            ScopeFilter::All => true,
            ScopeFilter::Equals { property, value } => {
                entity.property(*property) == Some(value.as_str())
            }
            ScopeFilter::AnyOf(filters) => filters.iter().any(|f| f.matches(entity)),
            ScopeFilter::AllOf(filters) => filters.iter().all(|f| f.matches(entity)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Kind;

    fn workspace(name: &str) -> Entity {
        Entity {
            kind: Kind::Workspace,
            name: name.to_string(),
            workspace: None,
            store: None,
            chain_workspace: None,
        }
    }

    fn store(name: &str, workspace: &str) -> Entity {
        Entity {
            kind: Kind::Store,
            name: name.to_string(),
            workspace: Some(workspace.to_string()),
            store: None,
            chain_workspace: Some(workspace.to_string()),
        }
    }

    fn layer(name: &str, store_name: &str, workspace: &str) -> Entity {
        Entity {
            kind: Kind::Layer,
            name: name.to_string(),
            workspace: None,
            store: Some(store_name.to_string()),
            chain_workspace: Some(workspace.to_string()),
        }
    }

    fn selectors(
        workspace: Option<&str>,
        store: Option<&str>,
        layer: Option<&str>,
    ) -> Selectors {
        Selectors {
            workspace: workspace.map(str::to_string),
            store: store.map(str::to_string),
            layer: layer.map(str::to_string),
        }
    }

    #[test]
    fn should_match_all_without_selectors() {
        let filter = ScopeFilter::from_selectors(&Selectors::default());

        assert_eq!(filter, ScopeFilter::All);
        assert!(filter.matches(&workspace("anything")));
    }

    #[test]
    fn should_match_workspace_selector_along_the_chain() {
        let filter = ScopeFilter::from_selectors(&selectors(Some("ws1"), None, None));

        // direct name match
        assert!(filter.matches(&workspace("ws1")));
        // immediate-parent match via workspace.name
        assert!(filter.matches(&store("shapes", "ws1")));
        // chain match via resource.store.workspace.name
        assert!(filter.matches(&layer("roads", "shapes", "ws1")));

        assert!(!filter.matches(&workspace("ws2")));
        assert!(!filter.matches(&store("shapes", "ws2")));
        assert!(!filter.matches(&layer("roads", "shapes", "ws2")));
    }

    #[test]
    fn should_combine_multiple_selectors_with_and() {
        let filter = ScopeFilter::from_selectors(&selectors(Some("ws1"), Some("shapes"), None));

        assert!(filter.matches(&layer("roads", "shapes", "ws1")));
        // right workspace, wrong store
        assert!(!filter.matches(&layer("roads", "grids", "ws1")));
        // right store, wrong workspace
        assert!(!filter.matches(&layer("roads", "shapes", "ws2")));
    }

    #[test]
    fn should_match_layer_selector_by_name_only() {
        let filter = ScopeFilter::from_selectors(&selectors(None, None, Some("roads")));

        assert!(filter.matches(&layer("roads", "shapes", "ws1")));
        assert!(!filter.matches(&layer("rivers", "shapes", "ws1")));
    }
}
