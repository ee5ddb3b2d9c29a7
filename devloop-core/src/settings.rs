//! Session settings and their resolution against a dependency graph.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::module::{Module, Service};

/// Raw wildcard token accepted from user input.
pub const WILDCARD: &str = "*";

/// A user selection of targets: either everything, or an explicit list.
///
/// Only the exact raw list `["*"]` means [`Selection::All`]. Mixed lists such
/// as `["*", "api"]` are treated as literal names, and so is a target that is
/// genuinely called `*` once it has been parsed into `Named`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum Selection {
    All,
    Named(Vec<String>),
}

impl Selection {
    pub fn none() -> Self {
        Selection::Named(Vec::new())
    }

    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Named(names.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Named(names) => names.iter().any(|n| n == name),
        }
    }

    /// Expands the selection to concrete names, using `all` for the wildcard.
    pub fn expand<I, S>(&self, all: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            Selection::All => all.into_iter().map(Into::into).collect(),
            Selection::Named(names) => names.iter().cloned().collect(),
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Selection::none()
    }
}

impl From<Vec<String>> for Selection {
    fn from(names: Vec<String>) -> Self {
        if names.len() == 1 && names[0] == WILDCARD {
            Selection::All
        } else {
            Selection::Named(names)
        }
    }
}

impl From<Selection> for Vec<String> {
    fn from(selection: Selection) -> Self {
        match selection {
            Selection::All => vec![WILDCARD.to_string()],
            Selection::Named(names) => names,
        }
    }
}

/// Target and mode selections for one continuous-development run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    #[serde(default)]
    pub deploy_service_names: Selection,
    #[serde(default)]
    pub test_module_names: Selection,
    #[serde(default)]
    pub test_config_names: Selection,
    #[serde(default)]
    pub dev_mode_service_names: Selection,
    #[serde(default)]
    pub hot_reload_service_names: Selection,
}

impl SessionSettings {
    /// Deploys and tests everything, with no dev mode or hot reload.
    pub fn everything() -> Self {
        Self {
            deploy_service_names: Selection::All,
            test_module_names: Selection::All,
            test_config_names: Selection::All,
            dev_mode_service_names: Selection::none(),
            hot_reload_service_names: Selection::none(),
        }
    }
}

/// Concrete targets derived from [`SessionSettings`] and a graph.
///
/// `hot_reload_service_names` and `dev_mode_service_names` never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub services_to_deploy: Vec<Service>,
    pub hot_reload_service_names: BTreeSet<String>,
    pub dev_mode_service_names: BTreeSet<String>,
    /// `None` means no filter on test names.
    pub test_names: Option<BTreeSet<String>>,
}

impl ResolvedSelection {
    pub fn deploy_service_names(&self) -> BTreeSet<String> {
        self.services_to_deploy
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }
}

/// Resolves raw, possibly wildcard selections into concrete target sets.
pub fn resolve(graph: &DependencyGraph, settings: &SessionSettings) -> ResolvedSelection {
    let hot_reload_service_names = settings.hot_reload_service_names.expand(
        graph
            .all_services()
            .into_iter()
            .filter(|s| s.hot_reloadable)
            .map(|s| s.name.clone()),
    );

    let services_to_deploy: Vec<Service> = match &settings.deploy_service_names {
        Selection::All => graph.all_services().into_iter().cloned().collect(),
        Selection::Named(names) => graph.services_by_name(names).into_iter().cloned().collect(),
    };

    // Explicit hot reload overrides dev mode for the same service.
    let dev_mode_service_names = settings
        .dev_mode_service_names
        .expand(graph.service_names())
        .into_iter()
        .filter(|name| services_to_deploy.iter().any(|s| &s.name == name))
        .filter(|name| !hot_reload_service_names.contains(name))
        .collect();

    let test_names = match &settings.test_config_names {
        Selection::All => None,
        Selection::Named(names) => Some(names.iter().cloned().collect()),
    };

    ResolvedSelection {
        services_to_deploy,
        hot_reload_service_names,
        dev_mode_service_names,
        test_names,
    }
}

/// Whether test tasks should be generated for `module`.
#[inline]
pub fn module_should_be_tested(settings: &SessionSettings, module: &Module) -> bool {
    settings.test_module_names.contains(&module.name)
}

/// Checks named selections against the graph before any planning happens.
///
/// # Errors
///
/// Returns [`Error::Validation`] if a hot-reload service is unknown or not
/// hot-reload capable, or if a named deploy service or test module does not
/// exist.
pub fn validate(graph: &DependencyGraph, settings: &SessionSettings) -> Result<()> {
    if let Selection::Named(names) = &settings.hot_reload_service_names {
        for name in names {
            match graph.get_service(name) {
                None => {
                    return Err(Error::Validation(format!(
                        "hot reload requested for unknown service '{}'",
                        name
                    )))
                }
                Some(service) if !service.hot_reloadable => {
                    return Err(Error::Validation(format!(
                        "service '{}' is not configured for hot reloading",
                        name
                    )))
                }
                Some(_) => {}
            }
        }
    }

    if let Selection::Named(names) = &settings.deploy_service_names {
        if let Some(missing) = names.iter().find(|n| graph.get_service(n).is_none()) {
            return Err(Error::Validation(format!(
                "unknown service '{}'. Available services: {}",
                missing,
                graph.service_names().join(", ")
            )));
        }
    }

    if let Selection::Named(names) = &settings.test_module_names {
        if let Some(missing) = names.iter().find(|n| graph.get_module(n).is_none()) {
            return Err(Error::Validation(format!(
                "unknown module '{}'. Available modules: {}",
                missing,
                graph.module_names().join(", ")
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_exact_wildcard_list_selects_all() {
        assert_eq!(Selection::from(vec!["*".to_string()]), Selection::All);
        assert_eq!(
            Selection::from(vec!["*".to_string(), "api".to_string()]),
            Selection::named(["*", "api"])
        );
        assert_eq!(Selection::from(Vec::new()), Selection::none());
    }

    #[test]
    fn test_selection_serializes_to_raw_list() {
        let settings = SessionSettings::everything();
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["deployServiceNames"], serde_json::json!(["*"]));
        assert_eq!(json["hotReloadServiceNames"], serde_json::json!([]));
    }
}
