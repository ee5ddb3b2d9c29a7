//! Module, service and test data models.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A deployable unit owned by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    /// Name of the owning module. Filled in by the graph if left empty.
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub disabled: bool,
    /// Whether code changes can be pushed into the running service.
    #[serde(default, rename = "hot_reload")]
    pub hot_reloadable: bool,
    /// Shell command that follows this service's logs on stdout.
    #[serde(default)]
    pub logs: Option<String>,
}

impl Service {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            disabled: false,
            hot_reloadable: false,
            logs: None,
        }
    }

    pub fn hot_reloadable(mut self, hot_reloadable: bool) -> Self {
        self.hot_reloadable = hot_reloadable;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// A named test suite declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConfig {
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
}

impl TestConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disabled: false,
        }
    }
}

/// A buildable unit that may own services and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Source directory relative to the project root. Defaults to the name.
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default)]
    pub disabled: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_deps",
        serialize_with = "serialize_deps"
    )]
    pub deps: SmallVec<[String; 4]>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub tests: Vec<TestConfig>,
}

fn deserialize_deps<'de, D>(deserializer: D) -> Result<SmallVec<[String; 4]>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let vec: Vec<String> = Vec::deserialize(deserializer)?;
    Ok(SmallVec::from_vec(vec))
}

fn serialize_deps<S>(deps: &SmallVec<[String; 4]>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let vec: Vec<&String> = deps.iter().collect();
    vec.serialize(serializer)
}

impl Module {
    pub fn new(name: impl Into<String>, deps: Vec<String>) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            disabled: false,
            deps: SmallVec::from_vec(deps),
            services: Vec::new(),
            tests: Vec::new(),
        }
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_test(mut self, test: TestConfig) -> Self {
        self.tests.push(test);
        self
    }

    #[inline]
    pub fn get_service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }
}
