//! Module dependency graph using petgraph.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::{Error, Result};
use crate::module::{Module, Service};

/// Immutable snapshot of modules, their services and the dependencies
/// between them.
///
/// Modules and services keep their declaration order, which is the order
/// planners emit tasks in.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
    modules: IndexMap<String, Module>,
    services: IndexMap<String, Service>,
    cached_topological_order: Vec<String>,
}

impl DependencyGraph {
    /// Creates a new dependency graph from a list of modules.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency names an unknown module, if two
    /// modules or services share a name, or if circular dependencies are
    /// detected.
    pub fn new(modules: Vec<Module>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let mut modules_map = IndexMap::new();
        let mut services_map = IndexMap::new();

        for mut module in modules {
            if modules_map.contains_key(&module.name) {
                return Err(Error::DuplicateName {
                    kind: "module",
                    name: module.name,
                });
            }

            if module.path.as_os_str().is_empty() {
                module.path = module.name.clone().into();
            }

            for service in &mut module.services {
                if service.module.is_empty() {
                    service.module = module.name.clone();
                }
                if services_map.contains_key(&service.name) {
                    return Err(Error::DuplicateName {
                        kind: "service",
                        name: service.name.clone(),
                    });
                }
                services_map.insert(service.name.clone(), service.clone());
            }

            let node = graph.add_node(module.name.clone());
            node_map.insert(module.name.clone(), node);
            modules_map.insert(module.name.clone(), module);
        }

        let available = modules_map
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        for module in modules_map.values() {
            let from_node = node_map[&module.name];
            for dep_name in &module.deps {
                let to_node = node_map
                    .get(dep_name)
                    .ok_or_else(|| Error::ModuleNotFound {
                        name: dep_name.clone(),
                        available: available.clone(),
                    })?;
                graph.add_edge(from_node, *to_node, ());
            }
        }

        let sorted = toposort(&graph, None).map_err(|cycle| {
            let cycle_node = graph[cycle.node_id()].clone();
            Error::CircularDependency(format!("Cycle detected involving: {}", cycle_node))
        })?;

        let topological_order: Vec<String> = sorted
            .into_iter()
            .rev()
            .map(|idx| graph[idx].clone())
            .collect();

        Ok(Self {
            graph,
            node_map,
            modules: modules_map,
            services: services_map,
            cached_topological_order: topological_order,
        })
    }

    #[inline]
    pub fn get_module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Retrieves a module by name, failing with the list of known modules.
    pub fn module(&self, name: &str) -> Result<&Module> {
        self.modules
            .get(name)
            .ok_or_else(|| Error::ModuleNotFound {
                name: name.to_string(),
                available: self.module_names().join(", "),
            })
    }

    #[inline]
    pub fn get_service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    /// Returns all modules in declaration order.
    pub fn all_modules(&self) -> Vec<&Module> {
        self.modules.values().collect()
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    /// Returns all services, grouped by owning module in declaration order.
    pub fn all_services(&self) -> Vec<&Service> {
        self.services.values().collect()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    /// Looks up services by name, in graph order. Unknown names are skipped;
    /// callers that need them reported validate up front.
    pub fn services_by_name<S: AsRef<str>>(&self, names: &[S]) -> Vec<&Service> {
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        self.services
            .values()
            .filter(|s| wanted.contains(s.name.as_str()))
            .collect()
    }

    /// Returns modules in topological order (dependencies before dependants).
    #[inline]
    pub fn topological_order(&self) -> &[String] {
        &self.cached_topological_order
    }

    fn node(&self, module_name: &str) -> Result<NodeIndex> {
        self.node_map
            .get(module_name)
            .copied()
            .ok_or_else(|| Error::ModuleNotFound {
                name: module_name.to_string(),
                available: self.module_names().join(", "),
            })
    }

    /// Returns direct dependencies of a module.
    pub fn dependencies(&self, module_name: &str) -> Result<Vec<String>> {
        let node = self.node(module_name)?;
        Ok(self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|idx| self.graph[idx].clone())
            .collect())
    }

    /// Returns direct dependants of a module (modules that depend on it).
    pub fn dependants(&self, module_name: &str) -> Result<Vec<String>> {
        let node = self.node(module_name)?;
        Ok(self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|idx| self.graph[idx].clone())
            .collect())
    }

    /// Returns the module and every module that transitively depends on it,
    /// in declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the module is not found in the graph.
    pub fn transitive_dependants(&self, module_name: &str) -> Result<Vec<&Module>> {
        let mut closure = HashSet::new();
        let mut stack = vec![self.node(module_name)?];

        while let Some(current) = stack.pop() {
            if !closure.insert(current) {
                continue;
            }
            stack.extend(
                self.graph
                    .neighbors_directed(current, Direction::Incoming)
                    .filter(|idx| !closure.contains(idx)),
            );
        }

        Ok(self
            .modules
            .values()
            .filter(|m| closure.contains(&self.node_map[&m.name]))
            .collect())
    }
}
