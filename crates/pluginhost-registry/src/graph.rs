//! Dependency graph validation run when a plugin is admitted.
//!
//! Both checks are pure: they read the current registry contents through a
//! lookup closure and never mutate anything. They run once, at load time;
//! later state changes of a dependency are not re-verified.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::error::{RegistryError, RegistryResult};
use crate::metadata::PluginMetadata;
use crate::state::PluginState;

/// Verifies that every dependency is registered and not in `ERROR`.
///
/// `state_of` returns the recorded state of a registered plugin, or `None`
/// when the name is unknown. Dependencies are checked in declaration order and
/// the first violation is returned.
pub fn check_dependencies<F>(plugin: &str, dependencies: &[String], state_of: F) -> RegistryResult<()>
where
    F: Fn(&str) -> Option<PluginState>,
{
    for dependency in dependencies {
        match state_of(dependency) {
            None => {
                return Err(RegistryError::MissingDependency {
                    plugin: plugin.to_string(),
                    dependency: dependency.clone(),
                });
            }
            Some(PluginState::Error) => {
                return Err(RegistryError::DependencyInError {
                    plugin: plugin.to_string(),
                    dependency: dependency.clone(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the current DFS path.
    Visiting,
    /// Fully explored.
    Visited,
}

/// Depth-first search for a cycle reachable from a candidate plugin.
///
/// The candidate is not registered yet, so its edges come from
/// `candidate_deps`; every other node's edges come from `deps_of`, which
/// returns `None` for names that are not registered (treated as leaves).
///
/// Returns the cycle as a path that starts and ends at the same name, e.g.
/// `["b", "a", "b"]`.
pub fn find_cycle<F>(candidate: &str, candidate_deps: &[String], deps_of: F) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    let mut search = CycleSearch {
        candidate,
        candidate_deps,
        deps_of: &deps_of,
        marks: HashMap::new(),
        path: Vec::new(),
    };
    search.visit(candidate)
}

struct CycleSearch<'a, F> {
    candidate: &'a str,
    candidate_deps: &'a [String],
    deps_of: &'a F,
    marks: HashMap<String, Mark>,
    path: Vec<String>,
}

impl<F> CycleSearch<'_, F>
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    fn visit(&mut self, node: &str) -> Option<Vec<String>> {
        match self.marks.get(node) {
            Some(Mark::Visiting) => {
                let start = self.path.iter().position(|n| n == node).unwrap_or(0);
                let mut cycle = self.path[start..].to_vec();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            Some(Mark::Visited) => return None,
            None => {}
        }

        self.marks.insert(node.to_string(), Mark::Visiting);
        self.path.push(node.to_string());

        let edges = if node == self.candidate {
            self.candidate_deps.to_vec()
        } else {
            (self.deps_of)(node).unwrap_or_default()
        };

        for next in &edges {
            if let Some(cycle) = self.visit(next) {
                return Some(cycle);
            }
        }

        self.path.pop();
        self.marks.insert(node.to_string(), Mark::Visited);
        None
    }
}

/// Names of registered plugins that declare `name` as a dependency, in
/// admission order.
pub fn dependents_of<'a, I>(name: &str, records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a PluginMetadata>,
{
    let mut dependents: Vec<&PluginMetadata> = records
        .into_iter()
        .filter(|meta| meta.dependencies.iter().any(|d| d == name))
        .collect();
    dependents.sort_by_key(|meta| meta.sequence);
    dependents.into_iter().map(|meta| meta.name.clone()).collect()
}

/// Order in which registered plugins should be stopped: every plugin comes
/// before the plugins it depends on.
///
/// Among plugins that are free to go, the most recently admitted goes first.
/// If the remaining plugins form a cycle (possible with cycle detection off),
/// the most recently admitted of them is taken to break it.
pub fn shutdown_order(records: &[PluginMetadata]) -> Vec<String> {
    let mut pending: Vec<&PluginMetadata> = records.iter().collect();
    pending.sort_by_key(|meta| Reverse(meta.sequence));

    let mut order = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let next = pending
            .iter()
            .position(|candidate| {
                !pending.iter().any(|other| {
                    other.name != candidate.name
                        && other.dependencies.iter().any(|d| *d == candidate.name)
                })
            })
            .unwrap_or(0);
        order.push(pending.remove(next).name.clone());
    }
    order
}
