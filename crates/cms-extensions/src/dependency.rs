//! Dependency checks and registration ordering.
//!
//! Two policies exist (see [`DependencyPolicy`]). Under the default
//! registration-order policy a dependency is met when its id is already
//! registered; nothing is reordered and version constraints are not read.
//! Under the resolved policy [`plan`] orders discovered extensions
//! dependency-first before registration, and [`check_dependencies`] also
//! checks each constraint against the registered dependency's version.
//!
//! # Example
//!
//! ```
//! use cms_extensions::dependency::DependencyGraph;
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_node("base-theme");
//! graph.add_node("blog");
//! graph.add_edge("blog", "base-theme");
//!
//! let order = graph.topological_sort().unwrap();
//! assert_eq!(order, vec!["base-theme", "blog"]);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use crate::descriptor::ExtensionDescriptor;
use crate::error::{Error, Result};
use crate::extension::Dependencies;
use crate::report::FailureReason;
use crate::settings::DependencyPolicy;
use crate::version::VersionConstraint;

/// Directed graph of extension dependencies.
///
/// Edges point from dependent to dependency: if A depends on B, the edge is
/// `A -> B`. Topological sort returns dependency-first order (B before A).
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    /// Adjacency list: key depends on each value.
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.edges.entry(id.clone()).or_default();
        self.nodes.insert(id);
    }

    /// Declare that `from` depends on `to`.
    ///
    /// Edges to ids that are not nodes are kept but ignored by the sort.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains(id)
    }

    /// Direct dependencies of a node (sorted).
    pub fn dependencies_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .get(id)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Nodes that directly depend on `id` (sorted).
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(from, deps)| self.nodes.contains(*from) && deps.contains(id))
            .map(|(from, _)| from.as_str())
            .collect()
    }

    /// Topological sort using Kahn's algorithm.
    ///
    /// Ties are broken alphabetically, so the result is deterministic.
    ///
    /// # Errors
    ///
    /// Returns `Error::DependencyCycle` naming every node that could not be
    /// ordered: the members of a cycle and anything waiting on one.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let (sorted, blocked) = self.kahn();
        if !blocked.is_empty() {
            return Err(Error::DependencyCycle {
                participants: blocked,
            });
        }
        Ok(sorted)
    }

    /// Returns `(sorted, blocked)`.
    fn kahn(&self) -> (Vec<String>, Vec<String>) {
        let mut pending: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|id| {
                let count = self
                    .edges
                    .get(id)
                    .map(|deps| deps.iter().filter(|d| self.nodes.contains(*d)).count())
                    .unwrap_or(0);
                (id.as_str(), count)
            })
            .collect();

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());
        while let Some(current) = ready.pop_first() {
            pending.remove(current);
            sorted.push(current.to_string());

            for dependent in self.dependents_of(current) {
                if let Some(count) = pending.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        let blocked = pending.keys().map(|id| id.to_string()).collect();
        (sorted, blocked)
    }

    /// Build a graph from discovered descriptors and their manifest
    /// dependencies.
    pub fn from_descriptors(descriptors: &[ExtensionDescriptor]) -> Self {
        let mut graph = Self::new();
        for descriptor in descriptors {
            graph.add_node(descriptor.id.as_str());
            for dependency in descriptor.dependencies().keys() {
                graph.add_edge(&descriptor.id, dependency);
            }
        }
        graph
    }
}

/// Registration order computed by the resolved policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPlan {
    /// Ids to register, dependency-first.
    pub order: Vec<String>,
    /// Ids excluded before registration, with the reason.
    pub rejected: Vec<(String, FailureReason)>,
}

/// Order `descriptors` dependency-first.
///
/// `registered` holds ids that are already registered; dependencies on them
/// are met without appearing in the plan. An extension is rejected when a
/// constraint does not parse, when a dependency is neither registered nor
/// plannable, or when it cannot be ordered because of a cycle. Rejection
/// propagates: dependents of a rejected extension are rejected too.
pub fn plan(descriptors: &[ExtensionDescriptor], registered: &BTreeSet<String>) -> ResolutionPlan {
    let mut rejected: Vec<(String, FailureReason)> = Vec::new();
    let mut viable: BTreeMap<&str, &ExtensionDescriptor> = BTreeMap::new();

    for descriptor in descriptors {
        if let Some(reason) = invalid_constraint(descriptor.dependencies()) {
            tracing::debug!(extension = %descriptor.id, "Rejected by dependency plan: {}", reason);
            rejected.push((descriptor.id.clone(), reason));
        } else {
            viable.insert(descriptor.id.as_str(), descriptor);
        }
    }

    // Drop extensions whose dependencies cannot be met until nothing changes.
    loop {
        let unmet: Vec<(&str, FailureReason)> = viable
            .values()
            .copied()
            .filter_map(|descriptor| {
                descriptor
                    .dependencies()
                    .iter()
                    .find(|(dep, _)| !registered.contains(*dep) && !viable.contains_key(dep.as_str()))
                    .map(|(dep, constraint)| {
                        (
                            descriptor.id.as_str(),
                            FailureReason::DependencyUnmet {
                                dependency: dep.clone(),
                                constraint: constraint.clone(),
                            },
                        )
                    })
            })
            .collect();

        if unmet.is_empty() {
            break;
        }
        for (id, reason) in unmet {
            viable.remove(id);
            rejected.push((id.to_string(), reason));
        }
    }

    let mut graph = DependencyGraph::new();
    for descriptor in viable.values().copied() {
        graph.add_node(descriptor.id.as_str());
        for dependency in descriptor.dependencies().keys() {
            if viable.contains_key(dependency.as_str()) {
                graph.add_edge(&descriptor.id, dependency);
            }
        }
    }

    let (order, blocked) = graph.kahn();
    for id in &blocked {
        rejected.push((
            id.clone(),
            FailureReason::DependencyCycle {
                participants: blocked.clone(),
            },
        ));
    }

    ResolutionPlan { order, rejected }
}

fn invalid_constraint(dependencies: &Dependencies) -> Option<FailureReason> {
    dependencies.iter().find_map(|(dep, raw)| {
        VersionConstraint::parse(raw)
            .err()
            .map(|e| FailureReason::InvalidConstraint {
                dependency: dep.clone(),
                reason: e.to_string(),
            })
    })
}

/// Check declared dependencies against the registered set.
///
/// `registered_version` returns the version of a registered extension, or
/// `None` when the id is not registered. Dependencies are checked in id
/// order and the first failure is returned.
pub fn check_dependencies<F>(
    dependencies: &Dependencies,
    policy: DependencyPolicy,
    registered_version: F,
) -> std::result::Result<(), FailureReason>
where
    F: Fn(&str) -> Option<String>,
{
    for (dependency, raw) in dependencies {
        let Some(found) = registered_version(dependency) else {
            return Err(FailureReason::DependencyUnmet {
                dependency: dependency.clone(),
                constraint: raw.clone(),
            });
        };

        if policy == DependencyPolicy::RegistrationOrder {
            continue;
        }

        let constraint =
            VersionConstraint::parse(raw).map_err(|e| FailureReason::InvalidConstraint {
                dependency: dependency.clone(),
                reason: e.to_string(),
            })?;
        if !constraint.satisfies(&found) {
            return Err(FailureReason::VersionMismatch {
                dependency: dependency.clone(),
                constraint: raw.clone(),
                found,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ExtensionManifest;
    use pretty_assertions::assert_eq;

    fn descriptor(id: &str, deps: &[(&str, &str)]) -> ExtensionDescriptor {
        let manifest = ExtensionManifest {
            dependencies: deps
                .iter()
                .map(|(d, c)| (d.to_string(), c.to_string()))
                .collect(),
            ..ExtensionManifest::default()
        };
        ExtensionDescriptor::new(id, format!("/ext/{id}"), manifest)
    }

    fn ids(plan: &ResolutionPlan) -> Vec<&str> {
        plan.order.iter().map(String::as_str).collect()
    }

    fn rejected_ids(plan: &ResolutionPlan) -> Vec<&str> {
        plan.rejected.iter().map(|(id, _)| id.as_str()).collect()
    }

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.topological_sort().unwrap().is_empty());
    }

    #[test]
    fn test_diamond_dependency() {
        let mut graph = DependencyGraph::new();
        for id in ["base", "left", "right", "top"] {
            graph.add_node(id);
        }
        graph.add_edge("left", "base");
        graph.add_edge("right", "base");
        graph.add_edge("top", "left");
        graph.add_edge("top", "right");

        let sorted = graph.topological_sort().unwrap();
        assert_eq!(sorted, vec!["base", "left", "right", "top"]);
    }

    #[test]
    fn test_independent_nodes_alphabetical() {
        let mut graph = DependencyGraph::new();
        for id in ["zebra", "alpha", "mid"] {
            graph.add_node(id);
        }
        assert_eq!(graph.topological_sort().unwrap(), vec!["alpha", "mid", "zebra"]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut graph = DependencyGraph::new();
        graph.add_node("a");
        graph.add_node("b");
        graph.add_node("c");
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");

        let err = graph.topological_sort().unwrap_err();
        match err {
            Error::DependencyCycle { participants } => assert_eq!(participants, vec!["a", "b"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let graph = DependencyGraph::from_descriptors(&[
            descriptor("blog", &[("base-theme", "*"), ("media", ">=1.0")]),
            descriptor("base-theme", &[]),
            descriptor("gallery", &[("media", "*")]),
        ]);
        assert_eq!(graph.dependencies_of("blog"), vec!["base-theme", "media"]);
        assert_eq!(graph.dependents_of("media"), vec!["blog", "gallery"]);
        assert!(graph.dependencies_of("base-theme").is_empty());
        assert!(!graph.contains("media"));
    }

    #[test]
    fn test_plan_orders_forward_declared_dependency_first() {
        // "alpha" sorts before "zeta" but depends on it.
        let plan = plan(
            &[descriptor("alpha", &[("zeta", "^1.0")]), descriptor("zeta", &[])],
            &BTreeSet::new(),
        );
        assert_eq!(ids(&plan), vec!["zeta", "alpha"]);
        assert!(plan.rejected.is_empty());
    }

    #[test]
    fn test_plan_counts_already_registered() {
        let registered = BTreeSet::from(["base".to_string()]);
        let plan = plan(&[descriptor("blog", &[("base", "*")])], &registered);
        assert_eq!(ids(&plan), vec!["blog"]);
    }

    #[test]
    fn test_plan_rejects_missing_dependency_transitively() {
        let plan = plan(
            &[
                descriptor("blog", &[("ghost", "*")]),
                descriptor("comments", &[("blog", "*")]),
                descriptor("solo", &[]),
            ],
            &BTreeSet::new(),
        );
        assert_eq!(ids(&plan), vec!["solo"]);
        assert_eq!(rejected_ids(&plan), vec!["blog", "comments"]);
        assert_eq!(
            plan.rejected[1].1,
            FailureReason::DependencyUnmet {
                dependency: "blog".to_string(),
                constraint: "*".to_string(),
            }
        );
    }

    #[test]
    fn test_plan_rejects_cycle_and_waiters() {
        let plan = plan(
            &[
                descriptor("a", &[("b", "*")]),
                descriptor("b", &[("a", "*")]),
                descriptor("c", &[("a", "*")]),
                descriptor("d", &[]),
            ],
            &BTreeSet::new(),
        );
        assert_eq!(ids(&plan), vec!["d"]);
        assert_eq!(rejected_ids(&plan), vec!["a", "b", "c"]);
        assert!(matches!(plan.rejected[0].1, FailureReason::DependencyCycle { .. }));
    }

    #[test]
    fn test_plan_rejects_invalid_constraint() {
        let plan = plan(&[descriptor("blog", &[("base", ">=banana")])], &BTreeSet::new());
        assert!(plan.order.is_empty());
        assert!(matches!(plan.rejected[0].1, FailureReason::InvalidConstraint { .. }));
    }

    #[test]
    fn test_check_registration_order_ignores_versions() {
        let deps = Dependencies::from([("base".to_string(), ">=9.0".to_string())]);
        let found = |id: &str| (id == "base").then(|| "1.0.0".to_string());
        assert!(check_dependencies(&deps, DependencyPolicy::RegistrationOrder, found).is_ok());
    }

    #[test]
    fn test_check_missing_dependency() {
        let deps = Dependencies::from([("base".to_string(), "*".to_string())]);
        let err = check_dependencies(&deps, DependencyPolicy::RegistrationOrder, |_| None)
            .unwrap_err();
        assert!(matches!(err, FailureReason::DependencyUnmet { .. }));
    }

    #[test]
    fn test_check_resolved_version_mismatch() {
        let deps = Dependencies::from([("base".to_string(), ">=2.0".to_string())]);
        let err = check_dependencies(&deps, DependencyPolicy::Resolved, |_| {
            Some("1.4.0".to_string())
        })
        .unwrap_err();
        assert_eq!(
            err,
            FailureReason::VersionMismatch {
                dependency: "base".to_string(),
                constraint: ">=2.0".to_string(),
                found: "1.4.0".to_string(),
            }
        );
    }

    #[test]
    fn test_check_resolved_satisfied() {
        let deps = Dependencies::from([("base".to_string(), "^1.2".to_string())]);
        assert!(
            check_dependencies(&deps, DependencyPolicy::Resolved, |_| Some("1.4.0".to_string()))
                .is_ok()
        );
    }
}
