//! Dependency-ordered release planning.
//!
//! Candidates are sorted so dependencies release before their dependents,
//! then releases cascade forward: when a unit releases, every unit that
//! path-depends on one of its packages must release too, so its dependency
//! pin stays consistent. The input candidates are consumed and a new,
//! filtered [`ReleasePlan`] comes back.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::gather::ReleaseCandidate;
use crate::version;

/// Errors from release planning.
#[derive(thiserror::Error, Debug)]
pub enum PlanError {
    /// Workspace path dependencies form a cycle.
    #[error("dependency cycle involving `{0}`")]
    Cycle(String),
}

/// Result alias for planning.
pub type PlanResult<T> = Result<T, PlanError>;

/// The releases to perform, dependency-first.
#[derive(Debug)]
pub struct ReleasePlan {
    /// Releasing units in execution order.
    pub releases: Vec<ReleaseCandidate>,
}

impl ReleasePlan {
    /// Whether there is nothing to release.
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

/// Order candidates dependency-first and cascade releases to dependents.
pub fn plan(candidates: Vec<ReleaseCandidate>) -> PlanResult<ReleasePlan> {
    let mut ordered = order_by_dependencies(candidates)?;

    // package name -> index of its owning candidate
    let owner: HashMap<String, usize> = ordered
        .iter()
        .enumerate()
        .flat_map(|(i, c)| c.packages.iter().map(move |p| (p.name.clone(), i)))
        .collect();

    // package name -> names of packages that depend on it
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for candidate in &ordered {
        for package in &candidate.packages {
            for dep in &package.dependencies {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(package.name.clone());
            }
        }
    }

    // single forward pass: dependencies precede dependents, so one sweep
    // settles every cascade
    for i in 0..ordered.len() {
        if !ordered[i].should_release {
            continue;
        }
        let released: Vec<String> = ordered[i].packages.iter().map(|p| p.name.clone()).collect();
        for name in released {
            let Some(users) = dependents.get(&name) else {
                continue;
            };
            for user in users.clone() {
                let j = owner[&user];
                if j == i || ordered[j].should_release {
                    continue;
                }
                debug!(unit = ordered[j].name(), on = %name, "cascading release");
                ordered[j].should_release = true;
                ordered[j].cascaded = true;
                if !ordered[j].changed() {
                    ordered[j].next_version =
                        version::bumped(&ordered[j].prev_version, false, false);
                }
            }
        }
    }

    Ok(ReleasePlan {
        releases: ordered.into_iter().filter(|c| c.should_release).collect(),
    })
}

/// Sort candidates so every unit follows the units it depends on.
fn order_by_dependencies(
    candidates: Vec<ReleaseCandidate>,
) -> PlanResult<Vec<ReleaseCandidate>> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

    for candidate in &candidates {
        for package in &candidate.packages {
            let idx = graph.add_node(package.name.clone());
            nodes.insert(package.name.clone(), idx);
        }
    }
    for candidate in &candidates {
        for package in &candidate.packages {
            for dep in &package.dependencies {
                if let Some(&from) = nodes.get(dep) {
                    graph.add_edge(from, nodes[&package.name], ());
                }
            }
        }
    }

    let order = toposort(&graph, None)
        .map_err(|cycle| PlanError::Cycle(graph[cycle.node_id()].clone()))?;

    let owner: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .flat_map(|(i, c)| c.packages.iter().map(move |p| (p.name.as_str(), i)))
        .collect();

    let mut taken = vec![false; candidates.len()];
    let mut indices = Vec::with_capacity(candidates.len());
    for node in order {
        let i = owner[graph[node].as_str()];
        if !taken[i] {
            taken[i] = true;
            indices.push(i);
        }
    }

    let mut slots: Vec<Option<ReleaseCandidate>> = candidates.into_iter().map(Some).collect();
    Ok(indices
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Package;
    use semver::Version;
    use std::collections::BTreeSet;

    fn package(name: &str, deps: &[&str], independent: bool) -> Package {
        Package {
            name: name.into(),
            path: name.into(),
            independent,
            dependencies: deps.iter().map(ToString::to_string).collect::<BTreeSet<_>>(),
            lock_file: "Cargo.lock".into(),
        }
    }

    fn candidate(
        packages: Vec<Package>,
        prev: &str,
        next: &str,
        should_release: bool,
    ) -> ReleaseCandidate {
        let independent = packages.len() == 1 && packages[0].independent;
        let tag_prefix = if independent {
            format!("{}-", packages[0].name)
        } else {
            String::new()
        };
        let baseline_tag = format!("{tag_prefix}v{prev}");
        ReleaseCandidate {
            packages,
            independent,
            tag_prefix,
            baseline_tag,
            prev_version: Version::parse(prev).unwrap(),
            next_version: Version::parse(next).unwrap(),
            commits: Vec::new(),
            changelog: String::new(),
            should_release,
            has_feature: false,
            has_breaking_commit: false,
            breaking_api: false,
            cascaded: false,
        }
    }

    #[test]
    fn orders_dependencies_before_dependents() {
        let gateway = candidate(
            vec![package("gateway", &["shared"], true)],
            "0.5.0",
            "0.5.1",
            true,
        );
        let workspace = candidate(
            vec![
                package("cache", &["shared"], false),
                package("shared", &[], false),
            ],
            "0.3.1",
            "0.3.2",
            true,
        );

        let plan = plan(vec![gateway, workspace]).unwrap();
        let names: Vec<_> = plan.releases.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["workspace", "gateway"]);
    }

    #[test]
    fn release_cascades_to_dependents() {
        let shared = candidate(vec![package("shared", &[], true)], "0.3.1", "0.3.2", true);
        let gateway = candidate(
            vec![package("gateway", &["shared"], true)],
            "0.5.0",
            "0.5.1",
            false,
        );

        let plan = plan(vec![gateway, shared]).unwrap();
        assert_eq!(plan.releases.len(), 2);
        let gw = plan.releases.iter().find(|c| c.name() == "gateway").unwrap();
        assert!(gw.should_release);
        assert!(gw.cascaded);
        assert_eq!(gw.next_version, Version::parse("0.5.1").unwrap());
    }

    #[test]
    fn cascade_forces_a_patch_bump_when_version_is_unchanged() {
        let shared = candidate(vec![package("shared", &[], true)], "0.3.1", "0.3.2", true);
        // dependent whose gather produced no bump at all
        let gateway = candidate(
            vec![package("gateway", &["shared"], true)],
            "0.5.0",
            "0.5.0",
            false,
        );

        let plan = plan(vec![gateway, shared]).unwrap();
        let gw = plan.releases.iter().find(|c| c.name() == "gateway").unwrap();
        assert_eq!(gw.next_version, Version::parse("0.5.1").unwrap());
    }

    #[test]
    fn unreleased_units_are_dropped() {
        let gateway = candidate(
            vec![package("gateway", &[], true)],
            "0.5.0",
            "0.5.1",
            false,
        );
        let plan = plan(vec![gateway]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn cascades_transitively_through_the_graph() {
        let a = candidate(vec![package("a", &[], true)], "0.1.0", "0.1.1", true);
        let b = candidate(vec![package("b", &["a"], true)], "0.2.0", "0.2.1", false);
        let c = candidate(vec![package("c", &["b"], true)], "0.3.0", "0.3.1", false);

        let plan = plan(vec![c, b, a]).unwrap();
        let names: Vec<_> = plan.releases.iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(plan.releases[1].cascaded && plan.releases[2].cascaded);
    }

    #[test]
    fn dependency_cycle_is_an_error() {
        let a = candidate(vec![package("a", &["b"], true)], "0.1.0", "0.1.1", true);
        let b = candidate(vec![package("b", &["a"], true)], "0.2.0", "0.2.1", true);

        let err = plan(vec![a, b]).unwrap_err();
        assert!(matches!(err, PlanError::Cycle(_)));
    }
}
