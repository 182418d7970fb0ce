//! Graph analysis: nearest-wins selection, version conflicts, downgrades and cycles.
//!
//! Analysis assigns the final [`Disposition`] of every node and reports what
//! it found as data. It never fails; whether a finding is acceptable is the
//! caller's decision.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::NodeIndex;
use trellis_core::framework::TargetFramework;
use trellis_core::library::{name_key, names_equal, LibraryIdentity, LibraryRange};
use trellis_core::version::{Version, VersionRange};

use crate::graph::{DependencyGraph, Disposition};

/// An owned snapshot of a graph node, detached from the graph it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub framework: TargetFramework,
    pub index: NodeIndex,
    pub key: LibraryRange,
    pub identity: Option<LibraryIdentity>,
    pub disposition: Disposition,
    /// `A 1.0.0 -> B 2.0.0`
    pub path: String,
}

impl NodeRef {
    pub fn capture<T>(graph: &DependencyGraph<T>, idx: NodeIndex) -> Self {
        let node = graph.node(idx);
        Self {
            framework: graph.framework().clone(),
            index: idx,
            key: node.key.clone(),
            identity: node.identity().cloned(),
            disposition: node.disposition,
            path: graph.path(idx),
        }
    }

    pub fn name(&self) -> &str {
        self.identity
            .as_ref()
            .map(|id| id.name.as_str())
            .unwrap_or(&self.key.name)
    }

    pub fn version(&self) -> Option<&Version> {
        self.identity.as_ref().map(|id| &id.version)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// A deeper request for a higher version that lost to a nearer, lower one.
///
/// A deeper request for a lower version is eclipsed by the nearer one while
/// walking and is never reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DowngradeResult {
    /// The farther node whose requested version was not honored.
    pub downgraded_from: NodeRef,
    /// The nearer node that won with a lower version.
    pub downgraded_to: NodeRef,
}

/// Two nodes for the same library with different versions; nearest wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConflictResult {
    pub selected: NodeRef,
    pub conflicting: NodeRef,
}

impl VersionConflictResult {
    /// Whether the selected version falls outside the range the losing node asked for.
    pub fn is_range_violation(&self) -> bool {
        match self.selected.version() {
            Some(version) => !self.conflicting.key.range_or_all().satisfies(version),
            None => false,
        }
    }
}

/// Everything analysis found in one or more graphs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeResult {
    pub downgrades: Vec<DowngradeResult>,
    pub version_conflicts: Vec<VersionConflictResult>,
    pub cycles: Vec<NodeRef>,
}

impl AnalyzeResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append another result. No deduplication is performed.
    pub fn combine(&mut self, other: AnalyzeResult) {
        self.downgrades.extend(other.downgrades);
        self.version_conflicts.extend(other.version_conflicts);
        self.cycles.extend(other.cycles);
    }

    pub fn is_empty(&self) -> bool {
        self.downgrades.is_empty() && self.version_conflicts.is_empty() && self.cycles.is_empty()
    }
}

impl fmt::Display for AnalyzeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No downgrades, version conflicts or cycles.");
        }
        if !self.downgrades.is_empty() {
            writeln!(f, "Downgrades ({}):", self.downgrades.len())?;
            for d in &self.downgrades {
                writeln!(
                    f,
                    "  [{}] {} downgraded to {}",
                    d.downgraded_from.framework,
                    d.downgraded_from.path,
                    d.downgraded_to.path
                )?;
            }
        }
        if !self.version_conflicts.is_empty() {
            writeln!(f, "Version conflicts ({}):", self.version_conflicts.len())?;
            for c in &self.version_conflicts {
                writeln!(
                    f,
                    "  [{}] {} rejected in favor of {}",
                    c.selected.framework, c.conflicting.path, c.selected.path
                )?;
            }
        }
        if !self.cycles.is_empty() {
            writeln!(f, "Cycles ({}):", self.cycles.len())?;
            for c in &self.cycles {
                writeln!(f, "  [{}] {}", c.framework, c.path)?;
            }
        }
        Ok(())
    }
}

/// Analyze one graph, assigning final dispositions.
///
/// Nodes are visited breadth-first with siblings in declaration order, so
/// for each library name the shallowest node wins and ties go to the
/// earliest declared. Everything below a rejected node is rejected too, so
/// a library reached only through rejected nodes has no accepted node.
/// Cycle placeholders keep their disposition; potential downgrade
/// placeholders are rejected once downgrades have been computed.
pub fn analyze<T>(graph: &mut DependencyGraph<T>) -> AnalyzeResult {
    let order = graph.breadth_first();
    let mut accepted: HashMap<String, NodeIndex> = HashMap::new();
    let mut conflicts: Vec<(NodeIndex, NodeIndex)> = Vec::new();
    let mut cycles = Vec::new();
    let mut potential = Vec::new();

    for &idx in &order {
        match graph.node(idx).disposition {
            Disposition::Cycle => {
                cycles.push(idx);
                continue;
            }
            Disposition::PotentiallyDowngraded => {
                potential.push(idx);
                continue;
            }
            _ => {}
        }

        let parent_rejected = graph
            .outer_node(idx)
            .is_some_and(|parent| graph.node(parent).disposition != Disposition::Accepted);
        let key = name_key(graph.node(idx).name());

        let disposition = if parent_rejected {
            Disposition::Rejected
        } else if let Some(&winner) = accepted.get(&key) {
            let won = graph.node(winner).identity().map(|id| &id.version);
            let lost = graph.node(idx).identity().map(|id| &id.version);
            if won != lost {
                conflicts.push((winner, idx));
            }
            Disposition::Rejected
        } else {
            accepted.insert(key, idx);
            Disposition::Accepted
        };
        graph.node_mut(idx).disposition = disposition;
    }

    let downgrades: Vec<(NodeIndex, NodeIndex)> = potential
        .iter()
        .filter_map(|&idx| find_downgrade(graph, idx).map(|to| (idx, to)))
        .filter(|&(from, to)| is_relevant_downgrade(graph, from, to))
        .collect();

    for &idx in &potential {
        graph.node_mut(idx).disposition = Disposition::Rejected;
    }

    let graph = &*graph;
    AnalyzeResult {
        downgrades: downgrades
            .into_iter()
            .map(|(from, to)| DowngradeResult {
                downgraded_from: NodeRef::capture(graph, from),
                downgraded_to: NodeRef::capture(graph, to),
            })
            .collect(),
        version_conflicts: conflicts
            .into_iter()
            .map(|(selected, conflicting)| VersionConflictResult {
                selected: NodeRef::capture(graph, selected),
                conflicting: NodeRef::capture(graph, conflicting),
            })
            .collect(),
        cycles: cycles
            .into_iter()
            .map(|idx| NodeRef::capture(graph, idx))
            .collect(),
    }
}

/// Analyze one graph per framework and combine the results in order.
pub fn analyze_all<T>(graphs: &mut [DependencyGraph<T>]) -> AnalyzeResult {
    let mut result = AnalyzeResult::new();
    for graph in graphs {
        result.combine(analyze(graph));
    }
    result
}

/// Search outward from a potential downgrade for the nearer node that wins
/// over it. The outermost decision stands: a nearer request that is at least
/// as high clears an inner match.
fn find_downgrade<T>(graph: &DependencyGraph<T>, idx: NodeIndex) -> Option<NodeIndex> {
    let node = graph.node(idx);
    let far = node.key.version_range.as_ref();
    let mut found = None;

    for ancestor in graph.ancestors(idx) {
        for side in graph.inner_nodes(ancestor) {
            let side_node = graph.node(side);
            if side == idx
                || !names_equal(&side_node.key.name, &node.key.name)
                || matches!(
                    side_node.disposition,
                    Disposition::Cycle | Disposition::PotentiallyDowngraded
                )
            {
                continue;
            }

            match (side_node.key.version_range.as_ref(), far) {
                (Some(near), Some(far)) if !VersionRange::is_greater_or_equal(near, far) => {
                    // The nearer request resolved into our range anyway.
                    if side_node
                        .identity()
                        .is_some_and(|id| far.satisfies(&id.version))
                    {
                        continue;
                    }
                    found = Some(side);
                }
                _ => found = None,
            }
        }
    }
    found
}

/// Only downgrades that shaped the result matter: the lower node must have
/// won, and the path to the downgraded node must be fully accepted.
fn is_relevant_downgrade<T>(graph: &DependencyGraph<T>, from: NodeIndex, to: NodeIndex) -> bool {
    graph.node(to).disposition == Disposition::Accepted
        && graph
            .ancestors(from)
            .into_iter()
            .all(|a| graph.node(a).disposition == Disposition::Accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphItem, GraphNode};
    use trellis_core::version::Version;

    fn resolved(name: &str, version: &str) -> GraphNode<()> {
        GraphNode::new(
            LibraryRange::package(name, version).unwrap(),
            Some(GraphItem::new(
                LibraryIdentity::package(name, Version::parse(version).unwrap()),
                Vec::new(),
                (),
            )),
        )
    }

    fn root(name: &str) -> DependencyGraph<()> {
        DependencyGraph::new(resolved(name, "1.0"), TargetFramework::any())
    }

    #[test]
    fn nearest_wins_over_deeper() {
        let mut g = root("App");
        let a = g.add_child(g.root(), resolved("A", "1.0"));
        let p_near = g.add_child(g.root(), resolved("P", "1.0"));
        let p_far = g.add_child(a, resolved("P", "0.5"));

        let result = analyze(&mut g);

        assert_eq!(g.node(p_near).disposition, Disposition::Accepted);
        assert_eq!(g.node(p_far).disposition, Disposition::Rejected);
        assert_eq!(result.version_conflicts.len(), 1);
        let conflict = &result.version_conflicts[0];
        assert_eq!(conflict.selected.path, "App 1.0.0 -> P 1.0.0");
        assert_eq!(conflict.conflicting.path, "App 1.0.0 -> A 1.0.0 -> P 0.5.0");
        assert!(!conflict.is_range_violation());
    }

    #[test]
    fn equal_depth_goes_to_first_declared() {
        let mut g = root("App");
        let a = g.add_child(g.root(), resolved("A", "1.0"));
        let b = g.add_child(g.root(), resolved("B", "1.0"));
        let via_a = g.add_child(a, resolved("D", "1.0"));
        let via_b = g.add_child(b, resolved("D", "2.0"));

        analyze(&mut g);

        assert_eq!(g.node(via_a).disposition, Disposition::Accepted);
        assert_eq!(g.node(via_b).disposition, Disposition::Rejected);
    }

    #[test]
    fn duplicates_are_not_conflicts() {
        let mut g = root("App");
        let a = g.add_child(g.root(), resolved("A", "1.0"));
        g.add_child(g.root(), resolved("C", "2.0"));
        g.add_child(a, resolved("C", "2.0"));

        let result = analyze(&mut g);
        assert!(result.is_empty());
    }

    #[test]
    fn rejected_subtrees_are_rejected() {
        let mut g = root("App");
        let a = g.add_child(g.root(), resolved("A", "1.0"));
        g.add_child(g.root(), resolved("B", "1.0"));
        let b_far = g.add_child(a, resolved("B", "2.0"));
        let below = g.add_child(b_far, resolved("X", "1.0"));

        let result = analyze(&mut g);

        assert_eq!(g.node(below).disposition, Disposition::Rejected);
        assert_eq!(result.version_conflicts.len(), 1);
        assert!(result.version_conflicts[0].is_range_violation());
    }

    #[test]
    fn one_accepted_per_name() {
        let mut g = root("App");
        let a = g.add_child(g.root(), resolved("A", "1.0"));
        let b = g.add_child(g.root(), resolved("B", "1.0"));
        g.add_child(a, resolved("C", "1.0"));
        g.add_child(b, resolved("c", "2.0"));
        g.add_child(b, resolved("A", "3.0"));

        analyze(&mut g);

        for name in ["A", "B", "C"] {
            let accepted = g
                .nodes_named(name)
                .into_iter()
                .filter(|&idx| g.node(idx).disposition == Disposition::Accepted)
                .count();
            assert_eq!(accepted, 1, "{name}");
        }
    }

    #[test]
    fn unresolved_conflicts_with_resolved() {
        let mut g = root("App");
        let a = g.add_child(g.root(), resolved("A", "1.0"));
        let b = g.add_child(g.root(), resolved("B", "1.0"));
        g.add_child(a, resolved("D", "2.0"));
        let missing = LibraryRange::package("D", "[1.0]").unwrap();
        g.add_child(b, GraphNode::new(missing, None));

        let result = analyze(&mut g);
        assert_eq!(result.version_conflicts.len(), 1);
        assert_eq!(
            result.version_conflicts[0].conflicting.path,
            "App 1.0.0 -> B 1.0.0 -> D (= 1.0.0)"
        );
    }

    #[test]
    fn cycles_are_collected() {
        let mut g = root("A");
        let b = g.add_child(g.root(), resolved("B", "2.0"));
        let back = LibraryRange::package("A", "1.0").unwrap();
        let cycle = g.add_child(b, GraphNode::placeholder(back, Disposition::Cycle));

        let result = analyze(&mut g);

        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].path, "A 1.0.0 -> B 2.0.0 -> A (>= 1.0.0)");
        assert_eq!(g.node(cycle).disposition, Disposition::Cycle);
    }

    #[test]
    fn combine_concatenates() {
        let mut g1 = root("A");
        let b = g1.add_child(g1.root(), resolved("B", "2.0"));
        let back = LibraryRange::package("A", "1.0").unwrap();
        g1.add_child(b, GraphNode::placeholder(back, Disposition::Cycle));
        let first = analyze(&mut g1);

        let mut g2 = g1.clone();
        let second = analyze(&mut g2);

        let mut combined = first.clone();
        combined.combine(second.clone());
        assert_eq!(combined.cycles.len(), first.cycles.len() + second.cycles.len());
        assert_eq!(combined.downgrades.len(), 0);

        let mut empty = AnalyzeResult::new();
        empty.combine(first.clone());
        assert_eq!(empty, first);
    }

    #[test]
    fn report_lists_findings() {
        let mut g = root("A");
        let b = g.add_child(g.root(), resolved("B", "2.0"));
        let back = LibraryRange::package("A", "1.0").unwrap();
        g.add_child(b, GraphNode::placeholder(back, Disposition::Cycle));

        let report = analyze(&mut g).to_string();
        assert!(report.contains("Cycles (1):"));
        assert!(report.contains("[any] A 1.0.0 -> B 2.0.0 -> A (>= 1.0.0)"));
        assert_eq!(
            AnalyzeResult::new().to_string(),
            "No downgrades, version conflicts or cycles.\n"
        );
    }
}
