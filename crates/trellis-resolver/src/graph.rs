//! Dependency tree construction and traversal.
//!
//! A walk produces a tree, not a DAG: the same library may appear at many
//! nodes, and deciding between them is the analyzer's job. Nodes live in a
//! petgraph arena; the single incoming edge of a node is its back-reference
//! to the parent, and outgoing edges keep declaration order by edge index.

use std::collections::VecDeque;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use trellis_core::framework::TargetFramework;
use trellis_core::library::{names_equal, LibraryIdentity, LibraryRange};

const NODE_ARROW: &str = " -> ";

/// A library found by a provider, with its declared dependencies and an
/// opaque payload the engine never inspects.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphItem<T> {
    pub key: LibraryIdentity,
    pub dependencies: Vec<LibraryRange>,
    pub data: T,
}

impl<T> GraphItem<T> {
    pub fn new(key: LibraryIdentity, dependencies: Vec<LibraryRange>, data: T) -> Self {
        Self {
            key,
            dependencies,
            data,
        }
    }
}

/// Final (or provisional) verdict on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Disposition {
    #[default]
    Acceptable,
    Accepted,
    Rejected,
    PotentiallyDowngraded,
    Cycle,
}

impl Disposition {
    fn marker(self) -> Option<&'static str> {
        match self {
            Self::Acceptable | Self::Accepted => None,
            Self::Rejected => Some("rejected"),
            Self::PotentiallyDowngraded => Some("potential downgrade"),
            Self::Cycle => Some("cycle"),
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Acceptable => "acceptable",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::PotentiallyDowngraded => "potentially downgraded",
            Self::Cycle => "cycle",
        };
        f.write_str(s)
    }
}

/// One node of the dependency tree: what was asked for, and what was found.
#[derive(Debug, Clone)]
pub struct GraphNode<T> {
    pub key: LibraryRange,
    /// `None` when the request was unresolved, or for cycle and downgrade placeholders.
    pub item: Option<GraphItem<T>>,
    pub disposition: Disposition,
}

impl<T> GraphNode<T> {
    pub fn new(key: LibraryRange, item: Option<GraphItem<T>>) -> Self {
        Self {
            key,
            item,
            disposition: Disposition::Acceptable,
        }
    }

    /// A node that is kept in the tree but never expanded.
    pub fn placeholder(key: LibraryRange, disposition: Disposition) -> Self {
        Self {
            key,
            item: None,
            disposition,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.item.is_some()
    }

    pub fn identity(&self) -> Option<&LibraryIdentity> {
        self.item.as_ref().map(|item| &item.key)
    }

    /// Name of the resolved library, falling back to the requested name.
    pub fn name(&self) -> &str {
        self.identity()
            .map(|id| id.name.as_str())
            .unwrap_or(&self.key.name)
    }

    /// `A 1.0.0` when resolved, the requested range otherwise.
    pub fn id_and_version_or_range(&self) -> String {
        match self.identity() {
            Some(id) => format!("{} {}", id.name, id.version),
            None => self.id_and_range(),
        }
    }

    /// `A (>= 1.0.0)`, or just the name when the range is unbounded.
    pub fn id_and_range(&self) -> String {
        let mut range = self.key.clone();
        range.name = self.name().to_string();
        range.to_string()
    }
}

impl<T> fmt::Display for GraphNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id_and_version_or_range())?;
        let marker = match (self.is_resolved(), self.disposition) {
            (false, Disposition::Acceptable | Disposition::Accepted) => Some("unresolved"),
            (_, disposition) => disposition.marker(),
        };
        match marker {
            Some(marker) => write!(f, " ({marker})"),
            None => Ok(()),
        }
    }
}

/// The dependency tree for one target framework, backed by petgraph.
#[derive(Debug, Clone)]
pub struct DependencyGraph<T> {
    graph: DiGraph<GraphNode<T>, ()>,
    root: NodeIndex,
    framework: TargetFramework,
}

impl<T> DependencyGraph<T> {
    pub fn new(root: GraphNode<T>, framework: TargetFramework) -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(root);
        Self {
            graph,
            root,
            framework,
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn framework(&self) -> &TargetFramework {
        &self.framework
    }

    /// Append `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeIndex, node: GraphNode<T>) -> NodeIndex {
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        idx
    }

    pub fn node(&self, idx: NodeIndex) -> &GraphNode<T> {
        &self.graph[idx]
    }

    pub fn node_mut(&mut self, idx: NodeIndex) -> &mut GraphNode<T> {
        &mut self.graph[idx]
    }

    /// Children of a node in declaration order.
    pub fn inner_nodes(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
            .collect();
        edges.sort_by_key(|(edge, _)| *edge);
        edges.into_iter().map(|(_, target)| target).collect()
    }

    /// Parent of a node; `None` for the root.
    pub fn outer_node(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut chain = Vec::new();
        let mut current = self.outer_node(idx);
        while let Some(node) = current {
            chain.push(node);
            current = self.outer_node(node);
        }
        chain
    }

    /// Distance from the root.
    pub fn depth(&self, idx: NodeIndex) -> usize {
        self.ancestors(idx).len()
    }

    /// Every node, breadth-first from the root, siblings in declaration order.
    pub fn breadth_first(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.graph.node_count());
        let mut queue = VecDeque::from([self.root]);
        while let Some(idx) = queue.pop_front() {
            order.push(idx);
            queue.extend(self.inner_nodes(idx));
        }
        order
    }

    /// All nodes whose library name matches, breadth-first.
    pub fn nodes_named(&self, name: &str) -> Vec<NodeIndex> {
        self.breadth_first()
            .into_iter()
            .filter(|&idx| names_equal(self.graph[idx].name(), name))
            .collect()
    }

    /// `A 1.0.0 -> B 1.0.0 -> C 2.0.0`
    pub fn path(&self, idx: NodeIndex) -> String {
        self.path_segments(idx, false).join(NODE_ARROW)
    }

    /// `A 1.0.0 -> B 1.0.0 -> C (= 2.0.0)`: the last node shows what was requested.
    pub fn path_with_last_range(&self, idx: NodeIndex) -> String {
        self.path_segments(idx, true).join(NODE_ARROW)
    }

    fn path_segments(&self, idx: NodeIndex, last_range: bool) -> Vec<String> {
        let mut segments = vec![if last_range {
            self.graph[idx].id_and_range()
        } else {
            self.graph[idx].id_and_version_or_range()
        }];
        for ancestor in self.ancestors(idx) {
            segments.push(self.graph[ancestor].id_and_version_or_range());
        }
        segments.reverse();
        segments
    }

    /// Navigate from the root by child names, taking the first match at each step.
    pub fn find_path(&self, names: &[&str]) -> Option<NodeIndex> {
        let mut current = self.root;
        for name in names {
            current = self
                .inner_nodes(current)
                .into_iter()
                .find(|&child| self.graph[child].key.is_named(name))?;
        }
        Some(current)
    }

    /// Render the tree with box-drawing connectors and disposition markers.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        output.push_str(&format!("{}\n", self.graph[self.root]));

        let children = self.inner_nodes(self.root);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.print_subtree(&mut output, child, "", i == count - 1, 1, max_depth);
        }
        output
    }

    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{}\n", self.graph[idx]));

        if max_depth.is_some_and(|max| depth >= max) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let children = self.inner_nodes(idx);
        let count = children.len();
        for (i, child) in children.into_iter().enumerate() {
            self.print_subtree(
                output,
                child,
                &child_prefix,
                i == count - 1,
                depth + 1,
                max_depth,
            );
        }
    }

    /// Number of nodes (excluding root).
    pub fn len(&self) -> usize {
        self.graph.node_count().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
