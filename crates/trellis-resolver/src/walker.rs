//! Concurrent dependency graph walking.
//!
//! The walker expands a root request level by level. Provider lookups for a
//! level run in parallel on a `JoinSet`, bounded by a semaphore; the tree
//! itself is assembled afterwards in declaration order, so its shape never
//! depends on which lookup finishes first.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::graph::NodeIndex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use trellis_core::config::WalkConfig;
use trellis_core::framework::TargetFramework;
use trellis_core::library::{names_equal, LibraryRange};
use trellis_core::version::VersionRange;
use trellis_util::errors::{TrellisError, TrellisResult};

use crate::graph::{DependencyGraph, Disposition, GraphItem, GraphNode};
use crate::provider::DependencyProvider;

const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Upper bound on provider lookups in flight. Zero is treated as one.
    pub max_concurrent_lookups: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: DEFAULT_MAX_CONCURRENT_LOOKUPS,
        }
    }
}

impl From<&WalkConfig> for WalkOptions {
    fn from(config: &WalkConfig) -> Self {
        Self {
            max_concurrent_lookups: config.max_concurrent_lookups,
        }
    }
}

/// What to do with one declared dependency.
#[derive(Debug)]
enum Step {
    /// Look it up and expand it.
    Resolve(LibraryRange),
    /// Keep it as a leaf that is never looked up.
    Placeholder(LibraryRange, Disposition),
    /// Keep it as an unresolved leaf; its type cannot come from a provider.
    Unresolvable(LibraryRange),
}

/// A walk that may have stopped early.
///
/// `graph` holds every level finished before `interrupted` was raised; the
/// level being looked up at that point is left out entirely, so nodes of the
/// last finished level are resolved but not expanded.
pub struct WalkOutcome<T> {
    pub graph: DependencyGraph<T>,
    pub interrupted: Option<TrellisError>,
}

impl<T> WalkOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }

    /// The graph of a complete walk, or the error that stopped it.
    pub fn into_result(self) -> TrellisResult<DependencyGraph<T>> {
        match self.interrupted {
            None => Ok(self.graph),
            Some(err) => Err(err),
        }
    }
}

/// Builds dependency graphs from a [`DependencyProvider`].
pub struct GraphWalker<P: DependencyProvider> {
    provider: Arc<P>,
    options: WalkOptions,
    cancel: CancellationToken,
}

impl<P: DependencyProvider> GraphWalker<P> {
    pub fn new(provider: P) -> Self {
        Self::from_arc(Arc::new(provider))
    }

    /// Share a provider, e.g. a [`crate::cache::CachedProvider`], between walkers.
    pub fn from_arc(provider: Arc<P>) -> Self {
        Self {
            provider,
            options: WalkOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Walk the graph rooted at `root` for one framework.
    ///
    /// Missing libraries do not fail the walk; they become unresolved
    /// nodes. The only errors are cancellation and a lookup task panicking.
    pub async fn walk(
        &self,
        root: LibraryRange,
        framework: &TargetFramework,
    ) -> TrellisResult<DependencyGraph<P::Item>> {
        self.walk_partial(root, framework).await.into_result()
    }

    /// Like [`GraphWalker::walk`], but keeps the levels built before a
    /// cancellation or failed lookup and returns them with the error.
    pub async fn walk_partial(
        &self,
        root: LibraryRange,
        framework: &TargetFramework,
    ) -> WalkOutcome<P::Item> {
        tracing::debug!("walking {root} for {framework}");

        let mut memo: HashMap<LibraryRange, Option<GraphItem<P::Item>>> = HashMap::new();
        let mut interrupted = self.check_cancelled().err();
        if interrupted.is_none() && root.type_constraint.is_resolvable() {
            interrupted = self
                .fetch(std::slice::from_ref(&root), framework, &mut memo)
                .await
                .err();
        }
        let root_item = memo.get(&root).cloned().flatten();
        let root_resolved = root_item.is_some();

        let mut graph = DependencyGraph::new(GraphNode::new(root, root_item), framework.clone());
        let mut frontier = if root_resolved {
            vec![graph.root()]
        } else {
            Vec::new()
        };
        let mut depth = 0;

        while !frontier.is_empty() {
            depth += 1;
            let plan: Vec<(NodeIndex, Vec<Step>)> = frontier
                .iter()
                .map(|&parent| (parent, plan_children(&graph, parent)))
                .collect();

            let pending: Vec<LibraryRange> = plan
                .iter()
                .flat_map(|(_, steps)| steps)
                .filter_map(|step| match step {
                    Step::Resolve(range) if !memo.contains_key(range) => Some(range.clone()),
                    _ => None,
                })
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            tracing::debug!(
                "level {depth}: {} parents, {} new lookups",
                frontier.len(),
                pending.len()
            );
            if let Err(err) = self.fetch(&pending, framework, &mut memo).await {
                tracing::debug!("walk for {framework} stopped at level {depth}: {err}");
                interrupted = Some(err);
                break;
            }

            let mut next = Vec::new();
            for (parent, steps) in plan {
                for step in steps {
                    let child = match step {
                        Step::Resolve(range) => {
                            let item = memo.get(&range).cloned().flatten();
                            let resolved = item.is_some();
                            let idx = graph.add_child(parent, GraphNode::new(range, item));
                            if resolved {
                                next.push(idx);
                            }
                            idx
                        }
                        Step::Placeholder(range, disposition) => {
                            graph.add_child(parent, GraphNode::placeholder(range, disposition))
                        }
                        Step::Unresolvable(range) => {
                            graph.add_child(parent, GraphNode::new(range, None))
                        }
                    };
                    tracing::trace!("added {}", graph.node(child));
                }
            }
            frontier = next;
        }

        WalkOutcome { graph, interrupted }
    }

    /// Walk once per framework, in order. An empty list walks for "any".
    pub async fn walk_all(
        &self,
        root: &LibraryRange,
        frameworks: &[TargetFramework],
    ) -> TrellisResult<Vec<DependencyGraph<P::Item>>> {
        let any = [TargetFramework::any()];
        let frameworks = if frameworks.is_empty() {
            &any[..]
        } else {
            frameworks
        };

        let mut graphs = Vec::with_capacity(frameworks.len());
        for framework in frameworks {
            graphs.push(self.walk(root.clone(), framework).await?);
        }
        Ok(graphs)
    }

    fn check_cancelled(&self) -> TrellisResult<()> {
        if self.cancel.is_cancelled() {
            return Err(TrellisError::Cancelled);
        }
        Ok(())
    }

    /// Look up every range in parallel and record the answers in `memo`.
    async fn fetch(
        &self,
        ranges: &[LibraryRange],
        framework: &TargetFramework,
        memo: &mut HashMap<LibraryRange, Option<GraphItem<P::Item>>>,
    ) -> TrellisResult<()> {
        if ranges.is_empty() {
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_lookups.max(1)));
        let mut join_set = JoinSet::new();
        for range in ranges {
            self.check_cancelled()?;
            let provider = self.provider.clone();
            let cancel = self.cancel.clone();
            let semaphore = semaphore.clone();
            let range = range.clone();
            let framework = framework.clone();
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| TrellisError::Walk {
                        message: format!("lookup limiter closed: {e}"),
                    })?;
                if cancel.is_cancelled() {
                    return Err(TrellisError::Cancelled);
                }
                tracing::trace!("looking up {range} for {framework}");
                let found = tokio::select! {
                    _ = cancel.cancelled() => return Err(TrellisError::Cancelled),
                    found = provider.find_library(&range, &framework) => found,
                };
                Ok::<_, TrellisError>((range, found))
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let (range, found) = joined.map_err(|e| TrellisError::Walk {
                message: format!("lookup task failed: {e}"),
            })??;
            if found.is_none() {
                tracing::debug!("{range} could not be resolved for {framework}");
            }
            memo.insert(range, found);
        }
        Ok(())
    }
}

/// Decide how each dependency of `parent` enters the tree.
fn plan_children<T>(graph: &DependencyGraph<T>, parent: NodeIndex) -> Vec<Step> {
    let Some(item) = graph.node(parent).item.as_ref() else {
        return Vec::new();
    };
    item.dependencies
        .iter()
        .filter_map(|dependency| classify(graph, parent, dependency))
        .collect()
}

/// Check a dependency against the chain above the node declaring it.
///
/// A name already on the chain is a cycle. A request for the same library
/// made by an ancestor eclipses this one: it is dropped when the nearer
/// request is at least as high, and kept as a potential downgrade when it
/// is lower. Returns `None` for an eclipsed dependency.
fn classify<T>(
    graph: &DependencyGraph<T>,
    parent: NodeIndex,
    dependency: &LibraryRange,
) -> Option<Step> {
    if names_equal(graph.node(parent).name(), &dependency.name) {
        return Some(Step::Placeholder(dependency.clone(), Disposition::Cycle));
    }

    let mut via = parent;
    for ancestor in graph.ancestors(parent) {
        let node = graph.node(ancestor);
        if names_equal(node.name(), &dependency.name) {
            return Some(Step::Placeholder(dependency.clone(), Disposition::Cycle));
        }

        let via_key = &graph.node(via).key;
        let nearer = node.item.as_ref().and_then(|item| {
            item.dependencies
                .iter()
                .filter(|side| *side != via_key)
                .find(|side| dependency.is_eclipsed_by(side))
        });
        if let Some(nearer) = nearer {
            return match (&nearer.version_range, &dependency.version_range) {
                (Some(near), Some(far)) if !VersionRange::is_greater_or_equal(near, far) => Some(
                    Step::Placeholder(dependency.clone(), Disposition::PotentiallyDowngraded),
                ),
                _ => {
                    tracing::trace!("{dependency} eclipsed by {nearer}");
                    None
                }
            };
        }
        via = ancestor;
    }

    if dependency.type_constraint.is_resolvable() {
        Some(Step::Resolve(dependency.clone()))
    } else {
        Some(Step::Unresolvable(dependency.clone()))
    }
}
