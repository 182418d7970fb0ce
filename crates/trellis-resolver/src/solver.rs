//! Combinatorial constraint solver for single install/uninstall/update actions.
//!
//! Given a target package and a flat pool of candidates, the solver picks
//! exactly one candidate per package id reachable from the target such that
//! every declared dependency range among the chosen packages holds. The
//! search is an explicit-stack depth-first backtrack over per-id shortlists
//! with forward checking. Each package id carries the intersection of every
//! range the chosen packages declare on it, and a candidate is pruned as soon
//! as that intersection leaves it no version. The search explores every
//! complete assignment, drops assignments whose packages depend on each other
//! in a loop and keeps the best remaining one according to [`Score`]. The
//! result comes back in install order, dependencies before dependents.
//!
//! An absent candidate is a placeholder meaning "no action needed for this
//! id". It satisfies any dependency on its id and declares nothing itself.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio_util::sync::CancellationToken;
use trellis_core::config::SolverConfig;
use trellis_core::dependency::{PackageDependency, PackageIdentity};
use trellis_core::library::name_key;
use trellis_core::version::{Version, VersionRange};
use trellis_util::errors::{TrellisError, TrellisResult};

use crate::diagnostics::{ConstraintSource, ResolutionFailure};

/// A candidate package for the solver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolverPackage {
    pub id: String,
    /// `None` only for absent placeholders.
    pub version: Option<Version>,
    pub dependencies: Vec<PackageDependency>,
    pub absent: bool,
}

impl ResolverPackage {
    pub fn new(
        id: impl Into<String>,
        version: Version,
        dependencies: Vec<PackageDependency>,
    ) -> Self {
        Self {
            id: id.into(),
            version: Some(version),
            dependencies,
            absent: false,
        }
    }

    /// The "nothing to do" placeholder for `id`.
    pub fn absent(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
            dependencies: Vec::new(),
            absent: true,
        }
    }

    /// Whether choosing this package meets `dependency`.
    pub fn satisfies(&self, dependency: &PackageDependency) -> bool {
        if self.absent {
            return true;
        }
        self.version
            .as_ref()
            .is_some_and(|v| dependency.is_satisfied_by(v))
    }

    /// Whether this package can be chosen while its id is limited to
    /// `allowed`; `None` means the declared ranges share no version.
    fn fits(&self, allowed: Option<&VersionRange>) -> bool {
        if self.absent {
            return true;
        }
        match (allowed, &self.version) {
            (Some(range), Some(version)) => range.satisfies(version),
            _ => false,
        }
    }

    fn key(&self) -> String {
        name_key(&self.id)
    }
}

impl fmt::Display for ResolverPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.version, self.absent) {
            (_, true) => write!(f, "{} (absent)", self.id),
            (Some(version), false) => write!(f, "{} {version}", self.id),
            (None, false) => f.write_str(&self.id),
        }
    }
}

/// Search limits.
#[derive(Debug, Clone, Default)]
pub struct SolverOptions {
    /// Stop after this many search steps; unbounded when `None`.
    pub max_steps: Option<usize>,
}

impl From<&SolverConfig> for SolverOptions {
    fn from(config: &SolverConfig) -> Self {
        Self {
            max_steps: config.max_steps,
        }
    }
}

/// Quality of a complete solution. Smaller is better under [`Score::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Score {
    /// Non-absent choices, i.e. actual install or uninstall actions.
    changes: usize,
    /// Summed per-component distance to the installed versions.
    distance: (u64, u64, u64),
    /// Summed per-component versions of the chosen packages.
    version_sum: (u64, u64, u64),
}

impl Score {
    /// Fewer changes, then closer to the installed state, then newer.
    fn compare(&self, other: &Score) -> Ordering {
        self.changes
            .cmp(&other.changes)
            .then(self.distance.cmp(&other.distance))
            .then(other.version_sum.cmp(&self.version_sum))
    }
}

fn sum3((a, b, c): (u64, u64, u64), (x, y, z): (u64, u64, u64)) -> (u64, u64, u64) {
    (a.saturating_add(x), b.saturating_add(y), c.saturating_add(z))
}

/// Chosen pool indices in assignment order, plus a by-id lookup and the
/// narrowed range of every id the chosen packages depend on.
#[derive(Debug, Default)]
struct Assignment {
    order: Vec<usize>,
    by_id: HashMap<String, usize>,
    /// One entry per declaring package, innermost last; `None` once the
    /// ranges no longer intersect.
    ranges: HashMap<String, Vec<Option<VersionRange>>>,
}

impl Assignment {
    fn assign(&mut self, key: String, candidate: usize, package: &ResolverPackage) {
        for dependency in &package.dependencies {
            let dep_key = name_key(&dependency.id);
            let narrowed = narrow(self.allowed(&dep_key), dependency);
            self.ranges.entry(dep_key).or_default().push(narrowed);
        }
        self.order.push(candidate);
        self.by_id.insert(key, candidate);
    }

    fn unassign(&mut self, key: &str, package: &ResolverPackage) {
        for dependency in package.dependencies.iter().rev() {
            if let Some(stack) = self.ranges.get_mut(&name_key(&dependency.id)) {
                stack.pop();
            }
        }
        self.order.pop();
        self.by_id.remove(key);
    }

    fn get(&self, key: &str) -> Option<usize> {
        self.by_id.get(key).copied()
    }

    /// The range every chosen package allows for `key`.
    fn allowed(&self, key: &str) -> Option<VersionRange> {
        match self.ranges.get(key).and_then(|stack| stack.last()) {
            Some(range) => range.clone(),
            None => Some(VersionRange::all()),
        }
    }
}

fn narrow(allowed: Option<VersionRange>, dependency: &PackageDependency) -> Option<VersionRange> {
    let allowed = allowed?;
    match &dependency.version_range {
        Some(range) => allowed.intersect(range),
        None => Some(allowed),
    }
}

/// One decision point: the shortlist for an id and which entry is being tried.
#[derive(Debug)]
struct Frame {
    key: String,
    shortlist: Vec<usize>,
    cursor: usize,
}

/// Backtracking constraint solver.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    options: SolverOptions,
    installed: HashMap<String, Version>,
    cancel: CancellationToken,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: SolverOptions) -> Self {
        self.options = options;
        self
    }

    /// The currently installed versions, used to prefer the least disruptive solution.
    pub fn with_installed(mut self, installed: Vec<PackageIdentity>) -> Self {
        self.installed = installed
            .into_iter()
            .map(|p| (name_key(&p.id), p.version))
            .collect();
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Find the best consistent assignment for `target` and everything it
    /// needs, drawing from `candidates`. The solution holds one package per
    /// id in install order: every package comes after the packages it
    /// depends on, and ties go to the lower id.
    ///
    /// Returns [`TrellisError::NoSolution`] when no assignment exists or every
    /// assignment contains a dependency loop,
    /// [`TrellisError::InvalidInput`] for malformed input and
    /// [`TrellisError::Cancelled`] when the token fires mid-search.
    pub fn resolve(
        &self,
        target: &ResolverPackage,
        candidates: &[ResolverPackage],
    ) -> TrellisResult<Vec<ResolverPackage>> {
        validate(target, candidates)?;

        let target_key = target.key();
        let mut pool: Vec<&ResolverPackage> = vec![target];
        pool.extend(candidates.iter().filter(|c| c.key() != target_key));

        let mut search = Search {
            solver: self,
            pool: &pool,
            assignment: Assignment::default(),
            best: None,
            failure: None,
            cycle: None,
        };
        search.assignment.assign(target_key, 0, target);
        search.run()?;

        match search.best {
            Some((solution, _)) => Ok(install_order(
                solution.into_iter().map(|idx| pool[idx].clone()).collect(),
            )),
            None => match search.cycle {
                Some(cycle) => Err(circular_dependency(&cycle)),
                None => Err(search
                    .failure
                    .unwrap_or_else(|| ResolutionFailure {
                        id: target.id.clone(),
                        constraints: Vec::new(),
                        available: Vec::new(),
                    })
                    .into_error()),
            },
        }
    }
}

/// The first dependency loop among `solution`, as the packages along it with
/// the repeated package at both ends. Absent placeholders declare nothing and
/// never take part.
fn find_cycle<'p>(solution: &[&'p ResolverPackage]) -> Option<Vec<&'p ResolverPackage>> {
    let index: HashMap<String, usize> = solution
        .iter()
        .enumerate()
        .map(|(i, p)| (p.key(), i))
        .collect();
    let mut done = vec![false; solution.len()];

    for start in 0..solution.len() {
        if done[start] {
            continue;
        }
        // (package, next dependency to follow)
        let mut path: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some(top) = path.last_mut() {
            let (current, cursor) = *top;
            let package = solution[current];
            let next = if package.absent {
                None
            } else {
                package.dependencies.get(cursor)
            };
            let Some(dependency) = next else {
                done[current] = true;
                path.pop();
                continue;
            };
            top.1 += 1;

            let Some(&child) = index.get(&name_key(&dependency.id)) else {
                continue;
            };
            if done[child] {
                continue;
            }
            if let Some(pos) = path.iter().position(|&(idx, _)| idx == child) {
                let mut cycle: Vec<&ResolverPackage> =
                    path[pos..].iter().map(|&(idx, _)| solution[idx]).collect();
                cycle.push(solution[child]);
                return Some(cycle);
            }
            path.push((child, 0));
        }
    }
    None
}

fn circular_dependency(cycle: &[ResolverPackage]) -> TrellisError {
    let path = cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" => ");
    TrellisError::NoSolution {
        id: cycle.first().map(|p| p.id.clone()).unwrap_or_default(),
        message: format!("Circular dependency detected '{path}'."),
    }
}

/// Sort `solution` so each package follows everything it depends on. Among
/// packages that are ready at the same time the lower id goes first.
fn install_order(solution: Vec<ResolverPackage>) -> Vec<ResolverPackage> {
    let keys: Vec<String> = solution.iter().map(ResolverPackage::key).collect();
    let present: HashSet<&str> = keys.iter().map(String::as_str).collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order: Vec<usize> = Vec::with_capacity(solution.len());

    while order.len() < solution.len() {
        let ready = (0..solution.len())
            .filter(|&i| !placed.contains(keys[i].as_str()))
            .filter(|&i| {
                solution[i].dependencies.iter().all(|d| {
                    let key = name_key(&d.id);
                    key == keys[i]
                        || !present.contains(key.as_str())
                        || placed.contains(key.as_str())
                })
            })
            .min_by(|&a, &b| keys[a].cmp(&keys[b]));

        // Only a loop leaves nothing ready; the rest then follows by id.
        let next = ready.or_else(|| {
            (0..solution.len())
                .filter(|&i| !placed.contains(keys[i].as_str()))
                .min_by(|&a, &b| keys[a].cmp(&keys[b]))
        });
        let Some(next) = next else {
            break;
        };
        placed.insert(keys[next].as_str());
        order.push(next);
    }

    let mut slots: Vec<Option<ResolverPackage>> = solution.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}

fn validate(target: &ResolverPackage, candidates: &[ResolverPackage]) -> TrellisResult<()> {
    if target.id.trim().is_empty() {
        return Err(TrellisError::InvalidInput {
            message: "the target package has no id".to_string(),
        });
    }
    for package in std::iter::once(target).chain(candidates) {
        if package.id.trim().is_empty() {
            return Err(TrellisError::InvalidInput {
                message: "a candidate package has no id".to_string(),
            });
        }
        if !package.absent && package.version.is_none() {
            return Err(TrellisError::InvalidInput {
                message: format!("package '{}' has no version", package.id),
            });
        }
    }
    Ok(())
}

struct Search<'a> {
    solver: &'a Solver,
    pool: &'a [&'a ResolverPackage],
    assignment: Assignment,
    best: Option<(Vec<usize>, Score)>,
    failure: Option<ResolutionFailure>,
    /// The first loop seen in a complete assignment.
    cycle: Option<Vec<ResolverPackage>>,
}

impl<'a> Search<'a> {
    fn run(&mut self) -> TrellisResult<()> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut steps = 0usize;
        let mut descend = true;

        loop {
            if self.solver.cancel.is_cancelled() {
                return Err(TrellisError::Cancelled);
            }
            steps += 1;
            if self.solver.options.max_steps.is_some_and(|max| steps > max) {
                return self.stop_early(steps - 1);
            }

            if descend {
                match self.next_unassigned() {
                    None => {
                        self.record_solution();
                        descend = false;
                    }
                    Some(dependency) => match self.shortlist(&dependency.id) {
                        Ok(shortlist) => {
                            let key = name_key(&dependency.id);
                            let first = shortlist[0];
                            self.assignment.assign(key.clone(), first, self.pool[first]);
                            stack.push(Frame {
                                key,
                                shortlist,
                                cursor: 0,
                            });
                            continue;
                        }
                        Err(failure) => {
                            tracing::trace!("no candidates left for '{}'", failure.id);
                            self.failure.get_or_insert(failure);
                            descend = false;
                        }
                    },
                }
            }

            let Some(frame) = stack.last_mut() else {
                return Ok(());
            };
            let current = frame.shortlist[frame.cursor];
            self.assignment.unassign(&frame.key, self.pool[current]);
            frame.cursor += 1;
            if let Some(&next) = frame.shortlist.get(frame.cursor) {
                tracing::trace!("backtracking to {}", self.pool[next]);
                self.assignment.assign(frame.key.clone(), next, self.pool[next]);
                descend = true;
            } else {
                stack.pop();
            }
        }
    }

    fn stop_early(&self, steps: usize) -> TrellisResult<()> {
        if self.best.is_some() {
            tracing::warn!(
                "Solver stopped after {steps} steps; returning the best solution found so far"
            );
            return Ok(());
        }
        let target = self.pool[0];
        Err(TrellisError::NoSolution {
            id: target.id.clone(),
            message: format!("no solution found within {steps} search steps"),
        })
    }

    /// The first dependency of an assigned package whose id is still open,
    /// scanning packages in assignment order and dependencies in declaration order.
    fn next_unassigned(&self) -> Option<&'a PackageDependency> {
        let pool = self.pool;
        self.assignment
            .order
            .iter()
            .flat_map(|&idx| pool[idx].dependencies.iter())
            .find(|d| self.assignment.get(&name_key(&d.id)).is_none())
    }

    /// Dependencies declared by assigned packages on `key`, for diagnostics.
    fn constraints_on(&self, key: &str) -> Vec<(usize, &'a PackageDependency)> {
        let pool = self.pool;
        self.assignment
            .order
            .iter()
            .flat_map(|&idx| {
                pool[idx]
                    .dependencies
                    .iter()
                    .filter(|d| name_key(&d.id) == key)
                    .map(move |d| (idx, d))
            })
            .collect()
    }

    fn candidates_for(&self, key: &str) -> impl Iterator<Item = usize> + '_ {
        let key = key.to_string();
        (1..self.pool.len()).filter(move |&idx| self.pool[idx].key() == key)
    }

    /// Candidates for `id` inside its narrowed range that do not leave one of
    /// their own dependencies without options. Concrete versions come newest
    /// first, absent placeholders last.
    fn shortlist(&self, id: &str) -> Result<Vec<usize>, ResolutionFailure> {
        let key = name_key(id);
        let allowed = self.assignment.allowed(&key);
        let mut blocked: Option<ResolutionFailure> = None;

        let mut shortlist: Vec<usize> = self
            .candidates_for(&key)
            .filter(|&idx| self.pool[idx].fits(allowed.as_ref()))
            .filter(|&idx| match self.forward_check(idx) {
                Ok(()) => true,
                Err(failure) => {
                    blocked.get_or_insert(failure);
                    false
                }
            })
            .collect();

        if shortlist.is_empty() {
            return Err(
                blocked.unwrap_or_else(|| self.failure_for(id, &self.constraints_on(&key)))
            );
        }

        shortlist.sort_by(|&a, &b| {
            let (a, b) = (self.pool[a], self.pool[b]);
            match (a.absent, b.absent) {
                (false, true) => Ordering::Less,
                (true, false) => Ordering::Greater,
                _ => b.version.cmp(&a.version),
            }
        });
        Ok(shortlist)
    }

    /// Whether choosing `candidate` keeps each of its dependencies satisfiable.
    fn forward_check(&self, candidate: usize) -> Result<(), ResolutionFailure> {
        let package = self.pool[candidate];
        let own_key = package.key();

        for dependency in &package.dependencies {
            let key = name_key(&dependency.id);
            let ok = if key == own_key {
                package.satisfies(dependency)
            } else if let Some(chosen) = self.assignment.get(&key) {
                self.pool[chosen].satisfies(dependency)
            } else {
                let narrowed = narrow(self.assignment.allowed(&key), dependency);
                if narrowed.is_none() {
                    tracing::trace!("ranges on '{}' no longer intersect", dependency.id);
                }
                self.candidates_for(&key)
                    .any(|idx| self.pool[idx].fits(narrowed.as_ref()))
            };

            if !ok {
                let mut constraints = self.constraints_on(&key);
                constraints.push((candidate, dependency));
                return Err(self.failure_for(&dependency.id, &constraints));
            }
        }
        Ok(())
    }

    fn failure_for(
        &self,
        id: &str,
        constraints: &[(usize, &PackageDependency)],
    ) -> ResolutionFailure {
        let key = name_key(id);
        let mut available: Vec<Version> = self
            .candidates_for(&key)
            .filter_map(|idx| self.pool[idx].version.clone())
            .collect();
        available.sort();
        available.dedup();

        ResolutionFailure {
            id: id.to_string(),
            constraints: constraints
                .iter()
                .map(|(idx, d)| ConstraintSource {
                    package: self.pool[*idx].to_string(),
                    dependency: (*d).clone(),
                })
                .collect(),
            available,
        }
    }

    fn score(&self) -> Score {
        let mut score = Score {
            changes: 0,
            distance: (0, 0, 0),
            version_sum: (0, 0, 0),
        };
        for &idx in &self.assignment.order {
            let package = self.pool[idx];
            let Some(version) = package.version.as_ref().filter(|_| !package.absent) else {
                continue;
            };
            score.changes += 1;
            if let Some(installed) = self.solver.installed.get(&package.key()) {
                score.distance = sum3(score.distance, version.distance(installed));
            }
            score.version_sum = sum3(
                score.version_sum,
                (version.major(), version.minor(), version.patch()),
            );
        }
        score
    }

    fn record_solution(&mut self) {
        let chosen: Vec<&ResolverPackage> =
            self.assignment.order.iter().map(|&idx| self.pool[idx]).collect();
        if let Some(cycle) = find_cycle(&chosen) {
            tracing::debug!("solution dropped, dependency loop through '{}'", cycle[0].id);
            self.cycle
                .get_or_insert_with(|| cycle.into_iter().cloned().collect());
            return;
        }

        let score = self.score();
        let better = match &self.best {
            Some((_, best)) => score.compare(best) == Ordering::Less,
            None => true,
        };
        tracing::debug!(
            "solution found ({} changes){}",
            score.changes,
            if better { ", new best" } else { "" }
        );
        if better {
            self.best = Some((self.assignment.order.clone(), score));
        }
    }
}
