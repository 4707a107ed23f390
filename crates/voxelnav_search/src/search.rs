//! The search state machine shared by every [`SearchPolicy`].
//!
//! A search moves through `Created → Prepared → Searching → {Completed | Failed}`.
//! [`Search::step`] expands nodes until the policy terminates or the deadline passes,
//! so a search can be spread over many frames without losing its open set.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, hash_map::Entry},
    fmt,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering as AtomicOrdering},
    },
    time::Instant,
};

use glam::{IVec3, Vec3A};
use rand::{Rng as _, SeedableRng as _};
use rand_chacha::ChaCha8Rng;
use voxelnav::{
    NodeId,
    graph::{to_fixed, to_world},
};

use crate::{
    FloodField, PathResult, SearchError, SearchGraph, SearchOptions, SearchOutput, SearchPolicy,
    flood::FloodEntry, graph::centerline,
};

static NEXT_SEARCH_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a [`Search`]. Unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchId(pub(crate) u64);

impl SearchId {
    fn next() -> Self {
        Self(NEXT_SEARCH_ID.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a [`Search`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// Waiting for [`Search::prepare`].
    Created,
    /// The start and end nodes are known, no node has been expanded yet.
    Prepared,
    /// Nodes are being expanded.
    Searching,
    /// The search produced a [`SearchOutput`].
    Completed,
    /// The search failed or was aborted.
    Failed,
}

impl SearchState {
    /// Whether the search has stopped for good.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// What [`Search::step`] did.
#[derive(Debug, Clone)]
pub enum Step<N> {
    /// The deadline passed before the search finished. Call [`Search::step`] again.
    Continue,
    /// The search finished.
    Completed(SearchOutput<N>),
    /// The search failed.
    Failed(SearchError),
}

impl<N> Step<N> {
    /// Whether the search has stopped for good.
    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::Continue)
    }

    /// Converts a finished step into its result.
    pub fn into_result(self) -> Option<Result<SearchOutput<N>, SearchError>> {
        match self {
            Self::Continue => None,
            Self::Completed(output) => Some(Ok(output)),
            Self::Failed(error) => Some(Err(error)),
        }
    }
}

/// An entry of the open set.
///
/// Entries are never updated in place. A cheaper route to a node pushes a new entry,
/// and the stale one is skipped when popped.
#[derive(Debug)]
struct OpenEntry<N> {
    node: N,
    g: u32,
    f: i64,
    sequence: u64,
}

impl<N> PartialEq for OpenEntry<N> {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.sequence == other.sequence
    }
}

impl<N> Eq for OpenEntry<N> {}

impl<N> PartialOrd for OpenEntry<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for OpenEntry<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap, earlier entries win ties.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Per node scratch data, owned by a single search.
#[derive(Debug, Clone, Copy)]
struct NodeRun<N> {
    parent: Option<N>,
    g: u32,
    closed: bool,
}

/// A resumable best-first search over a [`SearchGraph`].
#[derive(Debug)]
pub struct Search<N = NodeId> {
    id: SearchId,
    policy: SearchPolicy<N>,
    options: SearchOptions,
    state: SearchState,
    outcome: Option<Result<SearchOutput<N>, SearchError>>,
    run: HashMap<N, NodeRun<N>>,
    open: BinaryHeap<OpenEntry<N>>,
    sequence: u64,
    discovered: Vec<(N, u32)>,
    start: Option<N>,
    end: Option<N>,
    target: IVec3,
    heuristic_scale: f32,
    candidate: Option<N>,
    farthest: Option<(u32, N)>,
    expanded: usize,
    rng: ChaCha8Rng,
}

impl<N: Copy + Eq + Hash + fmt::Debug> Search<N> {
    /// Creates a search. Nothing happens until [`Search::prepare`].
    pub fn new(policy: SearchPolicy<N>, options: SearchOptions) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(options.seed);
        Self {
            id: SearchId::next(),
            policy,
            options,
            state: SearchState::Created,
            outcome: None,
            run: HashMap::new(),
            open: BinaryHeap::new(),
            sequence: 0,
            discovered: Vec::new(),
            start: None,
            end: None,
            target: IVec3::ZERO,
            heuristic_scale: 0.0,
            candidate: None,
            farthest: None,
            expanded: 0,
            rng,
        }
    }

    /// The id of this search.
    pub fn id(&self) -> SearchId {
        self.id
    }

    /// The policy this search follows.
    pub fn policy(&self) -> &SearchPolicy<N> {
        &self.policy
    }

    /// The options this search was created with.
    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// The current state.
    pub fn state(&self) -> SearchState {
        self.state
    }

    /// The node the search started from, once prepared.
    pub fn start_node(&self) -> Option<N> {
        self.start
    }

    /// The node a [`SearchPolicy::Shortest`] search is heading for, once prepared.
    pub fn end_node(&self) -> Option<N> {
        self.end
    }

    /// How many nodes have been expanded so far.
    pub fn expanded(&self) -> usize {
        self.expanded
    }

    /// The result, once the search has finished.
    pub fn outcome(&self) -> Option<&Result<SearchOutput<N>, SearchError>> {
        self.outcome.as_ref()
    }

    /// Resolves the start and end points to nodes.
    ///
    /// On error the search moves straight to [`SearchState::Failed`].
    /// Preparing an already prepared search does nothing.
    pub fn prepare<G>(&mut self, graph: &G) -> Result<(), SearchError>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        if self.state != SearchState::Created {
            return match &self.outcome {
                Some(Err(error)) => Err(*error),
                _ => Ok(()),
            };
        }
        let _span = tracing::debug_span!("prepare_search", id = %self.id, policy = self.policy.name()).entered();
        match self.resolve(graph) {
            Ok(()) => {
                self.state = SearchState::Prepared;
                Ok(())
            }
            Err(error) => {
                self.finish(Err(error));
                Err(error)
            }
        }
    }

    fn resolve<G>(&mut self, graph: &G) -> Result<(), SearchError>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        let start_point = self.policy.start();
        if let SearchPolicy::FloodTrace { flood, .. } = &self.policy {
            check_generation(flood, graph)?;
            // Any node the flood reached will do, walkable or not.
            self.start = Some(graph.nearest(start_point, false).ok_or(SearchError::NoStartNode)?);
            return Ok(());
        }

        let start = graph
            .nearest(start_point, false)
            .ok_or(SearchError::NoStartNode)?;
        if !graph.is_walkable(start) {
            return Err(SearchError::StartNotWalkable);
        }
        let start_position = graph.position(start).ok_or(SearchError::NoStartNode)?;
        self.start = Some(start);

        match &self.policy {
            SearchPolicy::Shortest { end, .. } => {
                let end = graph.nearest(*end, true).ok_or(SearchError::NoEndNode)?;
                self.target = graph.position(end).ok_or(SearchError::NoEndNode)?;
                self.end = Some(end);
                self.heuristic_scale = self.options.heuristic_scale;
            }
            SearchPolicy::Random {
                aim, aim_strength, ..
            } => {
                self.target = aim.map_or(start_position, to_fixed);
                self.heuristic_scale = if aim.is_some() { *aim_strength } else { 0.0 };
            }
            SearchPolicy::Flee {
                avoid,
                flee_strength,
                ..
            } => {
                self.target = to_fixed(*avoid);
                self.heuristic_scale = -flee_strength;
            }
            SearchPolicy::Flood { .. } | SearchPolicy::FloodTrace { .. } => {
                self.heuristic_scale = 0.0;
            }
        }
        Ok(())
    }

    /// Advances the search until it finishes or `deadline` passes.
    ///
    /// The clock is only read every [`SearchOptions::expansions_per_time_check`] expansions,
    /// so a step can overrun the deadline by that much work. Stepping a finished search
    /// returns its result again.
    pub fn step<G>(&mut self, graph: &G, deadline: Instant) -> Step<N>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        match self.state {
            SearchState::Created => return Step::Failed(SearchError::NotPrepared),
            SearchState::Completed | SearchState::Failed => return self.finished_step(),
            SearchState::Prepared => {
                if let Some(result) = self.seed(graph) {
                    return self.finish(result);
                }
            }
            SearchState::Searching => {}
        }

        let result = if let SearchPolicy::FloodTrace { start, flood } = &self.policy {
            let (start, flood) = (*start, Arc::clone(flood));
            self.trace_flood(graph, &flood, start)
        } else {
            match self.expand_until(graph, deadline) {
                Some(result) => result,
                None => {
                    tracing::trace!(id = %self.id, expanded = self.expanded, open = self.open.len(), "Search yielded");
                    return Step::Continue;
                }
            }
        };
        self.finish(result)
    }

    /// Stops the search. Its scratch data is dropped and it fails with [`SearchError::Aborted`].
    pub fn abort(&mut self) {
        if self.state.is_finished() {
            return;
        }
        self.finish(Err(SearchError::Aborted));
    }

    /// Seeds the open set with the start node. Returns a result if the search is already over.
    fn seed<G>(&mut self, graph: &G) -> Option<Result<SearchOutput<N>, SearchError>>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        self.state = SearchState::Searching;
        let Some(start) = self.start else {
            return Some(Err(SearchError::NotPrepared));
        };
        if matches!(self.policy, SearchPolicy::FloodTrace { .. }) {
            return None;
        }
        self.run.insert(
            start,
            NodeRun {
                parent: None,
                g: 0,
                closed: false,
            },
        );
        self.farthest = Some((0, start));
        if let SearchPolicy::Random { length: 0, .. } | SearchPolicy::Flee { length: 0, .. } = self.policy {
            return Some(self.path_to(graph, start));
        }
        self.push(graph, start, 0);
        None
    }

    /// Pops and expands nodes. `None` means the search yielded.
    fn expand_until<G>(&mut self, graph: &G, deadline: Instant) -> Option<Result<SearchOutput<N>, SearchError>>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        let mut since_time_check = 0;
        let mut this_step = 0;
        loop {
            let Some(entry) = self.open.pop() else {
                return Some(self.exhausted(graph));
            };
            let Some(run) = self.run.get_mut(&entry.node) else {
                continue;
            };
            if run.closed || entry.g > run.g {
                continue;
            }
            run.closed = true;
            self.expanded += 1;
            let (node, g) = (entry.node, entry.g);

            match self.policy {
                SearchPolicy::Shortest { .. } if self.end == Some(node) => {
                    return Some(self.path_to(graph, node));
                }
                SearchPolicy::Random { length, spread, .. } | SearchPolicy::Flee { length, spread, .. } => {
                    if g >= length.saturating_add(spread) {
                        let end = self.candidate.unwrap_or(node);
                        return Some(self.path_to(graph, end));
                    }
                    if g >= length {
                        let replace_chance = self.options.replace_chance.clamp(0.0, 1.0);
                        if self.candidate.is_none() || self.rng.gen_bool(replace_chance) {
                            self.candidate = Some(node);
                        }
                    } else if self.farthest.is_none_or(|(farthest, _)| g > farthest) {
                        self.farthest = Some((g, node));
                    }
                }
                _ => {}
            }

            self.expand(graph, node, g);

            this_step += 1;
            since_time_check += 1;
            if self
                .options
                .max_expansions_per_step
                .is_some_and(|max| this_step >= max)
            {
                return None;
            }
            if since_time_check >= self.options.expansions_per_time_check.max(1) {
                since_time_check = 0;
                if Instant::now() >= deadline {
                    return None;
                }
            }
        }
    }

    fn expand<G>(&mut self, graph: &G, node: N, g: u32)
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        let blocked_tags = self.options.blocked_tags;
        let mut discovered = std::mem::take(&mut self.discovered);
        discovered.clear();
        graph.for_each_neighbor(node, &mut |neighbor, cost| {
            if graph.is_walkable(neighbor) && graph.tags(neighbor) & blocked_tags == 0 {
                let neighbor_g = g.saturating_add(cost).saturating_add(graph.penalty(neighbor));
                discovered.push((neighbor, neighbor_g));
            }
        });

        for &(neighbor, neighbor_g) in &discovered {
            match self.run.entry(neighbor) {
                Entry::Occupied(mut entry) => {
                    let run = entry.get_mut();
                    if run.closed || neighbor_g >= run.g {
                        continue;
                    }
                    run.g = neighbor_g;
                    run.parent = Some(node);
                }
                Entry::Vacant(entry) => {
                    entry.insert(NodeRun {
                        parent: Some(node),
                        g: neighbor_g,
                        closed: false,
                    });
                }
            }
            self.push(graph, neighbor, neighbor_g);
        }
        self.discovered = discovered;
    }

    fn push<G>(&mut self, graph: &G, node: N, g: u32)
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        let h = if self.heuristic_scale == 0.0 {
            0
        } else {
            graph.position(node).map_or(0, |position| {
                let distance = position.as_vec3a().distance(self.target.as_vec3a());
                (distance * self.heuristic_scale).floor() as i64
            })
        };
        self.sequence += 1;
        self.open.push(OpenEntry {
            node,
            g,
            f: g as i64 + h,
            sequence: self.sequence,
        });
    }

    /// The open set ran empty.
    fn exhausted<G>(&mut self, graph: &G) -> Result<SearchOutput<N>, SearchError>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        match &self.policy {
            SearchPolicy::Shortest { .. } | SearchPolicy::FloodTrace { .. } => Err(SearchError::NoPath),
            SearchPolicy::Random { .. } | SearchPolicy::Flee { .. } => {
                let end = self
                    .candidate
                    .or(self.farthest.map(|(_, node)| node))
                    .ok_or(SearchError::NoPath)?;
                self.path_to(graph, end)
            }
            SearchPolicy::Flood { start } => {
                let origin = self.start.ok_or(SearchError::NotPrepared)?;
                let entries = self
                    .run
                    .iter()
                    .map(|(node, run)| {
                        (
                            *node,
                            FloodEntry {
                                parent: run.parent,
                                cost: run.g,
                            },
                        )
                    })
                    .collect();
                let flood = FloodField::new(origin, *start, self.id, graph.generation(), entries);
                Ok(SearchOutput::Flood(Arc::new(flood)))
            }
        }
    }

    /// Builds the path from the start to `end` out of the parent links.
    fn path_to<G>(&self, graph: &G, end: N) -> Result<SearchOutput<N>, SearchError>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        let mut nodes = vec![end];
        let mut current = end;
        while let Some(parent) = self.run.get(&current).and_then(|run| run.parent) {
            if nodes.len() > self.options.max_trace_hops {
                return Err(SearchError::TraceOverflow(self.options.max_trace_hops));
            }
            nodes.push(parent);
            current = parent;
        }
        nodes.reverse();

        let start_point = self.policy.start();
        let end_point = match &self.policy {
            SearchPolicy::Shortest { end, .. } => *end,
            _ => graph.position(end).map_or(start_point, to_world),
        };
        Ok(SearchOutput::Path(PathResult {
            positions: self.positions(graph, &nodes, start_point, end_point),
            cost: self.run.get(&end).map_or(0, |run| run.g),
            expanded: self.expanded,
            nodes,
        }))
    }

    fn trace_flood<G>(&self, graph: &G, flood: &FloodField<N>, start_point: Vec3A) -> Result<SearchOutput<N>, SearchError>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        check_generation(flood, graph)?;
        let start = self.start.ok_or(SearchError::NotPrepared)?;
        let nodes = flood.trace(start, self.options.max_trace_hops)?;
        Ok(SearchOutput::Path(PathResult {
            positions: self.positions(graph, &nodes, start_point, flood.origin_point()),
            cost: flood.cost(start).unwrap_or_default(),
            expanded: 0,
            nodes,
        }))
    }

    fn positions<G>(&self, graph: &G, nodes: &[N], start: Vec3A, end: Vec3A) -> Vec<Vec3A>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        if self.options.smooth {
            graph.smooth_path(nodes, start, end)
        } else {
            centerline(graph, nodes, start, end)
        }
    }

    fn finish(&mut self, result: Result<SearchOutput<N>, SearchError>) -> Step<N> {
        self.open = BinaryHeap::new();
        self.run = HashMap::new();
        match &result {
            Ok(output) => {
                self.state = SearchState::Completed;
                let nodes = output.path().map_or(0, |path| path.nodes.len());
                tracing::debug!(id = %self.id, policy = self.policy.name(), expanded = self.expanded, nodes, "Search completed");
            }
            Err(error) => {
                self.state = SearchState::Failed;
                tracing::debug!(id = %self.id, policy = self.policy.name(), %error, "Search failed");
            }
        }
        self.outcome = Some(result);
        self.finished_step()
    }

    fn finished_step(&self) -> Step<N> {
        match &self.outcome {
            Some(Ok(output)) => Step::Completed(output.clone()),
            Some(Err(error)) => Step::Failed(*error),
            None => Step::Failed(SearchError::NotPrepared),
        }
    }
}

fn check_generation<N, G>(flood: &FloodField<N>, graph: &G) -> Result<(), SearchError>
where
    N: Copy + Eq + Hash,
    G: SearchGraph + ?Sized,
{
    if flood.generation() == graph.generation() {
        Ok(())
    } else {
        Err(SearchError::StaleFlood {
            flood: flood.generation(),
            graph: graph.generation(),
        })
    }
}

/// Runs `search` to completion without yielding.
pub fn run_to_completion<N, G>(search: &mut Search<N>, graph: &G) -> Result<SearchOutput<N>, SearchError>
where
    N: Copy + Eq + Hash + fmt::Debug,
    G: SearchGraph<Node = N> + ?Sized,
{
    search.prepare(graph)?;
    loop {
        let deadline = Instant::now() + std::time::Duration::from_secs(3600);
        if let Some(result) = search.step(graph, deadline).into_result() {
            return result;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::graph::tests::Grid;

    fn run(graph: &Grid, policy: SearchPolicy<u32>, options: SearchOptions) -> Result<PathResult<u32>, SearchError> {
        let mut search = Search::new(policy, options);
        run_to_completion(&mut search, graph).map(|output| output.into_path().unwrap())
    }

    fn shortest(graph: &Grid, from: (i32, i32), to: (i32, i32)) -> Result<PathResult<u32>, SearchError> {
        let policy = SearchPolicy::Shortest {
            start: graph.point(from.0, from.1),
            end: graph.point(to.0, to.1),
        };
        run(graph, policy, SearchOptions::default())
    }

    #[test]
    fn shortest_path_crosses_an_open_grid() {
        let grid = Grid::new(5, 5, 1000);
        let path = shortest(&grid, (0, 0), (4, 4)).unwrap();
        assert_eq!(path.cost, 8000);
        assert_eq!(path.nodes.len(), 9);
        assert_eq!(path.nodes.first(), Some(&grid.id(0, 0)));
        assert_eq!(path.end(), Some(&grid.id(4, 4)));
        assert_eq!(path.positions.len(), 11);
        approx::assert_relative_eq!(path.length(), 8.0);
    }

    #[test]
    fn walls_force_a_detour() {
        let mut grid = Grid::new(5, 5, 1000);
        for z in 0..4 {
            grid.block(2, z);
        }
        let path = shortest(&grid, (0, 0), (4, 0)).unwrap();
        assert_eq!(path.cost, 12000);
        assert!(path.nodes.contains(&grid.id(2, 4)));
    }

    #[test]
    fn shortest_path_is_idempotent() {
        let mut grid = Grid::new(8, 8, 1000);
        grid.block(3, 3);
        grid.block(4, 4);
        let first = shortest(&grid, (0, 1), (7, 6)).unwrap();
        let second = shortest(&grid, (0, 1), (7, 6)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn sealed_off_end_has_no_path() {
        let mut grid = Grid::new(5, 5, 1000);
        for z in 0..5 {
            grid.block(2, z);
        }
        assert_eq!(shortest(&grid, (0, 0), (4, 4)), Err(SearchError::NoPath));
    }

    #[test]
    fn blocked_start_is_not_walkable() {
        let mut grid = Grid::new(3, 3, 1000);
        grid.block(0, 0);
        let mut search = Search::new(
            SearchPolicy::Shortest {
                start: grid.point(0, 0),
                end: grid.point(2, 2),
            },
            SearchOptions::default(),
        );
        assert_eq!(search.prepare(&grid), Err(SearchError::StartNotWalkable));
        assert_eq!(search.state(), SearchState::Failed);
        assert!(matches!(
            search.step(&grid, Instant::now()),
            Step::Failed(SearchError::StartNotWalkable)
        ));
    }

    #[test]
    fn empty_graph_has_no_start_node() {
        let grid = Grid::new(0, 0, 1000);
        let mut search = Search::new(SearchPolicy::Flood { start: Vec3A::ZERO }, SearchOptions::default());
        assert_eq!(search.prepare(&grid), Err(SearchError::NoStartNode));
    }

    #[test]
    fn penalties_and_tags_are_avoided() {
        let mut grid = Grid::new(3, 2, 1000);
        // Going straight along z = 0 is cheaper unless the middle cell is penalized or tagged.
        let straight = shortest(&grid, (0, 0), (2, 0)).unwrap();
        assert_eq!(straight.cost, 2000);

        grid.penalties.insert(grid.id(1, 0), 5000);
        let around = shortest(&grid, (0, 0), (2, 0)).unwrap();
        assert_eq!(around.cost, 4000);
        assert!(around.nodes.contains(&grid.id(1, 1)));

        grid.penalties.clear();
        grid.tags.insert(grid.id(1, 0), 0b10);
        let policy = SearchPolicy::Shortest {
            start: grid.point(0, 0),
            end: grid.point(2, 0),
        };
        let tagged = run(&grid, policy, SearchOptions::default().with_blocked_tags(0b10)).unwrap();
        assert_eq!(tagged.cost, 4000);
    }

    #[test]
    fn random_path_falls_back_to_the_farthest_node() {
        // Five nodes ten units apart, 40 in total, never reaching the requested length.
        let grid = Grid::line(5, 10);
        let policy = SearchPolicy::Random {
            start: grid.point(0, 0),
            length: 50,
            spread: 100,
            aim: None,
            aim_strength: 0.0,
        };
        let path = run(&grid, policy, SearchOptions::default()).unwrap();
        assert_eq!(path.end(), Some(&4));
        assert_eq!(path.cost, 40);
        assert_eq!(path.nodes, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn random_path_ends_within_the_spread() {
        let grid = Grid::new(30, 30, 10);
        for seed in 0..8 {
            let policy = SearchPolicy::Random {
                start: grid.point(15, 15),
                length: 50,
                spread: 30,
                aim: None,
                aim_strength: 0.0,
            };
            let options = SearchOptions::default().with_seed(seed);
            let path = run(&grid, policy.clone(), options.clone()).unwrap();
            assert!((50..80).contains(&path.cost), "cost {}", path.cost);
            assert_eq!(run(&grid, policy, options).unwrap(), path);
        }
    }

    #[test]
    fn zero_length_random_path_is_the_start() {
        let grid = Grid::line(5, 10);
        let path = run(&grid, SearchPolicy::random(grid.point(2, 0), 0), SearchOptions::default()).unwrap();
        assert_eq!(path.nodes, vec![2]);
        assert_eq!(path.cost, 0);
    }

    #[test]
    fn flee_path_heads_away() {
        let grid = Grid::line(21, 10);
        let policy = SearchPolicy::Flee {
            start: grid.point(10, 0),
            avoid: grid.point(15, 0),
            length: 50,
            spread: 10,
            flee_strength: 2.0,
        };
        let path = run(&grid, policy, SearchOptions::default()).unwrap();
        assert_eq!(path.end(), Some(&5));
        assert_eq!(path.cost, 50);
    }

    #[test]
    fn sliced_search_matches_a_single_step() {
        let mut grid = Grid::new(10, 10, 1000);
        for z in 1..10 {
            grid.block(5, z);
        }
        let policy = SearchPolicy::Shortest {
            start: grid.point(0, 9),
            end: grid.point(9, 9),
        };
        let whole = run(&grid, policy.clone(), SearchOptions::default()).unwrap();

        let mut search = Search::new(policy, SearchOptions::default().with_max_expansions_per_step(3));
        search.prepare(&grid).unwrap();
        let deadline = Instant::now() + Duration::from_secs(60);
        let mut steps = 0;
        let sliced = loop {
            steps += 1;
            match search.step(&grid, deadline) {
                Step::Continue => assert_eq!(search.state(), SearchState::Searching),
                Step::Completed(output) => break output.into_path().unwrap(),
                Step::Failed(error) => panic!("{error}"),
            }
        };
        assert!(steps > 5);
        assert_eq!(sliced.nodes, whole.nodes);
        assert_eq!(sliced.cost, whole.cost);
    }

    #[test]
    fn passed_deadline_still_makes_progress() {
        let grid = Grid::new(6, 6, 1000);
        let mut options = SearchOptions::default();
        options.expansions_per_time_check = 1;
        let mut search = Search::new(
            SearchPolicy::Shortest {
                start: grid.point(0, 0),
                end: grid.point(5, 5),
            },
            options,
        );
        search.prepare(&grid).unwrap();
        let past = Instant::now();
        let mut steps = 0;
        while !search.step(&grid, past).is_finished() {
            steps += 1;
            assert_eq!(search.expanded(), steps);
        }
        assert_eq!(search.state(), SearchState::Completed);
    }

    #[test]
    fn step_before_prepare_fails() {
        let grid = Grid::new(2, 2, 1000);
        let mut search = Search::new(SearchPolicy::Flood { start: Vec3A::ZERO }, SearchOptions::default());
        assert!(matches!(
            search.step(&grid, Instant::now()),
            Step::Failed(SearchError::NotPrepared)
        ));
        assert_eq!(search.state(), SearchState::Created);
    }

    #[test]
    fn aborted_search_stays_aborted() {
        let grid = Grid::new(10, 10, 1000);
        let mut search = Search::new(
            SearchPolicy::Shortest {
                start: grid.point(0, 0),
                end: grid.point(9, 9),
            },
            SearchOptions::default().with_max_expansions_per_step(1),
        );
        search.prepare(&grid).unwrap();
        assert!(matches!(search.step(&grid, Instant::now()), Step::Continue));
        search.abort();
        assert_eq!(search.state(), SearchState::Failed);
        assert!(matches!(
            search.step(&grid, Instant::now()),
            Step::Failed(SearchError::Aborted)
        ));
    }

    #[test]
    fn flood_trace_follows_the_flood() {
        let mut grid = Grid::new(6, 6, 1000);
        grid.block(2, 2);
        grid.block(3, 2);
        let mut flood_search = Search::new(SearchPolicy::Flood { start: grid.point(0, 0) }, SearchOptions::default());
        let output = run_to_completion(&mut flood_search, &grid).unwrap();
        let flood = Arc::clone(output.flood().unwrap());
        assert_eq!(flood.len(), 34);
        assert_eq!(flood.search(), flood_search.id());

        let policy = SearchPolicy::FloodTrace {
            start: grid.point(4, 5),
            flood: Arc::clone(&flood),
        };
        let path = run(&grid, policy, SearchOptions::default()).unwrap();
        assert_eq!(path.nodes.first(), Some(&grid.id(4, 5)));
        assert_eq!(path.end(), Some(&grid.id(0, 0)));
        assert_eq!(path.cost, 9000);
        assert_eq!(path.expanded, 0);
        for pair in path.nodes.windows(2) {
            assert_eq!(flood.parent(pair[0]), Some(pair[1]));
            assert!(flood.cost(pair[0]) > flood.cost(pair[1]));
        }
    }

    #[test]
    fn flood_trace_cost_grows_with_distance() {
        let grid = Grid::new(9, 9, 1000);
        let output = run_to_completion(
            &mut Search::new(SearchPolicy::Flood { start: grid.point(0, 4) }, SearchOptions::default()),
            &grid,
        )
        .unwrap();
        let flood = Arc::clone(output.flood().unwrap());

        // Rays leaving the origin straight and diagonally.
        for (dx, dz) in [(1, 0), (1, 1), (1, -1), (0, 1), (2, 1)] {
            let mut last = 0;
            for step in 1.. {
                let (x, z) = (dx * step, 4 + dz * step);
                if !(0..9).contains(&x) || !(0..9).contains(&z) {
                    break;
                }
                let policy = SearchPolicy::FloodTrace {
                    start: grid.point(x, z),
                    flood: Arc::clone(&flood),
                };
                let path = run(&grid, policy, SearchOptions::default()).unwrap();
                assert!(path.cost >= last, "cost dropped at ({x}, {z})");
                assert_eq!(path.cost, flood.cost(grid.id(x, z)).unwrap());
                last = path.cost;
            }
        }
    }

    #[test]
    fn flood_trace_detects_a_changed_graph() {
        let mut grid = Grid::new(4, 4, 1000);
        let output = run_to_completion(
            &mut Search::new(SearchPolicy::Flood { start: grid.point(0, 0) }, SearchOptions::default()),
            &grid,
        )
        .unwrap();
        let flood = Arc::clone(output.flood().unwrap());
        grid.generation += 1;
        let policy = SearchPolicy::FloodTrace {
            start: grid.point(3, 3),
            flood,
        };
        assert_eq!(
            run(&grid, policy, SearchOptions::default()),
            Err(SearchError::StaleFlood { flood: 0, graph: 1 })
        );
    }

    #[test]
    fn flood_trace_from_an_unreached_node_has_no_path() {
        let mut grid = Grid::new(5, 3, 1000);
        for z in 0..3 {
            grid.block(2, z);
        }
        let output = run_to_completion(
            &mut Search::new(SearchPolicy::Flood { start: grid.point(0, 0) }, SearchOptions::default()),
            &grid,
        )
        .unwrap();
        let flood = Arc::clone(output.flood().unwrap());
        assert_eq!(flood.len(), 6);
        let policy = SearchPolicy::FloodTrace {
            start: grid.point(4, 1),
            flood,
        };
        assert_eq!(run(&grid, policy, SearchOptions::default()), Err(SearchError::NoPath));
    }
}
