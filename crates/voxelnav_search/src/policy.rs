use std::sync::Arc;

use glam::Vec3A;

use crate::FloodField;

/// What a [`Search`](crate::Search) looks for and when it stops.
#[derive(Debug, Clone)]
pub enum SearchPolicy<N> {
    /// The cheapest path from `start` to `end`.
    Shortest {
        /// Where the path starts.
        start: Vec3A,
        /// Where the path should end.
        end: Vec3A,
    },
    /// A path of roughly `length` cost in a random direction.
    ///
    /// Ends at a node whose cost lies in `length..length + spread`.
    /// If no node is that far away, ends at the most expensive node reached.
    Random {
        /// Where the path starts.
        start: Vec3A,
        /// The minimum cost of the path.
        length: u32,
        /// How much more than `length` the path may cost.
        spread: u32,
        /// A point to steer towards.
        aim: Option<Vec3A>,
        /// How strongly [`SearchPolicy::Random::aim`] is followed. `0.0` ignores it.
        aim_strength: f32,
    },
    /// Like [`SearchPolicy::Random`], but biased away from `avoid`.
    Flee {
        /// Where the path starts.
        start: Vec3A,
        /// The point to get away from.
        avoid: Vec3A,
        /// The minimum cost of the path.
        length: u32,
        /// How much more than `length` the path may cost.
        spread: u32,
        /// How strongly paths leading away from `avoid` are preferred.
        flee_strength: f32,
    },
    /// Reaches every node reachable from `start` and stores how to get back.
    ///
    /// Completes with a [`FloodField`] for [`SearchPolicy::FloodTrace`].
    Flood {
        /// The origin of the flood.
        start: Vec3A,
    },
    /// The path from `start` back to the origin of a finished flood. Does not expand any nodes.
    FloodTrace {
        /// Where the path starts.
        start: Vec3A,
        /// The flood to follow.
        flood: Arc<FloodField<N>>,
    },
}

/// The default spread of random and flee paths, five world units.
pub const DEFAULT_SPREAD: u32 = 5000;

/// The default flee strength.
pub const DEFAULT_FLEE_STRENGTH: f32 = 2.0;

impl<N> SearchPolicy<N> {
    /// A random path with the default spread and no aim.
    pub fn random(start: Vec3A, length: u32) -> Self {
        Self::Random {
            start,
            length,
            spread: DEFAULT_SPREAD,
            aim: None,
            aim_strength: 0.0,
        }
    }

    /// A flee path with the default spread and strength.
    pub fn flee(start: Vec3A, avoid: Vec3A, length: u32) -> Self {
        Self::Flee {
            start,
            avoid,
            length,
            spread: DEFAULT_SPREAD,
            flee_strength: DEFAULT_FLEE_STRENGTH,
        }
    }

    /// The point the search starts from.
    pub fn start(&self) -> Vec3A {
        match self {
            Self::Shortest { start, .. }
            | Self::Random { start, .. }
            | Self::Flee { start, .. }
            | Self::Flood { start }
            | Self::FloodTrace { start, .. } => *start,
        }
    }

    /// A short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shortest { .. } => "shortest",
            Self::Random { .. } => "random",
            Self::Flee { .. } => "flee",
            Self::Flood { .. } => "flood",
            Self::FloodTrace { .. } => "flood_trace",
        }
    }
}

/// Tuning for a [`Search`](crate::Search).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Weight of the heuristic. `1.0` finds optimal paths, higher values trade optimality for speed.
    /// Only applies to [`SearchPolicy::Shortest`].
    pub heuristic_scale: f32,
    /// Nodes carrying any of these tag bits are never entered.
    pub blocked_tags: u32,
    /// How many nodes are expanded between two looks at the clock.
    pub expansions_per_time_check: usize,
    /// Yields after this many expansions per step, regardless of the deadline.
    pub max_expansions_per_step: Option<usize>,
    /// Parent chains longer than this are treated as broken.
    pub max_trace_hops: usize,
    /// Chance of replacing the held candidate of a random or flee path with a new one.
    pub replace_chance: f64,
    /// Seed for the candidate selection of random and flee paths.
    pub seed: u64,
    /// Whether paths are shortened along the corridor, or pass through node centers.
    pub smooth: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            heuristic_scale: 1.0,
            blocked_tags: 0,
            expansions_per_time_check: 500,
            max_expansions_per_step: None,
            max_trace_hops: 65536,
            replace_chance: 0.1,
            seed: 0,
            smooth: true,
        }
    }
}

impl SearchOptions {
    /// Sets [`SearchOptions::seed`].
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets [`SearchOptions::max_expansions_per_step`].
    pub fn with_max_expansions_per_step(mut self, expansions: usize) -> Self {
        self.max_expansions_per_step = Some(expansions);
        self
    }

    /// Sets [`SearchOptions::blocked_tags`].
    pub fn with_blocked_tags(mut self, tags: u32) -> Self {
        self.blocked_tags = tags;
        self
    }

    /// Sets [`SearchOptions::smooth`].
    pub fn with_smoothing(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }
}
