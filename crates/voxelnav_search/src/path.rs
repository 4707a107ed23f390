use std::sync::Arc;

use glam::Vec3A;

use crate::FloodField;

/// A path found by a [`Search`](crate::Search).
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult<N> {
    /// The nodes from the start to the end of the path.
    pub nodes: Vec<N>,
    /// World positions from the start point to the end point.
    pub positions: Vec<Vec3A>,
    /// The accumulated cost of the path, penalties included.
    pub cost: u32,
    /// How many nodes the search expanded.
    pub expanded: usize,
}

impl<N> PathResult<N> {
    /// The node the path ends at.
    pub fn end(&self) -> Option<&N> {
        self.nodes.last()
    }

    /// The length of [`PathResult::positions`] in world units.
    pub fn length(&self) -> f32 {
        self.positions
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }
}

/// What a completed [`Search`](crate::Search) produced.
#[derive(Debug, Clone)]
pub enum SearchOutput<N> {
    /// A path, from every policy except [`SearchPolicy::Flood`](crate::SearchPolicy::Flood).
    Path(PathResult<N>),
    /// A flood for [`SearchPolicy::FloodTrace`](crate::SearchPolicy::FloodTrace).
    Flood(Arc<FloodField<N>>),
}

impl<N> SearchOutput<N> {
    /// The path, if this is one.
    pub fn path(&self) -> Option<&PathResult<N>> {
        match self {
            Self::Path(path) => Some(path),
            Self::Flood(_) => None,
        }
    }

    /// Takes the path, if this is one.
    pub fn into_path(self) -> Option<PathResult<N>> {
        match self {
            Self::Path(path) => Some(path),
            Self::Flood(_) => None,
        }
    }

    /// The flood, if this is one.
    pub fn flood(&self) -> Option<&Arc<FloodField<N>>> {
        match self {
            Self::Path(_) => None,
            Self::Flood(flood) => Some(flood),
        }
    }
}
