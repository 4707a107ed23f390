use std::{
    collections::VecDeque,
    fmt,
    hash::Hash,
    time::{Duration, Instant},
};

use voxelnav::NodeId;

use crate::{Search, SearchError, SearchGraph, SearchId, SearchOutput, Step};

/// A search that finished during a [`SearchQueue::tick`].
#[derive(Debug, Clone)]
pub struct FinishedSearch<N> {
    /// The id of the search.
    pub id: SearchId,
    /// What it produced.
    pub result: Result<SearchOutput<N>, SearchError>,
}

/// Interleaves many searches on one thread.
///
/// Every [`SearchQueue::tick`] gives each pending search an equal slice of the budget, in round robin order.
/// The graph is only borrowed for the duration of a tick, so it can be updated between ticks.
#[derive(Debug)]
pub struct SearchQueue<N = NodeId> {
    pending: VecDeque<Search<N>>,
}

impl<N> Default for SearchQueue<N> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }
}

impl<N: Copy + Eq + Hash + fmt::Debug> SearchQueue<N> {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a search. It is prepared on the next tick if it was not already.
    pub fn submit(&mut self, search: Search<N>) -> SearchId {
        let id = search.id();
        self.pending.push_back(search);
        id
    }

    /// Drops a pending search. Returns `false` if no search with this id is pending.
    pub fn cancel(&mut self, id: SearchId) -> bool {
        let Some(index) = self.pending.iter().position(|search| search.id() == id) else {
            return false;
        };
        if let Some(mut search) = self.pending.remove(index) {
            search.abort();
            tracing::debug!(%id, "Cancelled search");
        }
        true
    }

    /// The number of pending searches.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no search is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether the search with this id is pending.
    pub fn contains(&self, id: SearchId) -> bool {
        self.pending.iter().any(|search| search.id() == id)
    }

    /// Advances every pending search once, spending at most about `budget` in total.
    ///
    /// Returns the searches that finished. Searches still pending after the budget
    /// runs out keep their place and resume on the next tick.
    pub fn tick<G>(&mut self, graph: &G, budget: Duration) -> Vec<FinishedSearch<N>>
    where
        G: SearchGraph<Node = N> + ?Sized,
    {
        let started = Instant::now();
        let deadline = started + budget;
        let count = self.pending.len();
        let mut finished = Vec::new();
        for turn in 0..count {
            let Some(mut search) = self.pending.pop_front() else {
                break;
            };
            // Later searches inherit whatever the earlier ones left of the budget.
            let remaining = count - turn;
            let now = Instant::now();
            let slice = deadline.saturating_duration_since(now) / remaining as u32;
            let step = match search.prepare(graph) {
                Ok(()) => search.step(graph, now + slice),
                Err(error) => Step::Failed(error),
            };
            match step.into_result() {
                None => self.pending.push_back(search),
                Some(result) => finished.push(FinishedSearch {
                    id: search.id(),
                    result,
                }),
            }
            if Instant::now() >= deadline {
                // Searches that missed their turn are at the front and go first next tick.
                break;
            }
        }
        tracing::trace!(
            finished = finished.len(),
            pending = self.pending.len(),
            elapsed = ?started.elapsed(),
            "Search queue tick"
        );
        finished
    }
}
