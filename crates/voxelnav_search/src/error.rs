use thiserror::Error;

/// Why a [`Search`](crate::Search) failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchError {
    /// No node was found near the start point.
    #[error("No node found near the start point")]
    NoStartNode,
    /// The node nearest to the start point cannot be entered.
    #[error("The start node is not walkable")]
    StartNotWalkable,
    /// No walkable node was found near the end point.
    #[error("No node found near the end point")]
    NoEndNode,
    /// The open set ran out before the search could terminate.
    #[error("No path exists between the start and the end")]
    NoPath,
    /// The flood was computed on an older version of the graph.
    #[error("The flood was computed on graph generation {flood}, but the graph is at generation {graph}")]
    StaleFlood {
        /// The generation the flood was computed on.
        flood: u64,
        /// The current generation of the graph.
        graph: u64,
    },
    /// Walking the parent chain took more hops than allowed, the chain is most likely cyclic.
    #[error("Tracing the path took more than {0} hops")]
    TraceOverflow(usize),
    /// The search was aborted by the caller.
    #[error("The search was aborted")]
    Aborted,
    /// [`Search::step`](crate::Search::step) was called before [`Search::prepare`](crate::Search::prepare).
    #[error("The search was stepped before being prepared")]
    NotPrepared,
}
