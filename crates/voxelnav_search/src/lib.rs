//! Time-sliced A* searches over a [`voxelnav::NavmeshGraph`], or any other [`SearchGraph`].
//!
//! ```no_run
//! use std::time::{Duration, Instant};
//!
//! use glam::Vec3A;
//! use voxelnav::NavmeshGraph;
//! use voxelnav_search::{Search, SearchOptions, SearchPolicy, Step};
//!
//! # fn run(graph: &NavmeshGraph) {
//! let mut search = Search::new(
//!     SearchPolicy::Shortest {
//!         start: Vec3A::new(1.0, 0.0, 1.0),
//!         end: Vec3A::new(8.0, 0.0, 5.0),
//!     },
//!     SearchOptions::default(),
//! );
//! if search.prepare(graph).is_ok() {
//!     loop {
//!         match search.step(graph, Instant::now() + Duration::from_millis(2)) {
//!             Step::Continue => continue,
//!             Step::Completed(output) => println!("{:?}", output.path()),
//!             Step::Failed(error) => eprintln!("{error}"),
//!         }
//!         break;
//!     }
//! }
//! # }
//! ```

mod error;
mod flood;
mod graph;
mod path;
mod policy;
mod queue;
mod search;

pub use error::SearchError;
pub use flood::FloodField;
pub use graph::{SearchGraph, centerline, edge_cost};
pub use path::{PathResult, SearchOutput};
pub use policy::{DEFAULT_FLEE_STRENGTH, DEFAULT_SPREAD, SearchOptions, SearchPolicy};
pub use queue::{FinishedSearch, SearchQueue};
pub use search::{Search, SearchId, SearchState, Step, run_to_completion};
