#![doc = include_str!("../../../readme.md")]

mod compact_cell;
mod compact_heightfield;
mod compact_span;
mod config;
mod contours;
mod erosion;
pub mod graph;
mod heightfield;
mod main_api;
pub(crate) mod math;
mod poly_mesh;
mod pre_filter;
mod rasterize;
mod region;
mod span;
mod terrain;
mod trimesh;
mod watershed_build_regions;
mod watershed_distance_field;

pub use compact_cell::CompactCell;
pub use compact_heightfield::{CompactHeightfield, CompactHeightfieldError};
pub use compact_span::CompactSpan;
pub use config::{ConfigError, NavmeshConfig, NavmeshConfigBuilder};
pub use contours::{BuildContoursFlags, Contour, ContourSet, ContourVertex, RegionVertexId};
pub use graph::{
    GraphUpdate, LinecastHit, NavmeshGraph, NavmeshNode, NearestMode, NearestNode, NodeConstraint,
    NodeId, ScanStatus, SharedGraph, UpdateSummary,
};
pub use heightfield::{Heightfield, HeightfieldBuilder, HeightfieldBuilderError, SpanInsertionError};
pub use main_api::{BuildOutcome, NavmeshBuildError, NavmeshInput, build_navmesh};
pub use math::Aabb3d;
pub use poly_mesh::PolygonNavmesh;
pub use rasterize::VerticalClipping;
pub use region::RegionId;
pub use span::{AreaType, Span, SpanKey, Spans};
pub use terrain::Terrain;
pub use trimesh::TriMesh;
pub use watershed_build_regions::RegionError;
