//! The build entry point: world geometry in, [`PolygonNavmesh`] out.

use thiserror::Error;

use crate::{
    CompactHeightfield, HeightfieldBuilderError, NavmeshConfig, PolygonNavmesh, Terrain, TriMesh,
    compact_heightfield::CompactHeightfieldError, config::ConfigError,
    heightfield::{Heightfield, SpanInsertionError},
    rasterize::VerticalClipping,
    watershed_build_regions::RegionError,
};

/// The world geometry a navmesh is built from.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NavmeshInput {
    /// Arbitrary meshes. Their [`TriMesh::area_types`] are kept, walkable slopes are marked on top.
    pub meshes: Vec<TriMesh>,
    /// An optional heightmap terrain, sampled every [`NavmeshConfig::terrain_sample_size`] samples.
    pub terrain: Option<Terrain>,
}

impl NavmeshInput {
    /// Collects all geometry that may contribute to the field into one trimesh with marked walkable triangles.
    /// Returns `None` if nothing intersects the bounding volume.
    pub fn collect_trimesh(&self, config: &NavmeshConfig) -> Option<TriMesh> {
        let terrain = self
            .terrain
            .as_ref()
            .map(|terrain| terrain.to_trimesh(config.terrain_sample_size));
        let mut combined = TriMesh::default();
        for mesh in self.meshes.iter().chain(terrain.as_ref()) {
            let Some(aabb) = mesh.compute_aabb() else {
                continue;
            };
            let relevant = if config.include_out_of_bounds {
                aabb.intersects_xz(&config.aabb)
            } else {
                aabb.intersects(&config.aabb)
            };
            if !relevant || mesh.is_empty() {
                continue;
            }
            let mut mesh = mesh.clone();
            mesh.mark_walkable_triangles(config.walkable_slope_angle);
            combined.extend(mesh);
        }
        (!combined.is_empty()).then_some(combined)
    }
}

/// The result of a successful [`build_navmesh`].
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    /// No geometry intersected the bounding volume, so nothing was built.
    NothingToScan,
    /// The navmesh, possibly empty if no surface turned out walkable.
    Built(PolygonNavmesh),
}

/// Runs the whole pipeline: rasterization, filtering, erosion, regions, contours and triangulation.
pub fn build_navmesh(
    input: &NavmeshInput,
    config: &NavmeshConfig,
) -> Result<BuildOutcome, NavmeshBuildError> {
    let _span = tracing::debug_span!("build_navmesh", width = config.width, height = config.height)
        .entered();
    let Some(trimesh) = input.collect_trimesh(config) else {
        tracing::debug!("No geometry intersects the bounds, nothing to scan");
        return Ok(BuildOutcome::NothingToScan);
    };

    let mut heightfield = config.heightfield_builder().build()?;
    let clipping = if config.include_out_of_bounds {
        VerticalClipping::Clamp
    } else {
        VerticalClipping::Discard
    };
    heightfield.populate_from_trimesh(&trimesh, config.walkable_climb, clipping)?;
    heightfield.apply_filters(config.walkable_height, config.walkable_climb);
    tracing::debug!(
        triangles = trimesh.indices.len(),
        walkable_spans = heightfield.walkable_span_count(),
        "Rasterized geometry"
    );

    let mut compact = CompactHeightfield::from_heightfield(
        &heightfield,
        config.walkable_height,
        config.walkable_climb,
    )?;
    drop(heightfield);
    compact.erode_walkable_area(config.erosion_threshold);
    compact.build_distance_field();
    compact.build_regions(config.min_region_area)?;

    let contours = compact.build_contours(
        config.max_simplification_error,
        config.max_edge_len,
        config.contour_flags,
    );
    let mesh = contours.into_polygon_mesh();
    tracing::debug!(
        vertices = mesh.vertices.len(),
        triangles = mesh.triangles.len(),
        "Built navmesh"
    );
    Ok(BuildOutcome::Built(mesh))
}

impl Heightfield {
    /// Removes unwanted overhangs caused by the conservative rasterization
    /// and spans where the character cannot possibly stand.
    pub fn apply_filters(&mut self, walkable_height: u16, walkable_climb: u16) {
        self.filter_low_hanging_walkable_obstacles(walkable_climb);
        self.filter_ledge_spans(walkable_height, walkable_climb);
        self.filter_walkable_low_height_spans(walkable_height);
    }
}

/// Errors that can occur while building a navmesh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavmeshBuildError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The heightfield could not be allocated.
    #[error("Failed to build heightfield: {0}")]
    Heightfield(#[from] HeightfieldBuilderError),
    /// A span landed outside of the heightfield.
    #[error("Failed to rasterize geometry: {0}")]
    Rasterization(#[from] SpanInsertionError),
    /// The heightfield could not be compacted.
    #[error("Failed to build compact heightfield: {0}")]
    CompactHeightfield(#[from] CompactHeightfieldError),
    /// Region partitioning failed.
    #[error("Failed to build regions: {0}")]
    Regions(#[from] RegionError),
    /// A graph update asked for a rebuild before the graph was ever scanned.
    #[error("The graph has not been scanned yet, there is no configuration to rebuild with")]
    NotScanned,
}
