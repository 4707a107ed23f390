use glam::Vec3A;
use thiserror::Error;

use crate::{Aabb3d, BuildContoursFlags, HeightfieldBuilder, HeightfieldBuilderError};

/// Settings for every stage of a navmesh build, converted to voxel units.
/// Create it with [`NavmeshConfigBuilder::build`].
///
/// Values are given in voxels (vx) or world units (wu), where a voxel measures
/// `cell_size` horizontally and `cell_height` vertically.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct NavmeshConfig {
    /// Columns along x. `[Units: vx]`
    pub width: u16,

    /// Columns along z. `[Units: vx]`
    pub height: u16,

    /// Horizontal voxel size. `[Units: wu]`
    pub cell_size: f32,

    /// Vertical voxel size. `[Units: wu]`
    pub cell_height: f32,

    /// The volume being voxelized. `[Units: wu]`
    pub aabb: Aabb3d,

    /// The largest accepted number of columns (`width * height`).
    pub max_columns: usize,

    /// Steepest walkable slope. `[Units: radians]`
    pub walkable_slope_angle: f32,

    /// Clearance an agent needs above a floor. `[Units: vx]`
    ///
    /// Computed as `(agent height / cell_height).ceil()`.
    pub walkable_height: u16,

    /// Maximum ledge height that is considered to still be traversable. `[Units: vx]`
    ///
    /// Computed as `(max climb / cell_height).floor()`.
    pub walkable_climb: u16,

    /// The clearance kept from obstructions, in half cells. `[Units: vx / 2]`
    ///
    /// Computed as `(2 * character_radius / cell_size).ceil()`, see [`CompactHeightfield::erode_walkable_area`](crate::CompactHeightfield::erode_walkable_area).
    pub erosion_threshold: u16,

    /// Border edges of contours longer than this are split. Zero never splits. `[Units: vx]`
    pub max_edge_len: u16,

    /// How far a simplified contour may stray from the traced one. `[Units: vx]`
    pub max_simplification_error: f32,

    /// Regions with fewer spans are merged into a neighbor or removed. `[Units: vx]`
    pub min_region_area: usize,

    /// Keep geometry outside of the bounds, clamping it onto the field instead of discarding it.
    pub include_out_of_bounds: bool,

    /// Terrain heightmaps are sampled every `terrain_sample_size` samples. `[Limit: >= 1]`
    pub terrain_sample_size: u32,

    /// Which edges [`ContourSet`](crate::ContourSet) simplification keeps.
    pub contour_flags: BuildContoursFlags,
}

impl NavmeshConfig {
    /// The builder for an empty [`Heightfield`](crate::Heightfield) covering [`NavmeshConfig::aabb`].
    pub fn heightfield_builder(&self) -> HeightfieldBuilder {
        HeightfieldBuilder {
            aabb: self.aabb,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            max_columns: self.max_columns,
        }
    }
}

/// A builder for [`NavmeshConfig`], in world units.
/// The config has lots of interdependent values, so this builder provides a convenient way to set all the necessary parameters.
///
/// The default values are chosen to be reasonable for an agent resembling an adult human in a world measured in meters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct NavmeshConfigBuilder {
    /// Horizontal voxel size. `[Limit: > 0] [Units: wu]`
    ///
    /// Smaller values increase rasterization resolution and navmesh detail, but generation time grows quadratically.
    /// A recommended starting value is the character radius or half of it.
    pub cell_size: f32,
    /// Vertical voxel size. `[Limit: > 0] [Units: wu]`
    ///
    /// Smaller values ensure that the navmesh connects areas only separated by a small curb or ditch.
    pub cell_height: f32,
    /// How tall the agent is. `[Limit: > 0] [Units: wu]`
    pub walkable_height: f32,
    /// How high the agent can step. `[Limit: >= 0] [Units: wu]`
    pub walkable_climb: f32,
    /// The radius of the agent. `[Limit: >= 0] [Units: wu]`
    pub character_radius: f32,
    /// The steepest walkable slope. `[Limit: 0..90] [Units: degrees]`
    pub max_slope: f32,
    /// Longer contour edges are subdivided. `[Limit: >= 0] [Units: wu]`
    pub max_edge_length: f32,
    /// Max distance from a simplified contour edge to the real one. `[Limit: >= 0] [Units: vx]`
    pub contour_max_error: f32,
    /// Regions with fewer spans are merged into a neighbor or removed. `[Units: vx]`
    pub region_min_size: usize,
    /// Keep geometry outside of the bounds, clamping it onto the field.
    pub include_out_of_bounds: bool,
    /// Stride used when triangulating terrain heightmaps. `[Limit: >= 1]`
    pub terrain_sample_size: u32,
    /// The volume to build the navmesh in.
    pub bounds: Aabb3d,
    /// The largest accepted number of columns (`width * height`).
    pub max_columns: usize,
    /// Flags controlling contour simplification.
    pub contour_flags: BuildContoursFlags,
}

impl Default for NavmeshConfigBuilder {
    fn default() -> Self {
        Self {
            cell_size: 0.5,
            cell_height: 0.4,
            walkable_height: 2.0,
            walkable_climb: 0.5,
            character_radius: 0.5,
            max_slope: 30.0,
            max_edge_length: 20.0,
            contour_max_error: 2.0,
            region_min_size: 8,
            include_out_of_bounds: false,
            terrain_sample_size: 3,
            bounds: Aabb3d::from_center_size(Vec3A::ZERO, Vec3A::new(100.0, 40.0, 100.0)),
            max_columns: HeightfieldBuilder::DEFAULT_MAX_COLUMNS,
            contour_flags: BuildContoursFlags::default(),
        }
    }
}

impl NavmeshConfigBuilder {
    /// Validates the parameters and converts them into voxel units.
    ///
    /// # Errors
    ///
    /// Fails before anything is allocated if a cell dimension is not positive, the grid would be too large,
    /// or an agent dimension is negative.
    pub fn build(self) -> Result<NavmeshConfig, ConfigError> {
        let positive = self.cell_size > 0.0
            && self.cell_height > 0.0
            && self.cell_size.is_finite()
            && self.cell_height.is_finite();
        if !positive {
            return Err(ConfigError::InvalidCellSize {
                cell_size: self.cell_size,
                cell_height: self.cell_height,
            });
        }
        for (name, value) in [
            ("character_radius", self.character_radius),
            ("walkable_height", self.walkable_height),
            ("walkable_climb", self.walkable_climb),
            ("max_edge_length", self.max_edge_length),
            ("contour_max_error", self.contour_max_error),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::NegativeParameter { name, value });
            }
        }
        if !(0.0..90.0).contains(&self.max_slope) {
            return Err(ConfigError::InvalidSlope {
                degrees: self.max_slope,
            });
        }

        let heightfield = HeightfieldBuilder {
            aabb: self.bounds,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            max_columns: self.max_columns,
        };
        let (width, height) = heightfield.grid_size()?;

        Ok(NavmeshConfig {
            width,
            height,
            cell_size: self.cell_size,
            cell_height: self.cell_height,
            aabb: self.bounds,
            max_columns: self.max_columns,
            walkable_slope_angle: self.max_slope.to_radians(),
            walkable_height: (self.walkable_height / self.cell_height).ceil() as u16,
            walkable_climb: (self.walkable_climb / self.cell_height).floor() as u16,
            erosion_threshold: (2.0 * self.character_radius / self.cell_size).ceil() as u16,
            max_edge_len: (self.max_edge_length / self.cell_size) as u16,
            max_simplification_error: self.contour_max_error,
            min_region_area: self.region_min_size,
            include_out_of_bounds: self.include_out_of_bounds,
            terrain_sample_size: self.terrain_sample_size.max(1),
            contour_flags: self.contour_flags,
        })
    }
}

/// Errors that can occur when validating a [`NavmeshConfigBuilder`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A cell dimension is zero, negative or not finite.
    #[error("Cell size and cell height must be positive, got {cell_size} and {cell_height}")]
    InvalidCellSize {
        /// The size of each cell on the xz-plane
        cell_size: f32,
        /// The size of each cell along the y-axis
        cell_height: f32,
    },
    /// An agent or simplification parameter is negative or not finite.
    #[error("{name} must be a non-negative number, got {value}")]
    NegativeParameter {
        /// The name of the offending field.
        name: &'static str,
        /// Its value.
        value: f32,
    },
    /// The slope is outside of `[0, 90)` degrees.
    #[error("Max slope must be in [0, 90) degrees, got {degrees}")]
    InvalidSlope {
        /// The configured slope.
        degrees: f32,
    },
    /// The grid would be too large.
    #[error("Grid is too large: {0}")]
    GridTooLarge(#[from] HeightfieldBuilderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_converts_to_voxels() {
        let config = NavmeshConfigBuilder::default().build().unwrap();
        assert_eq!(config.width, 200);
        assert_eq!(config.height, 200);
        assert_eq!(config.walkable_height, 5);
        assert_eq!(config.walkable_climb, 1);
        assert_eq!(config.erosion_threshold, 2);
        assert_eq!(config.max_edge_len, 40);
        assert_eq!(config.terrain_sample_size, 3);
        approx::assert_relative_eq!(config.walkable_slope_angle, 30.0_f32.to_radians());
    }

    #[test]
    fn zero_radius_disables_erosion() {
        let config = NavmeshConfigBuilder {
            character_radius: 0.0,
            ..Default::default()
        }
        .build()
        .unwrap();
        assert_eq!(config.erosion_threshold, 0);
    }

    #[test]
    fn invalid_cell_size_fails_fast() {
        let error = NavmeshConfigBuilder {
            cell_size: 0.0,
            ..Default::default()
        }
        .build()
        .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidCellSize { .. }));
    }

    #[test]
    fn huge_grid_fails_fast() {
        let error = NavmeshConfigBuilder {
            cell_size: 0.001,
            ..Default::default()
        }
        .build()
        .unwrap_err();
        assert!(matches!(
            error,
            ConfigError::GridTooLarge(HeightfieldBuilderError::ColumnCountTooLarge { .. })
        ));
    }

    #[test]
    fn negative_radius_is_rejected() {
        let error = NavmeshConfigBuilder {
            character_radius: -1.0,
            ..Default::default()
        }
        .build()
        .unwrap_err();
        assert_eq!(
            error,
            ConfigError::NegativeParameter {
                name: "character_radius",
                value: -1.0
            }
        );
    }
}
