use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use glam::Vec3A;
use voxelnav::{Aabb3d, NavmeshConfigBuilder, NavmeshInput, TriMesh};

/// Loads every model of every OBJ file into one [`NavmeshInput`].
pub(crate) fn load_meshes(paths: &[PathBuf]) -> anyhow::Result<NavmeshInput> {
    let mut input = NavmeshInput::default();
    for path in paths {
        let (models, _materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        for model in models {
            let vertices: Vec<[f32; 3]> = model
                .mesh
                .positions
                .chunks_exact(3)
                .map(|v| [v[0], v[1], v[2]])
                .collect();
            if model.mesh.indices.len() % 3 != 0 {
                bail!(
                    "Model {} in {} is not triangulated",
                    model.name,
                    path.display()
                );
            }
            tracing::debug!(
                model = %model.name,
                vertices = vertices.len(),
                triangles = model.mesh.indices.len() / 3,
                "Loaded model"
            );
            input
                .meshes
                .push(TriMesh::from_arrays(&vertices, &model.mesh.indices));
        }
    }
    if input.meshes.is_empty() {
        bail!("No meshes found in the input files");
    }
    Ok(input)
}

/// Reads a JSON config, or the defaults if no path is given.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<NavmeshConfigBuilder> {
    let Some(path) = path else {
        return Ok(NavmeshConfigBuilder::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}

/// The bounds of all meshes, padded by `margin` on every side.
pub(crate) fn fit_bounds(input: &NavmeshInput, margin: f32) -> Option<Aabb3d> {
    let mut bounds: Option<Aabb3d> = None;
    for aabb in input.meshes.iter().filter_map(TriMesh::compute_aabb) {
        bounds = Some(bounds.map_or(aabb, |bounds| bounds.union(&aabb)));
    }
    bounds.map(|bounds| Aabb3d {
        min: bounds.min - Vec3A::splat(margin),
        max: bounds.max + Vec3A::splat(margin),
    })
}

/// Parses `x,y,z`.
pub(crate) fn parse_point(text: &str) -> Result<Vec3A, String> {
    let coordinates: Vec<f32> = text
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|error| format!("Invalid coordinate in `{text}`: {error}"))?;
    match coordinates.as_slice() {
        &[x, y, z] => Ok(Vec3A::new(x, y, z)),
        _ => Err(format!("Expected three coordinates as `x,y,z`, got `{text}`")),
    }
}
