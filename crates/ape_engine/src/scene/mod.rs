//! Scene loading
//!
//! A scene is the ordered list of textured models the renderer draws every
//! frame. Loading decodes every mesh and texture up front; any missing or
//! malformed asset fails the whole scene.

use nalgebra::Translation3;
use std::path::PathBuf;
use thiserror::Error;

use crate::assets::{AssetError, ImageData, ObjError, ObjLoader};
use crate::core::config::{AssetConfig, ModelConfig, SceneConfig};
use crate::foundation::math::Mat4;
use crate::render::mesh::Mesh;

/// Scene loading errors
#[derive(Error, Debug)]
pub enum SceneError {
    /// A model's mesh could not be loaded
    #[error("Failed to load mesh {path}: {source}")]
    Mesh {
        /// Resolved mesh path
        path: PathBuf,
        /// Underlying parse or I/O error
        source: ObjError,
    },

    /// A model's texture could not be decoded
    #[error("Failed to load texture {path}: {source}")]
    Texture {
        /// Resolved texture path
        path: PathBuf,
        /// Underlying decode error
        source: AssetError,
    },

    /// The scene lists no models
    #[error("Scene has no models")]
    Empty,
}

/// World placement of a model at `position`
pub fn placement(position: [f32; 3]) -> Mat4 {
    Translation3::new(position[0], position[1], position[2]).to_homogeneous()
}

/// A decoded model ready for upload
#[derive(Debug, Clone)]
pub struct SceneModel {
    /// Indexed geometry
    pub mesh: Mesh,
    /// RGBA8 texture
    pub image: ImageData,
    /// Object-to-world placement
    pub transform: Mat4,
}

impl SceneModel {
    /// Decode the mesh and texture of one configured model
    pub fn load(model: &ModelConfig, assets: &AssetConfig) -> Result<Self, SceneError> {
        let mesh_path = assets.resolve(&model.mesh);
        let mesh = ObjLoader::load_obj(&mesh_path).map_err(|source| SceneError::Mesh {
            path: mesh_path.clone(),
            source,
        })?;

        let texture_path = assets.resolve(&model.texture);
        let image = ImageData::from_file(&texture_path).map_err(|source| SceneError::Texture {
            path: texture_path.clone(),
            source,
        })?;

        Ok(Self {
            mesh,
            image,
            transform: placement(model.position),
        })
    }
}

/// Ordered collection of decoded models
#[derive(Debug, Clone, Default)]
pub struct Scene {
    models: Vec<SceneModel>,
}

impl Scene {
    /// Decode every model the config lists
    pub fn load(config: &SceneConfig, assets: &AssetConfig) -> Result<Self, SceneError> {
        if config.models.is_empty() {
            return Err(SceneError::Empty);
        }

        let models = config
            .models
            .iter()
            .map(|model| SceneModel::load(model, assets))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Scene loaded: {} models, {} triangles",
            models.len(),
            models.iter().map(|model| model.mesh.indices.len() / 3).sum::<usize>()
        );
        Ok(Self { models })
    }

    /// Models in draw order
    pub fn models(&self) -> &[SceneModel] {
        &self.models
    }

    /// Number of models
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the scene has no models
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;
    use approx::assert_relative_eq;
    use std::fs;

    const QUAD_OBJ: &str = "\
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.5 0.5 0.0
v -0.5 0.5 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3 4/4
";

    fn asset_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ape_engine_scene_{}_{}", name, std::process::id()));
        fs::create_dir_all(dir.join("models")).unwrap();
        fs::create_dir_all(dir.join("textures")).unwrap();
        fs::write(dir.join("models/quad.obj"), QUAD_OBJ).unwrap();
        image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 0, 255]))
            .save(dir.join("textures/red.png"))
            .unwrap();
        dir
    }

    fn model(position: [f32; 3]) -> ModelConfig {
        ModelConfig {
            mesh: "models/quad.obj".to_string(),
            texture: "textures/red.png".to_string(),
            position,
        }
    }

    #[test]
    fn test_loads_every_configured_model() {
        let dir = asset_dir("load");
        let assets = AssetConfig {
            assets_dir: dir.display().to_string(),
        };
        let config = SceneConfig {
            models: vec![model([-0.6, 0.0, 0.0]), model([0.6, 0.0, 0.0])],
        };

        let scene = Scene::load(&config, &assets).unwrap();

        assert_eq!(scene.len(), 2);
        let first = &scene.models()[0];
        assert_eq!(first.mesh.vertices.len(), 4);
        assert_eq!(first.mesh.indices.len(), 6);
        assert_eq!((first.image.width, first.image.height), (4, 2));

        let origin = scene.models()[1].transform.transform_point(&Point3::origin());
        assert_relative_eq!(origin.x, 0.6);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_texture_fails_the_scene() {
        let dir = asset_dir("missing");
        let assets = AssetConfig {
            assets_dir: dir.display().to_string(),
        };
        let mut broken = model([0.0; 3]);
        broken.texture = "textures/nope.png".to_string();
        let config = SceneConfig {
            models: vec![model([0.0; 3]), broken],
        };

        let result = Scene::load(&config, &assets);
        assert!(matches!(result, Err(SceneError::Texture { .. })));

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_mesh_fails_the_scene() {
        let assets = AssetConfig {
            assets_dir: "definitely/not/here".to_string(),
        };
        let config = SceneConfig {
            models: vec![model([0.0; 3])],
        };

        assert!(matches!(Scene::load(&config, &assets), Err(SceneError::Mesh { .. })));
    }

    #[test]
    fn test_empty_scene_is_an_error() {
        let config = SceneConfig { models: vec![] };
        assert!(matches!(
            Scene::load(&config, &AssetConfig::default()),
            Err(SceneError::Empty)
        ));
    }
}
