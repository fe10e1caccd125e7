//! # Unified Configuration
//!
//! Every tunable of the renderer and the demo scene lives here so an
//! application can load one file and hand each subsystem its section.
//!
//! All sections use `#[serde(default)]`, so a config file only needs the keys
//! it wants to change.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::config::{Config, ConfigError};

const SHADER_SEARCH_DIRS: [&str; 5] = [
    "target/shaders/",
    "shaders/",
    "resources/shaders/",
    "../target/shaders/",
    "./",
];

/// # Shader Configuration
///
/// Paths to the SPIR-V produced by the build script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the usual build-output locations so the binary can be started
    /// from the workspace root or from its own directory.
    pub fn with_path_resolution(vertex_file: &str, fragment_file: &str) -> Self {
        let resolve = |file: &str| {
            SHADER_SEARCH_DIRS
                .iter()
                .map(|dir| format!("{}{}", dir, file))
                .find(|candidate| Path::new(candidate).exists())
                .unwrap_or_else(|| format!("{}{}", SHADER_SEARCH_DIRS[0], file))
        };

        Self::new(resolve(vertex_file), resolve(fragment_file))
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.vertex_shader_path, &self.fragment_shader_path] {
            if !Path::new(path).exists() {
                return Err(ConfigError::Invalid(format!("Shader not found: {}", path)));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::with_path_resolution("textured.vert.spv", "textured.frag.spv")
    }
}

/// # Vulkan Renderer Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VulkanRendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Number of frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers (`None` = debug builds only)
    pub enable_validation: Option<bool>,
    /// Render through a multisampled color target when the device supports it
    pub enable_msaa: bool,
    /// Upper bound on drawables, used to size the descriptor pool
    pub max_drawables: u32,
    /// Framebuffer clear color (RGBA)
    pub clear_color: [f32; 4],
}

impl VulkanRendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            shaders: ShaderConfig::default(),
            max_frames_in_flight: 2,
            enable_validation: None,
            enable_msaa: true,
            max_drawables: 16,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation layers should be requested for this build
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.enable_validation.unwrap_or(true)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        if !(1..=8).contains(&self.max_frames_in_flight) {
            return Err(ConfigError::Invalid(format!(
                "max_frames_in_flight must be within 1..=8, got {}",
                self.max_frames_in_flight
            )));
        }

        if self.max_drawables == 0 {
            return Err(ConfigError::Invalid("max_drawables must be at least 1".to_string()));
        }

        Ok(())
    }
}

impl Default for VulkanRendererConfig {
    fn default() -> Self {
        Self::new("Ape Escape Remake")
    }
}

/// # Engine Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter, e.g. `"info"` or `"ape_engine=debug"`
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// # Window Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Ape Escape Remake".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// # Asset Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Base directory that model and texture paths are relative to
    pub assets_dir: String,
}

impl AssetConfig {
    /// Resolve an asset path against the base directory
    pub fn resolve(&self, relative: &str) -> std::path::PathBuf {
        Path::new(&self.assets_dir).join(relative)
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            assets_dir: "resources".to_string(),
        }
    }
}

/// One textured model placed in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OBJ file, relative to the assets directory
    pub mesh: String,
    /// Texture image, relative to the assets directory
    pub texture: String,
    /// World-space placement
    #[serde(default)]
    pub position: [f32; 3],
}

/// # Scene Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Models drawn every frame, in order
    pub models: Vec<ModelConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let dennis = |x: f32| ModelConfig {
            mesh: "models/dennis.obj".to_string(),
            texture: "textures/dennis.png".to_string(),
            position: [x, 0.0, 0.0],
        };
        Self {
            models: vec![dennis(-0.6), dennis(0.6)],
        }
    }
}

/// # Complete Application Configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Window configuration
    pub window: WindowConfig,
    /// Rendering system configuration
    pub renderer: VulkanRendererConfig,
    /// Scene contents
    pub scene: SceneConfig,
    /// Asset system configuration
    pub assets: AssetConfig,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("Window size must be non-zero".to_string()));
        }
        if self.scene.models.len() > self.renderer.max_drawables as usize {
            return Err(ConfigError::Invalid(format!(
                "Scene has {} models but max_drawables is {}",
                self.scene.models.len(),
                self.renderer.max_drawables
            )));
        }
        self.renderer.validate()
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let text = r#"
            [window]
            width = 1024

            [renderer]
            max_frames_in_flight = 3
            enable_msaa = false
        "#;

        let config = ApplicationConfig::from_str_as(text, ConfigFormat::Toml).unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "Ape Escape Remake");
        assert_eq!(config.renderer.max_frames_in_flight, 3);
        assert!(!config.renderer.enable_msaa);
        assert_eq!(config.scene.models.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scene_models_from_ron() {
        let text = r#"(
            scene: (
                models: [
                    (mesh: "models/crate.obj", texture: "textures/crate.png"),
                ],
            ),
        )"#;

        let config = ApplicationConfig::from_str_as(text, ConfigFormat::Ron).unwrap();

        assert_eq!(config.scene.models.len(), 1);
        assert_eq!(config.scene.models[0].mesh, "models/crate.obj");
        assert_eq!(config.scene.models[0].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        let config = VulkanRendererConfig::default().with_max_frames_in_flight(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = VulkanRendererConfig::default().with_max_frames_in_flight(9);
        assert!(config.validate().is_err());

        let config = VulkanRendererConfig::default().with_max_frames_in_flight(2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_shader_file_is_invalid() {
        let dir = std::env::temp_dir().join(format!("ape_engine_shaders_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let vertex = dir.join("textured.vert.spv");
        std::fs::write(&vertex, [0x03, 0x02, 0x23, 0x07]).unwrap();
        let vertex = vertex.to_string_lossy().into_owned();

        let missing = ShaderConfig::new(vertex.clone(), dir.join("absent.frag.spv").to_string_lossy());
        assert!(matches!(missing.validate(), Err(ConfigError::Invalid(_))));

        let present = ShaderConfig::new(vertex.clone(), vertex);
        assert!(present.validate().is_ok());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_validation_follows_override_and_build_type() {
        assert!(!VulkanRendererConfig::default().with_validation(false).validation_enabled());
        assert_eq!(
            VulkanRendererConfig::default().with_validation(true).validation_enabled(),
            cfg!(debug_assertions)
        );
        assert_eq!(VulkanRendererConfig::default().validation_enabled(), cfg!(debug_assertions));
    }

    #[test]
    fn test_scene_larger_than_descriptor_budget_is_rejected() {
        let mut config = ApplicationConfig::default();
        config.renderer.max_drawables = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_asset_paths_resolve_against_base_dir() {
        let assets = AssetConfig::default();
        assert_eq!(
            assets.resolve("models/dennis.obj"),
            Path::new("resources").join("models/dennis.obj")
        );
    }

    #[test]
    fn test_saved_config_loads_back_in_both_formats() {
        let mut config = ApplicationConfig::default();
        config.window.width = 1280;
        config.renderer.enable_msaa = false;
        config.scene.models.truncate(1);

        let dir = std::env::temp_dir().join(format!("ape_engine_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        for name in ["saved.toml", "saved.ron"] {
            let path = dir.join(name);
            config.save_to_file(&path).unwrap();
            let loaded = ApplicationConfig::load_from_file(&path).unwrap();

            assert_eq!(loaded.window.width, 1280);
            assert!(!loaded.renderer.enable_msaa);
            assert_eq!(loaded.scene.models, config.scene.models);
        }

        assert!(matches!(
            config.save_to_file(dir.join("saved.json")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
