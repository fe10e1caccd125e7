//! # Core Engine Module
//!
//! Shared configuration used by every subsystem.

pub mod config;

pub use config::{
    ApplicationConfig,
    AssetConfig,
    Config,
    ConfigError,
    EngineConfig,
    ModelConfig,
    SceneConfig,
    ShaderConfig,
    VulkanRendererConfig,
    WindowConfig,
};
