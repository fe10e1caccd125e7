//! Asset decoding
//!
//! Turns files on disk into CPU-side data ready for upload: RGBA8 images and
//! indexed meshes.

pub mod obj_loader;
pub mod image_loader;

pub use obj_loader::{ObjError, ObjLoader};
pub use image_loader::ImageData;

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Mesh parsing failed
    #[error("Mesh error: {0}")]
    Mesh(#[from] ObjError),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
