//! Image loading utilities for texture data

use std::path::Path;
use crate::assets::AssetError;

/// Bytes of tightly packed RGBA8 pixels for a `width` x `height` image
pub fn rgba_byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Loaded image data ready for GPU upload
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Raw RGBA pixel data, rows top to bottom
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Number of color channels (always 4 after decoding)
    pub channels: u8,
}

impl ImageData {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(AssetError::NotFound(path_ref.display().to_string()));
        }

        log::debug!("Loading image from: {:?}", path_ref);

        let img = image::open(path_ref)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to load image {}: {}", path_ref.display(), e)))?;

        let image = Self::from_rgba(img.to_rgba8())?;
        log::info!("Loaded image {}x{} from {:?}", image.width, image.height, path_ref);
        Ok(image)
    }

    /// Load image from memory (useful for embedded resources)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to load image from bytes: {}", e)))?;

        Self::from_rgba(img.to_rgba8())
    }

    fn from_rgba(rgba: image::RgbaImage) -> Result<Self, AssetError> {
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(AssetError::InvalidData("Image has zero extent".to_string()));
        }

        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
            channels: 4,
        })
    }

    /// Create a solid color image (useful for testing and defaults)
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            data: color.repeat(rgba_byte_len(width, height) / 4),
            width,
            height,
            channels: 4,
        }
    }

    /// Get the size of the image data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.width, 4);
        assert_eq!(img.height, 4);
        assert_eq!(img.channels, 4);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);

        assert_eq!(&img.data[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_byte_len_does_not_wrap_at_u32() {
        // 70000 * 70000 pixels is past u32::MAX
        assert_eq!(rgba_byte_len(70_000, 70_000), 19_600_000_000);
        assert_eq!(rgba_byte_len(3, 2), 24);
    }

    #[test]
    fn test_png_bytes_decode_to_rgba() {
        let mut png = Vec::new();
        image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let img = ImageData::from_bytes(&png).unwrap();

        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(img.size_bytes(), 3 * 2 * 4);
        assert_eq!(&img.data[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let result = ImageData::from_file("does/not/exist.png");
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }
}
