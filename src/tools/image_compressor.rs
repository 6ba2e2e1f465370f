//! Image compression: bounded downscale plus lossy re-encode.

use super::{BlockingPool, MediaTool, ToolSpec};
use crate::config::ImageSettings;
use crate::error::{MediaError, Result};
use crate::media::{existing_file, OutputDir};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, instrument};

/// Compresses images while maintaining quality.
pub struct ImageCompressorTool {
    spec: ToolSpec,
    output: OutputDir,
    pool: BlockingPool,
    settings: ImageSettings,
}

impl ImageCompressorTool {
    pub fn new(output: OutputDir, pool: BlockingPool, settings: ImageSettings) -> Self {
        Self {
            spec: ToolSpec::new(
                "ImageCompressor",
                "Compresses an image file while maintaining quality. Input: path to an image. \
                 Output: path to the compressed image.",
            ),
            output,
            pool,
            settings,
        }
    }
}

#[async_trait]
impl MediaTool for ImageCompressorTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    #[instrument(skip(self), fields(tool = %self.spec.name))]
    async fn execute(&self, input: &str) -> Result<String> {
        let input_path = existing_file(input)?;
        let output_path = self.output.path_for("compressed", &input_path, None)?;

        let settings = self.settings.clone();
        let dest = output_path.clone();
        self.pool
            .run(move || compress_image(&input_path, &dest, &settings))
            .await?;

        info!("Compressed image to {}", output_path.display());
        Ok(output_path.display().to_string())
    }
}

/// Target size for an image whose longer edge must not exceed `max_dimension`.
///
/// The longer edge becomes exactly `max_dimension`; the shorter edge is scaled
/// by the same ratio and rounded down. Images that already fit are unchanged.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_dimension || max_dimension == 0 {
        return (width, height);
    }

    let scale = |edge: u32| -> u32 {
        let scaled = edge as u64 * max_dimension as u64 / longer as u64;
        (scaled as u32).max(1)
    };

    if width >= height {
        (max_dimension, scale(height))
    } else {
        (scale(width), max_dimension)
    }
}

/// Decode, flatten, downscale and re-encode one image.
fn compress_image(input: &Path, output: &Path, settings: &ImageSettings) -> Result<()> {
    let img = image::open(input)?;

    // Alpha is dropped, not composited
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    };

    let (width, height) = scaled_dimensions(img.width(), img.height(), settings.max_dimension);
    let img = if (width, height) != (img.width(), img.height()) {
        img.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        img
    };

    write_image(&img, output, settings.quality).inspect_err(|_| {
        let _ = std::fs::remove_file(output);
    })
}

/// Encode using the output extension; JPEG gets the quality setting, PNG maximum compression.
fn write_image(img: &DynamicImage, output: &Path, quality: u8) -> Result<()> {
    let format = ImageFormat::from_path(output)?;

    match format {
        ImageFormat::Jpeg => {
            let writer = BufWriter::new(File::create(output)?);
            let encoder = JpegEncoder::new_with_quality(writer, quality.clamp(1, 100));
            img.write_with_encoder(encoder)?;
        }
        ImageFormat::Png => {
            let writer = BufWriter::new(File::create(output)?);
            let encoder =
                PngEncoder::new_with_quality(writer, CompressionType::Best, PngFilter::Adaptive);
            img.write_with_encoder(encoder)?;
        }
        other => {
            img.save_with_format(output, other).map_err(MediaError::from)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn tool(dir: &Path) -> ImageCompressorTool {
        ImageCompressorTool::new(
            OutputDir::new(dir.join("output"), false),
            BlockingPool::new(1),
            ImageSettings::default(),
        )
    }

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(2400, 1200, 1920), (1920, 960));
        assert_eq!(scaled_dimensions(1200, 2400, 1920), (960, 1920));
        assert_eq!(scaled_dimensions(4000, 3000, 1920), (1920, 1440));
        assert_eq!(scaled_dimensions(1920, 1080, 1920), (1920, 1080));
        assert_eq!(scaled_dimensions(800, 600, 1920), (800, 600));
        assert_eq!(scaled_dimensions(10000, 1, 1920), (1920, 1));
    }

    #[tokio::test]
    async fn test_large_png_is_downscaled() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        RgbaImage::from_pixel(2400, 1200, Rgba([10, 200, 30, 128]))
            .save(&input)
            .unwrap();

        let output = tool(dir.path()).execute(input.to_str().unwrap()).await.unwrap();

        assert_eq!(Path::new(&output), dir.path().join("output").join("compressed_photo.png"));
        let result = image::open(&output).unwrap();
        assert_eq!(result.dimensions(), (1920, 960));
        assert!(!result.color().has_alpha());

        // Input untouched
        assert_eq!(image::open(&input).unwrap().dimensions(), (2400, 1200));
    }

    #[tokio::test]
    async fn test_small_jpeg_keeps_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("small.jpg");
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(640, 480, image::Rgb([90, 90, 90])))
            .save(&input)
            .unwrap();

        let output = tool(dir.path()).execute(input.to_str().unwrap()).await.unwrap();

        assert_ne!(Path::new(&output), input.as_path());
        assert_eq!(image::open(&output).unwrap().dimensions(), (640, 480));
    }

    #[tokio::test]
    async fn test_undecodable_input_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.png");
        std::fs::write(&input, b"").unwrap();

        let tool = tool(dir.path());
        assert!(tool.execute(input.to_str().unwrap()).await.is_err());
        assert!(!dir.path().join("output").join("compressed_broken.png").exists());
    }

    #[tokio::test]
    async fn test_missing_input_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path()).execute("/definitely/not/here.png").await;
        assert!(matches!(result, Err(MediaError::InvalidInput(_))));
    }
}
