//! Image enhancement: CLAHE on the lightness channel, then a 3x3 sharpen.
//!
//! The image is split into CIE L*a*b*; only L* is equalized, so colour
//! (a*, b*) passes through untouched.

use super::{BlockingPool, MediaTool, ToolSpec};
use crate::error::Result;
use crate::media::{existing_file, OutputDir};
use async_trait::async_trait;
use image::RgbImage;
use std::path::Path;
use tracing::{info, instrument};

/// Contrast clip limit for CLAHE.
const CLIP_LIMIT: f32 = 3.0;

/// CLAHE tile grid (columns, rows).
const TILE_GRID: (usize, usize) = (8, 8);

/// Sharpening kernel, row-major.
const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// Enhances image quality with local contrast equalization and sharpening.
pub struct EnhancerTool {
    spec: ToolSpec,
    output: OutputDir,
    pool: BlockingPool,
}

impl EnhancerTool {
    pub fn new(output: OutputDir, pool: BlockingPool) -> Self {
        Self {
            spec: ToolSpec::new(
                "Enhancer",
                "Enhances image quality (local contrast and sharpness). Input: path to an image. \
                 Output: path to the enhanced image.",
            ),
            output,
            pool,
        }
    }
}

#[async_trait]
impl MediaTool for EnhancerTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    #[instrument(skip(self), fields(tool = %self.spec.name))]
    async fn execute(&self, input: &str) -> Result<String> {
        let input_path = existing_file(input)?;
        let output_path = self.output.path_for("enhanced", &input_path, None)?;

        let dest = output_path.clone();
        self.pool
            .run(move || enhance_file(&input_path, &dest))
            .await?;

        info!("Enhanced image at {}", output_path.display());
        Ok(output_path.display().to_string())
    }
}

fn enhance_file(input: &Path, output: &Path) -> Result<()> {
    let img = image::open(input)?.to_rgb8();
    let enhanced = enhance(&img);
    enhanced.save(output).inspect_err(|_| {
        let _ = std::fs::remove_file(output);
    })?;
    Ok(())
}

/// Apply CLAHE to lightness, then sharpen.
pub(crate) fn enhance(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);

    let lab: Vec<[f32; 3]> = img.pixels().map(|p| rgb_to_lab(p.0)).collect();
    let lightness: Vec<u8> = lab
        .iter()
        .map(|px| (px[0] * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8)
        .collect();

    let equalized = clahe(&lightness, w, h, CLIP_LIMIT, TILE_GRID);

    let mut merged = RgbImage::new(width, height);
    for (i, pixel) in merged.pixels_mut().enumerate() {
        let l = equalized[i] as f32 * 100.0 / 255.0;
        pixel.0 = lab_to_rgb([l, lab[i][1], lab[i][2]]);
    }

    convolve3x3(&merged, &SHARPEN_KERNEL)
}

/// Contrast-limited adaptive histogram equalization on an 8-bit plane.
pub(crate) fn clahe(
    src: &[u8],
    width: usize,
    height: usize,
    clip_limit: f32,
    grid: (usize, usize),
) -> Vec<u8> {
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let tiles_x = grid.0.clamp(1, width);
    let tiles_y = grid.1.clamp(1, height);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);

    // One lookup table per tile
    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = (tx * tile_w).min(width);
            let x1 = ((tx + 1) * tile_w).min(width);
            let y0 = (ty * tile_h).min(height);
            let y1 = ((ty + 1) * tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for &v in &src[y * width + x0..y * width + x1] {
                    hist[v as usize] += 1;
                }
            }

            let area = ((x1 - x0) * (y1 - y0)) as u32;
            luts[ty * tiles_x + tx] = tile_lut(&mut hist, area, clip_limit);
        }
    }

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let mut out = vec![0u8; width * height];

    for y in 0..height {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1 = tyf.floor() as isize;
        let ya = tyf - ty1 as f32;
        let ty2 = (ty1 + 1).min(tiles_y as isize - 1).max(0) as usize;
        let ty1 = ty1.max(0) as usize;

        for x in 0..width {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor() as isize;
            let xa = txf - tx1 as f32;
            let tx2 = (tx1 + 1).min(tiles_x as isize - 1).max(0) as usize;
            let tx1 = tx1.max(0) as usize;

            let v = src[y * width + x] as usize;
            let lut = |tx: usize, ty: usize| luts[ty * tiles_x + tx][v] as f32;

            let top = lut(tx1, ty1) * (1.0 - xa) + lut(tx2, ty1) * xa;
            let bottom = lut(tx1, ty2) * (1.0 - xa) + lut(tx2, ty2) * xa;
            let value = top * (1.0 - ya) + bottom * ya;

            out[y * width + x] = value.round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}

/// Clip a tile histogram, redistribute the excess, and build its equalization table.
fn tile_lut(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let redistributed = excess / 256;
    let mut residual = excess - redistributed * 256;
    for bin in hist.iter_mut() {
        *bin += redistributed;
    }

    if residual > 0 {
        let step = (256 / residual as usize).max(1);
        let mut i = 0;
        while i < 256 && residual > 0 {
            hist[i] += 1;
            residual -= 1;
            i += step;
        }
    }

    let scale = 255.0 / area as f32;
    let mut sum = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        sum += count;
        lut[i] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }

    lut
}

/// 3x3 convolution with mirrored borders (edge pixel not repeated).
pub(crate) fn convolve3x3(img: &RgbImage, kernel: &[f32; 9]) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut out = RgbImage::new(width, height);

    let reflect = |i: i64, len: u32| -> u32 {
        let len = len as i64;
        if len == 1 {
            return 0;
        }
        let r = if i < 0 {
            -i
        } else if i >= len {
            2 * len - 2 - i
        } else {
            i
        };
        r.clamp(0, len - 1) as u32
    };

    for y in 0..height {
        for x in 0..width {
            let mut acc = [0f32; 3];
            for ky in 0..3 {
                for kx in 0..3 {
                    let sx = reflect(x as i64 + kx as i64 - 1, width);
                    let sy = reflect(y as i64 + ky as i64 - 1, height);
                    let weight = kernel[ky * 3 + kx];
                    let p = img.get_pixel(sx, sy).0;
                    for c in 0..3 {
                        acc[c] += p[c] as f32 * weight;
                    }
                }
            }
            out.put_pixel(x, y, image::Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8)));
        }
    }

    out
}

// D65 reference white
const WHITE: [f32; 3] = [0.950_456, 1.0, 1.088_754];

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f32) -> f32 {
    if t > 0.008_856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    let cube = t * t * t;
    if cube > 0.008_856 {
        cube
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

/// sRGB (8-bit) to CIE L*a*b* with L in 0..=100.
pub(crate) fn rgb_to_lab(rgb: [u8; 3]) -> [f32; 3] {
    let [r, g, b] = rgb.map(|c| srgb_to_linear(c as f32 / 255.0));

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / WHITE[0];
    let y = (0.212_671 * r + 0.715_160 * g + 0.072_169 * b) / WHITE[1];
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / WHITE[2];

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > 0.008_856 { 116.0 * fy - 16.0 } else { 903.3 * y };

    [l, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// CIE L*a*b* back to 8-bit sRGB, clamping out-of-gamut values.
pub(crate) fn lab_to_rgb(lab: [f32; 3]) -> [u8; 3] {
    let [l, a, b] = lab;
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let x = lab_f_inv(fx) * WHITE[0];
    let y = if l > 903.3 * 0.008_856 { fy * fy * fy } else { l / 903.3 };
    let z = lab_f_inv(fz) * WHITE[2];

    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_992 * y + 0.041_556 * z;
    let bl = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

    [r, g, bl].map(|c| (linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0).round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb};

    #[test]
    fn test_lab_round_trip() {
        for rgb in [[0, 0, 0], [255, 255, 255], [200, 30, 40], [12, 180, 240], [128, 128, 128]] {
            let back = lab_to_rgb(rgb_to_lab(rgb));
            for c in 0..3 {
                assert!(
                    (back[c] as i32 - rgb[c] as i32).abs() <= 1,
                    "{:?} -> {:?}",
                    rgb,
                    back
                );
            }
        }
    }

    #[test]
    fn test_gray_has_neutral_chroma() {
        let lab = rgb_to_lab([100, 100, 100]);
        assert!(lab[1].abs() < 0.5);
        assert!(lab[2].abs() < 0.5);
    }

    #[test]
    fn test_clahe_preserves_size_and_flat_planes() {
        let src = vec![100u8; 64 * 48];
        let out = clahe(&src, 64, 48, CLIP_LIMIT, TILE_GRID);
        assert_eq!(out.len(), src.len());
        assert!(out.iter().all(|&v| v == out[0]));
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        // Two close gray levels split down the middle
        let (w, h) = (32, 32);
        let src: Vec<u8> = (0..w * h).map(|i| if i % w < w / 2 { 100 } else { 110 }).collect();
        let out = clahe(&src, w, h, 40.0, (1, 1));

        let min = *out.iter().min().unwrap();
        let max = *out.iter().max().unwrap();
        assert!(max - min > 10);
    }

    #[test]
    fn test_clahe_handles_tiny_images() {
        assert_eq!(clahe(&[42], 1, 1, CLIP_LIMIT, TILE_GRID).len(), 1);
        assert_eq!(clahe(&[1, 2, 3], 3, 1, CLIP_LIMIT, TILE_GRID).len(), 3);
        assert!(clahe(&[], 0, 0, CLIP_LIMIT, TILE_GRID).is_empty());
    }

    #[test]
    fn test_sharpen_leaves_flat_image_alone() {
        let img = RgbImage::from_pixel(5, 4, Rgb([60, 120, 180]));
        let out = convolve3x3(&img, &SHARPEN_KERNEL);
        assert!(out.pixels().all(|p| p.0 == [60, 120, 180]));
    }

    #[test]
    fn test_sharpen_boosts_edges() {
        let mut img = RgbImage::from_pixel(3, 3, Rgb([100, 100, 100]));
        img.put_pixel(1, 1, Rgb([120, 120, 120]));
        let out = convolve3x3(&img, &SHARPEN_KERNEL);
        // 9 * 120 - 8 * 100 = 280, clamped
        assert_eq!(out.get_pixel(1, 1).0, [255, 255, 255]);
    }

    #[test]
    fn test_enhance_keeps_gray_gray() {
        let img = RgbImage::from_pixel(16, 16, Rgb([128, 128, 128]));
        let out = enhance(&img);
        assert_eq!(out.dimensions(), img.dimensions());
        for p in out.pixels() {
            let [r, g, b] = p.0;
            assert!((r as i32 - g as i32).abs() <= 1 && (g as i32 - b as i32).abs() <= 1);
        }
    }

    #[tokio::test]
    async fn test_execute_writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.png");
        RgbImage::from_pixel(20, 10, Rgb([30, 60, 90])).save(&input).unwrap();

        let tool = EnhancerTool::new(OutputDir::new(dir.path().join("out"), false), BlockingPool::new(1));
        let output = tool.execute(input.to_str().unwrap()).await.unwrap();

        assert!(output.ends_with("enhanced_scan.png"));
        assert_eq!(image::open(&output).unwrap().dimensions(), (20, 10));
        assert!(input.exists());
    }
}
