//! Bake target images and where they live on disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage, imageops::FilterType};

use crate::{
    color::{decode_u8, encode_u8},
    config::{BakeConfig, FileFormat},
    graph::ColorSpace,
};

/// What the orchestrator asks for before a bake.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    /// File name, also used as the image's name.
    pub name: String,
    pub path: PathBuf,
    pub resolution: u32,
    /// Flat colour written over every pixel before baking.
    pub fill: Option<[f32; 4]>,
    pub alpha: bool,
    pub color_space: ColorSpace,
    pub format: FileFormat,
}

/// An in-memory square image. Pixels are linear RGBA, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct BakeImage {
    pub name: String,
    pub path: PathBuf,
    pub size: u32,
    pub alpha: bool,
    pub color_space: ColorSpace,
    pub format: FileFormat,
    pixels: Vec<[f32; 4]>,
}

impl BakeImage {
    pub fn new(spec: &ImageSpec) -> Self {
        let size = spec.resolution.max(1);
        Self {
            name: spec.name.clone(),
            path: spec.path.clone(),
            size,
            alpha: spec.alpha,
            color_space: spec.color_space,
            format: spec.format,
            pixels: vec![[0.0, 0.0, 0.0, 1.0]; size as usize * size as usize],
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.size && y < self.size).then(|| y as usize * self.size as usize + x as usize)
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        self.pixels.get(self.index(x, y)?).copied()
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [f32; 4]) {
        if let Some(px) = self.index(x, y).and_then(|i| self.pixels.get_mut(i)) {
            *px = color;
        }
    }

    pub fn fill(&mut self, color: [f32; 4]) {
        self.pixels.fill(color);
    }

    /// Copy channel `from` of `src` into channel `to` of this image.
    pub fn copy_channel_from(&mut self, src: &BakeImage, from: usize, to: usize) -> Result<()> {
        if from > 3 || to > 3 {
            bail!("channel index out of range: {from} -> {to}");
        }
        if src.size != self.size {
            bail!(
                "cannot combine {} ({}px) into {} ({}px)",
                src.name,
                src.size,
                self.name,
                self.size
            );
        }
        for (dst, s) in self.pixels.iter_mut().zip(&src.pixels) {
            dst[to] = s[from];
        }
        Ok(())
    }

    fn srgb(&self) -> bool {
        self.color_space == ColorSpace::Srgb
    }

    fn to_dynamic(&self) -> DynamicImage {
        let srgb = self.srgb();
        let px = |x: u32, y: u32| self.pixel(x, y).unwrap_or_default();
        // JPEG has no alpha channel.
        if self.alpha && self.format != FileFormat::Jpeg {
            DynamicImage::ImageRgba8(RgbaImage::from_fn(self.size, self.size, |x, y| {
                let [r, g, b, a] = px(x, y);
                Rgba([
                    encode_u8(r, srgb),
                    encode_u8(g, srgb),
                    encode_u8(b, srgb),
                    encode_u8(a, false),
                ])
            }))
        } else {
            DynamicImage::ImageRgb8(RgbImage::from_fn(self.size, self.size, |x, y| {
                let [r, g, b, _] = px(x, y);
                Rgb([encode_u8(r, srgb), encode_u8(g, srgb), encode_u8(b, srgb)])
            }))
        }
    }

    fn from_dynamic(spec: &ImageSpec, img: &DynamicImage) -> Self {
        let mut rgba = img.to_rgba8();
        if rgba.width() != spec.resolution || rgba.height() != spec.resolution {
            rgba = image::imageops::resize(&rgba, spec.resolution, spec.resolution, FilterType::Triangle);
        }
        let srgb = spec.color_space == ColorSpace::Srgb;
        let pixels = rgba
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                [
                    decode_u8(r, srgb),
                    decode_u8(g, srgb),
                    decode_u8(b, srgb),
                    decode_u8(a, false),
                ]
            })
            .collect();
        let mut out = BakeImage::new(spec);
        out.pixels = pixels;
        out
    }
}

fn image_format(format: FileFormat) -> ImageFormat {
    match format {
        FileFormat::Bmp => ImageFormat::Bmp,
        FileFormat::Png => ImageFormat::Png,
        FileFormat::Jpeg => ImageFormat::Jpeg,
        FileFormat::Tiff => ImageFormat::Tiff,
        FileFormat::Targa => ImageFormat::Tga,
    }
}

/// Persistence of bake targets.
pub trait ImageStore {
    /// Where an image called `file_name` is stored.
    fn path_for(&self, config: &BakeConfig, file_name: &str) -> PathBuf;

    fn exists(&self, path: &Path) -> bool;

    /// Create the image, or reuse the stored one rescaled to the requested resolution.
    /// `spec.fill` is applied either way.
    fn acquire(&mut self, spec: &ImageSpec) -> Result<BakeImage>;

    /// Load an existing image without touching its pixels.
    fn load(&mut self, spec: &ImageSpec) -> Result<BakeImage>;

    fn save(&mut self, image: &BakeImage) -> Result<()>;

    fn copy_channel(&mut self, src: &BakeImage, from: usize, dst: &mut BakeImage, to: usize) -> Result<()> {
        dst.copy_channel_from(src, from, to)
    }
}

/// Images stored as files next to the scene.
#[derive(Debug, Clone)]
pub struct FileImageStore {
    scene_dir: PathBuf,
}

impl FileImageStore {
    pub fn new(scene_dir: impl Into<PathBuf>) -> Self {
        Self {
            scene_dir: scene_dir.into(),
        }
    }
}

impl ImageStore for FileImageStore {
    fn path_for(&self, config: &BakeConfig, file_name: &str) -> PathBuf {
        config.output_directory(&self.scene_dir).join(file_name)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn acquire(&mut self, spec: &ImageSpec) -> Result<BakeImage> {
        let mut img = if self.exists(&spec.path) {
            tracing::debug!(path = %spec.path.display(), "reusing existing image");
            self.load(spec)?
        } else {
            BakeImage::new(spec)
        };
        if let Some(color) = spec.fill {
            img.fill(color);
        }
        Ok(img)
    }

    fn load(&mut self, spec: &ImageSpec) -> Result<BakeImage> {
        let img = image::open(&spec.path)
            .map_err(|e| anyhow!("failed to open image {}: {e}", spec.path.display()))?;
        Ok(BakeImage::from_dynamic(spec, &img))
    }

    fn save(&mut self, image: &BakeImage) -> Result<()> {
        if let Some(dir) = image.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        }
        image
            .to_dynamic()
            .save_with_format(&image.path, image_format(image.format))
            .map_err(|e| anyhow!("failed to save image {}: {e}", image.path.display()))
    }
}
