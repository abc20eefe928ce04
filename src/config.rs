//! Run configuration. One immutable value threaded through planning, resolution and
//! baking.

use std::{collections::BTreeSet, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::{quantity::Quantity, resolver::ResolveOptions};

pub const MAX_MARGIN: u32 = 64;
pub const MAX_RESOLUTION: u32 = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    Bmp,
    #[default]
    Png,
    Jpeg,
    Tiff,
    Targa,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Bmp => "bmp",
            FileFormat::Png => "png",
            FileFormat::Jpeg => "jpg",
            FileFormat::Tiff => "tif",
            FileFormat::Targa => "tga",
        }
    }
}

/// Node wired into the sink's Surface while a quantity is baked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SinkShader {
    #[default]
    Emission,
    Diffuse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Suffixes {
    pub color: String,
    pub metallic: String,
    pub roughness: String,
    pub normal: String,
    pub bump: String,
    pub displacement: String,
    pub bump_to_normal: String,
}

impl Default for Suffixes {
    fn default() -> Self {
        Self {
            color: "_color".into(),
            metallic: "_metal".into(),
            roughness: "_roughness".into(),
            normal: "_normal".into(),
            bump: "_bump".into(),
            displacement: "_disp".into(),
            bump_to_normal: "_normal2".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    pub resolution: u32,
    pub margin: u32,
    /// Relative to the scene file's directory; leading slashes are ignored.
    pub output_dir: String,
    pub image_prefix: String,
    pub file_format: FileFormat,
    pub overwrite: bool,
    pub image_alpha: bool,
    pub clear: bool,
    pub autodetect: bool,
    pub enabled: BTreeSet<Quantity>,
    pub suffixes: Suffixes,
    pub bump_to_normal: bool,
    pub use_bump_strength: bool,
    pub use_normal_strength: bool,
    pub alpha_to_color: bool,
    pub new_material: bool,
    /// Empty means "name it after the object".
    pub new_material_name: String,
    pub selected_to_active: bool,
    pub sink_shader: SinkShader,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            resolution: 2048,
            margin: 0,
            output_dir: "//".into(),
            image_prefix: String::new(),
            file_format: FileFormat::Png,
            overwrite: true,
            image_alpha: false,
            clear: false,
            autodetect: false,
            enabled: [
                Quantity::Color,
                Quantity::Metallic,
                Quantity::Roughness,
                Quantity::Normal,
            ]
            .into_iter()
            .collect(),
            suffixes: Suffixes::default(),
            bump_to_normal: false,
            use_bump_strength: false,
            use_normal_strength: false,
            alpha_to_color: true,
            new_material: false,
            new_material_name: String::new(),
            selected_to_active: false,
            sink_shader: SinkShader::Emission,
        }
    }
}

impl BakeConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config json at {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: BakeConfig = serde_json::from_str(text).context("failed to parse config json")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resolution < 1 {
            bail!("resolution must be at least 1");
        }
        if self.resolution > MAX_RESOLUTION {
            bail!(
                "resolution must be at most {MAX_RESOLUTION}, got {}",
                self.resolution
            );
        }
        if self.margin > MAX_MARGIN {
            bail!("margin must be at most {MAX_MARGIN}, got {}", self.margin);
        }
        Ok(())
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            use_normal_strength: self.use_normal_strength,
            use_bump_strength: self.use_bump_strength,
        }
    }

    /// Bump is baked as a tangent-space normal map instead of a height map.
    pub fn bakes_bump_as_normal(&self, quantity: Quantity) -> bool {
        quantity == Quantity::Bump && self.bump_to_normal
    }

    pub fn suffix(&self, quantity: Quantity) -> String {
        let s = &self.suffixes;
        match quantity {
            Quantity::Color => s.color.clone(),
            Quantity::Metallic => s.metallic.clone(),
            Quantity::Roughness => s.roughness.clone(),
            Quantity::Normal => s.normal.clone(),
            Quantity::Bump if self.bump_to_normal => s.bump_to_normal.clone(),
            Quantity::Bump => s.bump.clone(),
            Quantity::Displacement => s.displacement.clone(),
            other => format!("_{}", other.name()),
        }
    }

    /// `{prefix}{object}{suffix}.{ext}`
    pub fn image_file_name(&self, object: &str, quantity: Quantity) -> String {
        format!(
            "{}{}{}.{}",
            self.image_prefix,
            object,
            self.suffix(quantity),
            self.file_format.extension()
        )
    }

    /// Directory baked images are written to, for a scene stored in `scene_dir`.
    pub fn output_directory(&self, scene_dir: &Path) -> std::path::PathBuf {
        scene_dir.join(self.output_dir.trim_start_matches('/'))
    }

    pub fn material_name(&self, object: &str) -> String {
        if self.new_material_name.is_empty() {
            object.to_string()
        } else {
            self.new_material_name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let c = BakeConfig::from_json("{}").unwrap();
        assert_eq!(c, BakeConfig::default());
        assert_eq!(c.resolution, 2048);
        assert!(c.overwrite);
        assert!(c.alpha_to_color);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let c = BakeConfig::from_json(
            r#"{"resolution": 512, "file_format": "JPEG", "enabled": ["Roughness", "IOR"],
                "suffixes": {"color": "_albedo"}}"#,
        )
        .unwrap();
        assert_eq!(c.resolution, 512);
        assert_eq!(c.file_format.extension(), "jpg");
        assert_eq!(
            c.enabled.iter().copied().collect::<Vec<_>>(),
            vec![Quantity::Roughness, Quantity::Ior]
        );
        assert_eq!(c.suffix(Quantity::Color), "_albedo");
        assert_eq!(c.suffix(Quantity::Metallic), "_metal");
    }

    #[test]
    fn margin_is_bounded() {
        assert!(BakeConfig::from_json(r#"{"margin": 65}"#).is_err());
        assert!(BakeConfig::from_json(r#"{"resolution": 0}"#).is_err());
    }

    #[test]
    fn resolution_is_bounded() {
        assert!(BakeConfig::from_json(r#"{"resolution": 16384}"#).is_ok());
        assert!(BakeConfig::from_json(r#"{"resolution": 16385}"#).is_err());
        assert!(BakeConfig::from_json(r#"{"resolution": 65536}"#).is_err());
    }

    #[test]
    fn file_names_follow_the_naming_scheme() {
        let mut c = BakeConfig {
            image_prefix: "T_".into(),
            ..Default::default()
        };
        assert_eq!(c.image_file_name("Cube", Quantity::Color), "T_Cube_color.png");
        assert_eq!(c.image_file_name("Cube", Quantity::SheenTint), "T_Cube_Sheen Tint.png");
        c.bump_to_normal = true;
        assert_eq!(c.image_file_name("Cube", Quantity::Bump), "T_Cube_normal2.png");
    }

    #[test]
    fn output_dir_is_relative_to_the_scene() {
        let c = BakeConfig {
            output_dir: "//textures".into(),
            ..Default::default()
        };
        assert_eq!(
            c.output_directory(Path::new("/work/scene")),
            Path::new("/work/scene/textures")
        );
    }
}
