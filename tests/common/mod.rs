#![allow(dead_code)]

use std::{
    collections::{BTreeSet, HashMap},
    path::{Path, PathBuf},
};

use anyhow::{Result, anyhow};
use principled_baker::{
    bake::{BakeImage, ImageSpec, ImageStore},
    config::BakeConfig,
    dsl,
    graph::{Link, NodeId},
    scene::Scene,
};

/// Image store that keeps every saved image in memory, keyed by path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub files: HashMap<PathBuf, BakeImage>,
    pub saves: usize,
}

impl MemoryStore {
    pub fn image(&self, name: &str) -> &BakeImage {
        self.files
            .values()
            .find(|img| img.name == name)
            .unwrap_or_else(|| panic!("no image named {name}, have {:?}", self.names()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.files.values().map(|i| i.name.as_str()).collect();
        names.sort();
        names
    }
}

impl ImageStore for MemoryStore {
    fn path_for(&self, config: &BakeConfig, file_name: &str) -> PathBuf {
        config.output_directory(Path::new("memory")).join(file_name)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn acquire(&mut self, spec: &ImageSpec) -> Result<BakeImage> {
        let mut img = self
            .files
            .get(&spec.path)
            .cloned()
            .unwrap_or_else(|| BakeImage::new(spec));
        if let Some(color) = spec.fill {
            img.fill(color);
        }
        Ok(img)
    }

    fn load(&mut self, spec: &ImageSpec) -> Result<BakeImage> {
        self.files
            .get(&spec.path)
            .cloned()
            .ok_or_else(|| anyhow!("no image at {}", spec.path.display()))
    }

    fn save(&mut self, image: &BakeImage) -> Result<()> {
        self.saves += 1;
        self.files.insert(image.path.clone(), image.clone());
        Ok(())
    }
}

pub fn cases_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("cases")
}

pub fn load_case(name: &str) -> Scene {
    let path = cases_root().join(name);
    dsl::load_scene_from_path(&path)
        .and_then(|doc| doc.into_scene())
        .unwrap_or_else(|e| panic!("failed to load {}: {e:#}", path.display()))
}

/// Links, active node and node count of every material.
pub type Snapshot = Vec<(BTreeSet<Link>, Option<NodeId>, usize)>;

pub fn snapshot(scene: &Scene) -> Snapshot {
    scene
        .materials
        .iter()
        .map(|m| (m.graph.topology(), m.graph.active(), m.graph.node_count()))
        .collect()
}

pub fn scratch_left(scene: &Scene) -> usize {
    scene.materials.iter().map(|m| m.graph.scratch_count()).sum()
}

pub fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}
