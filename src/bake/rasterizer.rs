use anyhow::{Result, anyhow};

use super::image_store::BakeImage;
use crate::{
    color::FLAT_NORMAL,
    graph::{NodeId, eval_input},
    scene::{MaterialId, ObjectId, Scene},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeKind {
    /// Render whatever feeds the sink's Surface through an emission closure.
    Emit,
    /// Diffuse colour pass of a diffuse closure on the sink's Surface.
    Diffuse,
    /// Tangent-space normals, perturbed by the sink's Displacement.
    Normal,
}

/// One rasterization request. Exactly one image node per participating material is
/// active when it is issued.
#[derive(Debug, Clone, PartialEq)]
pub struct BakePass {
    pub kind: BakeKind,
    pub margin: u32,
    pub clear: bool,
    pub selected_to_active: bool,
    /// Objects whose surfaces are rendered.
    pub objects: Vec<ObjectId>,
    /// Materials whose sink currently carries the baked quantity.
    pub sources: Vec<MaterialId>,
    /// The active image node of each material receiving pixels.
    pub active_images: Vec<(MaterialId, NodeId)>,
}

/// Renders a material's sink into the active image over the object's UV layout.
pub trait Rasterizer {
    fn bake(&mut self, scene: &Scene, pass: &BakePass, image: &mut BakeImage) -> Result<()>;
}

/// Reference rasterizer for constant networks.
///
/// Each source material of the pass owns one horizontal band of the image, in pass order,
/// and the band is filled with the sink's constant value. Materials whose value varies
/// over the surface leave their band untouched.
#[derive(Debug, Default, Clone)]
pub struct FlatRasterizer;

impl Rasterizer for FlatRasterizer {
    fn bake(&mut self, scene: &Scene, pass: &BakePass, image: &mut BakeImage) -> Result<()> {
        if pass.clear {
            image.fill([0.0, 0.0, 0.0, if image.alpha { 0.0 } else { 1.0 }]);
        }
        let bands = pass.sources.len() as u32;
        if bands == 0 {
            return Ok(());
        }
        let size = image.size;
        for (band, material) in pass.sources.iter().enumerate() {
            let graph = &scene.material(*material)?.graph;
            let sink = graph
                .sink()
                .ok_or_else(|| anyhow!("material {material:?} has no output node"))?;
            let value = match pass.kind {
                BakeKind::Emit | BakeKind::Diffuse => eval_input(graph, graph.input(sink, "Surface")?)
                    .map(|v| {
                        let [r, g, b, _] = v.to_rgba();
                        [r, g, b, 1.0]
                    }),
                // Any constant height field leaves the surface unperturbed.
                BakeKind::Normal => eval_input(graph, graph.input(sink, "Displacement")?)
                    .map(|_| FLAT_NORMAL),
            };
            let Some(value) = value else {
                tracing::debug!(material = ?material, "sink value is not constant, band left as is");
                continue;
            };
            let band = band as u32;
            let (y0, y1) = (band * size / bands, (band + 1) * size / bands);
            for y in y0..y1 {
                for x in 0..size {
                    image.set_pixel(x, y, value);
                }
            }
        }
        Ok(())
    }
}
