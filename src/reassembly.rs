//! Builds the material that uses the baked images.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};

use crate::{
    bake::BakeImage,
    color::Value,
    config::BakeConfig,
    graph::{Graph, NodeId, NodeKind},
    quantity::Quantity,
    scene::{MaterialId, Scene},
};

const SINK_NAME: &str = "Material Output";
const BSDF_NAME: &str = "Principled BSDF";
const MIX_NAME: &str = "Mix Shader";

/// Add a material with a principled BSDF feeding a fresh sink. Autodetected constants
/// become the BSDF's literals. With `has_alpha`, a transparent BSDF is mixed in on the
/// first slot of a mix shader.
pub fn new_material(
    scene: &mut Scene,
    name: &str,
    constants: &BTreeMap<Quantity, Value>,
    has_alpha: bool,
) -> Result<MaterialId> {
    let mut g = Graph::new();
    let sink = g.add_named_node(NodeKind::Sink, SINK_NAME)?;
    let bsdf = g.add_named_node(NodeKind::PrincipledBsdf, BSDF_NAME)?;

    for (q, v) in constants {
        let Some(input) = q
            .bsdf_input(&NodeKind::PrincipledBsdf)
            .and_then(|id| g.find_input(bsdf, id))
        else {
            continue;
        };
        g.set_input_default(input, *v)?;
    }

    let surface = g.input(sink, "Surface")?;
    let bsdf_out = g.output(bsdf, "BSDF")?;
    if has_alpha {
        let transparent = g.add_named_node(NodeKind::TransparentBsdf, "Transparent BSDF")?;
        let mix = g.add_named_node(NodeKind::MixShader, MIX_NAME)?;
        let t_out = g.output(transparent, "BSDF")?;
        let (slot1, slot2) = (g.input(mix, "Shader")?, g.input(mix, "Shader.001")?);
        g.link(t_out, slot1)?;
        g.link(bsdf_out, slot2)?;
        let mix_out = g.output(mix, "Shader")?;
        g.link(mix_out, surface)?;
    } else {
        g.link(bsdf_out, surface)?;
    }

    let name = scene.unique_material_name(name);
    tracing::info!(material = %name, "created material");
    Ok(scene.add_material(name, g))
}

fn named(graph: &Graph, name: &str) -> Result<NodeId> {
    graph
        .node_by_name(name)
        .ok_or_else(|| anyhow!("baked material has no '{name}' node"))
}

/// Wire one image node per baked quantity into a material made by [`new_material`].
pub fn add_images(
    scene: &mut Scene,
    material: MaterialId,
    quantities: &[Quantity],
    images: &BTreeMap<Quantity, BakeImage>,
    config: &BakeConfig,
) -> Result<()> {
    let g = &mut scene.material_mut(material)?.graph;
    let sink = named(g, SINK_NAME)?;
    let bsdf = named(g, BSDF_NAME)?;
    let mix = g.node_by_name(MIX_NAME);
    let merged_alpha = config.alpha_to_color && images.contains_key(&Quantity::Alpha);

    for &q in quantities {
        let Some(image) = images.get(&q) else {
            continue;
        };
        // The alpha image was merged into the colour image.
        if q == Quantity::Alpha && config.alpha_to_color {
            continue;
        }
        let tex = g.add_named_node(
            NodeKind::ImageSample {
                image: Some(image.name.clone()),
                color_space: q.color_space(),
            },
            format!("{} Texture", q.name()),
        )?;
        g.node_mut(tex)?.label = Some(q.name().to_string());
        let tex_color = g.output(tex, "Color")?;

        match q {
            Quantity::Bump if !config.bump_to_normal => {
                let bump = g.add_node(NodeKind::Bump)?;
                let height = g.input(bump, "Height")?;
                g.link(tex_color, height)?;
                let normal = g.input(bsdf, "Normal")?;
                // Keep a baked normal map under the bump.
                if let Some(existing) = g.incoming(normal) {
                    let under = g.input(bump, "Normal")?;
                    g.link(existing, under)?;
                }
                let out = g.output(bump, "Normal")?;
                g.link(out, normal)?;
            }
            q if q.is_normal_like() || q == Quantity::Bump => {
                let target = match q {
                    Quantity::Bump => "Normal",
                    other => other.name(),
                };
                let nm = g.add_node(NodeKind::NormalMap)?;
                let color = g.input(nm, "Color")?;
                g.link(tex_color, color)?;
                let out = g.output(nm, "Normal")?;
                let input = g.input(bsdf, target)?;
                g.link(out, input)?;
            }
            Quantity::Displacement => {
                let input = g.input(sink, "Displacement")?;
                g.link(tex_color, input)?;
            }
            Quantity::Alpha => {
                if let Some(mix) = mix {
                    let fac = g.input(mix, "Fac")?;
                    g.link(tex_color, fac)?;
                }
            }
            Quantity::Color => {
                let input = g.input(bsdf, "Base Color")?;
                g.link(tex_color, input)?;
                if let (true, Some(mix)) = (merged_alpha, mix) {
                    let alpha = g.output(tex, "Alpha")?;
                    let fac = g.input(mix, "Fac")?;
                    g.link(alpha, fac)?;
                }
            }
            other => {
                if let Some(input) = other
                    .bsdf_input(&NodeKind::PrincipledBsdf)
                    .and_then(|id| g.find_input(bsdf, id))
                {
                    g.link(tex_color, input)?;
                }
            }
        }
    }
    Ok(())
}
