//! Decides which quantities of an object get baked and which fold to a constant.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::Result;

use crate::{
    color::Value,
    config::BakeConfig,
    graph::NodeKind,
    quantity::Quantity,
    resolver::{Probe, collect_literals, has_node_kind, is_quantity_linked},
    scene::{MaterialId, ObjectId, Scene},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    /// Quantities to bake, in canonical order.
    pub quantities: Vec<Quantity>,
    /// Quantities with one literal across every material. Never baked.
    pub constants: BTreeMap<Quantity, Value>,
}

impl Plan {
    pub fn contains(&self, quantity: Quantity) -> bool {
        self.quantities.contains(&quantity)
    }
}

/// Plan the bake of `object`. Materials in `exclude` are ignored.
pub fn plan(
    scene: &Scene,
    object: ObjectId,
    config: &BakeConfig,
    exclude: &HashSet<MaterialId>,
) -> Result<Plan> {
    let (mut quantities, mut constants) = if config.autodetect {
        autodetect(scene, object, exclude)?
    } else {
        (config.enabled.clone(), BTreeMap::new())
    };

    if config.alpha_to_color && quantities.contains(&Quantity::Alpha) {
        quantities.insert(Quantity::Color);
        constants.remove(&Quantity::Color);
    }

    Ok(Plan {
        quantities: quantities.into_iter().collect(),
        constants,
    })
}

fn autodetect(
    scene: &Scene,
    object: ObjectId,
    exclude: &HashSet<MaterialId>,
) -> Result<(BTreeSet<Quantity>, BTreeMap<Quantity, Value>)> {
    let mut surfaces = Vec::new();
    let mut displaced = false;
    for id in scene.object_materials(object)? {
        if exclude.contains(&id) {
            continue;
        }
        let graph = &scene.material(id)?.graph;
        let Some(sink) = graph.sink() else {
            continue;
        };
        displaced |= graph.is_linked(graph.input(sink, "Displacement")?);
        let surface = graph.input(sink, "Surface")?;
        if graph.is_linked(surface) {
            surfaces.push((graph, surface));
        }
    }

    let mut bake = BTreeSet::new();
    let mut constants = BTreeMap::new();

    for q in Quantity::ALL.into_iter().filter(|q| q.is_literal_comparable()) {
        let mut probes = Vec::new();
        for (graph, surface) in &surfaces {
            probes.extend(collect_literals(graph, *surface, q)?);
        }
        let Some(first) = probes.first().copied() else {
            continue;
        };
        match first {
            Probe::Literal(v) if probes.iter().all(|p| matches!(p, Probe::Literal(o) if o.same_literal(&v))) => {
                constants.insert(q, v);
            }
            _ => {
                bake.insert(q);
            }
        }
    }

    for (graph, surface) in &surfaces {
        if has_node_kind(graph, *surface, &NodeKind::TransparentBsdf) {
            bake.insert(Quantity::Alpha);
        }
        for q in Quantity::ALL {
            if !bake.contains(&q) && is_quantity_linked(graph, *surface, q)? {
                bake.insert(q);
                constants.remove(&q);
            }
        }
    }
    if displaced {
        bake.insert(Quantity::Displacement);
    }

    tracing::debug!(
        bake = ?bake,
        constants = constants.len(),
        "autodetected bake plan"
    );
    Ok((bake, constants))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::Graph, scene::ObjectKind};

    fn material_with_roughness(scene: &mut Scene, name: &str, roughness: f32) -> MaterialId {
        let mut g = Graph::new();
        let sink = g.add_node(NodeKind::Sink).unwrap();
        let bsdf = g.add_node(NodeKind::PrincipledBsdf).unwrap();
        g.set_input_default(g.input(bsdf, "Roughness").unwrap(), Value::Scalar(roughness))
            .unwrap();
        g.link(g.output(bsdf, "BSDF").unwrap(), g.input(sink, "Surface").unwrap())
            .unwrap();
        scene.add_material(name, g)
    }

    #[test]
    fn explicit_mode_uses_the_enabled_set_in_canonical_order() {
        let mut scene = Scene::new();
        let obj = scene.add_object("Cube", ObjectKind::Mesh);
        let config = BakeConfig {
            enabled: [Quantity::Roughness, Quantity::Alpha, Quantity::Ior]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let plan = plan(&scene, obj, &config, &HashSet::new()).unwrap();
        assert_eq!(plan.quantities, vec![
            Quantity::Alpha,
            Quantity::Color,
            Quantity::Roughness,
            Quantity::Ior,
        ]);
    }

    #[test]
    fn equal_literals_fold_and_different_ones_bake() {
        let mut scene = Scene::new();
        let obj = scene.add_object("Cube", ObjectKind::Mesh);
        let a = material_with_roughness(&mut scene, "a", 0.5);
        let b = material_with_roughness(&mut scene, "b", 0.5);
        scene.assign_material(obj, a).unwrap();
        scene.assign_material(obj, b).unwrap();
        let config = BakeConfig {
            autodetect: true,
            ..Default::default()
        };

        let p = plan(&scene, obj, &config, &HashSet::new()).unwrap();
        assert!(!p.contains(Quantity::Roughness));
        assert_eq!(p.constants.get(&Quantity::Roughness), Some(&Value::Scalar(0.5)));
        assert!(p.quantities.is_empty(), "{:?}", p.quantities);

        let c = material_with_roughness(&mut scene, "c", 0.7);
        scene.assign_material(obj, c).unwrap();
        let p = plan(&scene, obj, &config, &HashSet::new()).unwrap();
        assert_eq!(p.quantities, vec![Quantity::Roughness]);
        assert!(!p.constants.contains_key(&Quantity::Roughness));

        let p = plan(&scene, obj, &config, &[c].into_iter().collect()).unwrap();
        assert!(!p.contains(Quantity::Roughness));
    }
}
