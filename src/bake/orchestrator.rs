use std::collections::{BTreeMap, HashSet};

use anyhow::{Result, bail};

use super::{
    cycle::BakeCycle,
    image_store::{BakeImage, ImageSpec, ImageStore},
    rasterizer::{BakeKind, BakePass, Rasterizer},
};
use crate::{
    color::{BLACK, FLAT_NORMAL, Value},
    config::{BakeConfig, SinkShader},
    error::BakeError,
    graph::NodeKind,
    planner,
    quantity::Quantity,
    reassembly,
    report::{BakeReport, BakedImage, Diagnostic, FoldedConstant},
    resolver::Resolver,
    scene::{MaterialId, ObjectId, ObjectKind, Scene},
};

/// Validate the run before anything is mutated. Returns the active object and the
/// objects whose materials are baked.
pub fn check_preconditions(scene: &Scene, config: &BakeConfig) -> Result<(ObjectId, Vec<ObjectId>)> {
    let active = scene.active.ok_or(BakeError::NoActiveObject)?;
    let active_obj = scene.object(active)?;
    if active_obj.kind != ObjectKind::Mesh {
        return Err(BakeError::NotAMesh(active_obj.name.clone()).into());
    }

    let mut sources = scene.selected_meshes();
    if config.selected_to_active {
        let selected = scene.selected_objects().len();
        sources.retain(|&o| o != active);
        if selected < 2 || sources.is_empty() {
            return Err(BakeError::NotEnoughObjects(selected).into());
        }
    } else if sources.is_empty() {
        sources.push(active);
    }

    for &o in &sources {
        for m in scene.object_materials(o)? {
            let material = scene.material(m)?;
            if material.graph.sink().is_none() {
                return Err(BakeError::MissingSink(material.name.clone()).into());
            }
        }
    }
    Ok((active, sources))
}

fn image_spec(config: &BakeConfig, quantity: Quantity, name: String, path: std::path::PathBuf) -> ImageSpec {
    let transparent =
        (quantity == Quantity::Color && config.alpha_to_color) || config.image_alpha;
    let a = if transparent { 0.0 } else { 1.0 };
    let fill = if !transparent && (quantity.is_normal_like() || config.bakes_bump_as_normal(quantity)) {
        FLAT_NORMAL
    } else if quantity == Quantity::Bump {
        [0.5, 0.5, 0.5, a]
    } else {
        [0.0, 0.0, 0.0, a]
    };
    ImageSpec {
        name,
        path,
        resolution: config.resolution,
        fill: Some(fill),
        alpha: transparent,
        color_space: quantity.color_space(),
        format: config.file_format,
    }
}

/// One (object, quantity) cell.
struct Cell<'c> {
    object: ObjectId,
    active: ObjectId,
    materials: &'c [MaterialId],
    quantity: Quantity,
    /// Material created for this object, if any.
    target: Option<MaterialId>,
}

/// Drives a whole bake run over a scene.
pub struct Baker<'a> {
    config: &'a BakeConfig,
    store: &'a mut dyn ImageStore,
    rasterizer: &'a mut dyn Rasterizer,
    /// Materials created during this run. They are never bake sources.
    created: HashSet<MaterialId>,
    report: BakeReport,
}

impl<'a> Baker<'a> {
    pub fn new(
        config: &'a BakeConfig,
        store: &'a mut dyn ImageStore,
        rasterizer: &'a mut dyn Rasterizer,
    ) -> Self {
        Self {
            config,
            store,
            rasterizer,
            created: HashSet::new(),
            report: BakeReport::default(),
        }
    }

    pub fn run(mut self, scene: &mut Scene) -> Result<BakeReport> {
        self.config.validate()?;
        let (active, sources) = check_preconditions(scene, self.config)?;
        tracing::info!(objects = sources.len(), "starting bake");
        for object in sources {
            self.bake_object(scene, object, active)?;
        }
        Ok(self.report)
    }

    fn bake_object(&mut self, scene: &mut Scene, object: ObjectId, active: ObjectId) -> Result<()> {
        let config = self.config;
        let name = scene.object(object)?.name.clone();
        let materials: Vec<MaterialId> = scene
            .object_materials(object)?
            .into_iter()
            .filter(|m| !self.created.contains(m))
            .collect();
        if materials.is_empty() {
            self.report
                .push(Diagnostic::warning(format!("'{name}' has no materials to bake")));
            return Ok(());
        }

        let plan = planner::plan(scene, object, config, &self.created)?;
        for (&quantity, &value) in &plan.constants {
            self.report.constants.push(FoldedConstant {
                object: name.clone(),
                quantity,
                value,
            });
        }

        let target = if config.new_material || config.selected_to_active {
            let owner = if config.selected_to_active { active } else { object };
            let material_name = config.material_name(&scene.object(owner)?.name);
            let id = reassembly::new_material(
                scene,
                &material_name,
                &plan.constants,
                plan.contains(Quantity::Alpha),
            )?;
            scene.assign_material(owner, id)?;
            self.created.insert(id);
            self.report
                .materials_created
                .push(scene.material(id)?.name.clone());
            Some(id)
        } else {
            None
        };

        let mut images = BTreeMap::new();
        for &quantity in &plan.quantities {
            let cell = Cell {
                object,
                active,
                materials: &materials,
                quantity,
                target,
            };
            let image = self.bake_quantity(scene, &name, &cell)?;
            images.insert(quantity, image);
        }

        if config.alpha_to_color {
            if let Some(alpha) = images.get(&Quantity::Alpha).cloned() {
                if let Some(color) = images.get_mut(&Quantity::Color) {
                    self.store.copy_channel(&alpha, 0, color, 3)?;
                    self.store.save(color)?;
                    tracing::debug!(image = %color.name, "merged alpha into colour");
                }
            }
        }

        if config.new_material {
            if let Some(material) = target {
                reassembly::add_images(scene, material, &plan.quantities, &images, config)?;
            }
        }
        Ok(())
    }

    fn bake_quantity(&mut self, scene: &mut Scene, object_name: &str, cell: &Cell<'_>) -> Result<BakeImage> {
        let config = self.config;
        let file_name = config.image_file_name(object_name, cell.quantity);
        let path = self.store.path_for(config, &file_name);
        let spec = image_spec(config, cell.quantity, file_name, path);
        let record = BakedImage {
            object: object_name.to_string(),
            quantity: cell.quantity,
            path: spec.path.clone(),
        };

        if !config.overwrite && self.store.exists(&spec.path) {
            self.report.push(Diagnostic::info(format!(
                "baking skipped for '{}'. File exists.",
                spec.name
            )));
            self.report.skipped.push(record);
            return self.store.load(&spec);
        }

        let mut image = self.store.acquire(&spec)?;
        let mut cycle = BakeCycle::default();
        let outcome = self.run_cycle(scene, &mut cycle, cell, &mut image);
        let restored = cycle.finish(scene);
        outcome?;
        restored?;

        self.store.save(&image)?;
        self.report.baked.push(record);
        Ok(image)
    }

    /// Wire every material of the cell to the bake sink, add the target image nodes and
    /// rasterize. Everything mutated is recorded in `cycle`.
    fn run_cycle(
        &mut self,
        scene: &mut Scene,
        cycle: &mut BakeCycle,
        cell: &Cell<'_>,
        image: &mut BakeImage,
    ) -> Result<()> {
        let config = self.config;
        let q = cell.quantity;
        let bump_as_normal = config.bakes_bump_as_normal(q);

        let mut sources = Vec::new();
        for &m in cell.materials {
            let material = scene.material(m)?;
            let graph = &material.graph;
            let Some(sink) = graph.sink() else {
                bail!(BakeError::MissingSink(material.name.clone()));
            };
            let surface = graph.input(sink, "Surface")?;
            if q != Quantity::Displacement && !graph.is_linked(surface) {
                self.report.push(Diagnostic::warning(format!(
                    "{q}: Surface input missing in material output in \"{}\"",
                    material.name
                )));
                continue;
            }

            let mut resolver = Resolver::new(graph, &material.name, config.resolve_options());
            let resolved = resolver.resolve_quantity(sink, q)?;
            self.report.extend(resolver.into_diagnostics());

            let scratch = cycle.touch(scene, m)?;
            let graph = &mut scene.material_mut(m)?.graph;
            if bump_as_normal {
                let displacement = graph.input(sink, "Displacement")?;
                scratch.wire_to_sink(graph, &resolved, displacement)?;
            } else {
                let (kind, out) = match config.sink_shader {
                    SinkShader::Emission => (NodeKind::EmissionBsdf, "Emission"),
                    SinkShader::Diffuse => (NodeKind::DiffuseBsdf, "BSDF"),
                };
                let shader = scratch.add_node(graph, kind)?;
                let color = graph.input(shader, "Color")?;
                graph.set_input_default(color, Value::Color(BLACK))?;
                scratch.wire_to_sink(graph, &resolved, color)?;
                let out = graph.output(shader, out)?;
                graph.link(out, surface)?;
            }
            sources.push(m);
        }

        let receivers: Vec<MaterialId> = match cell.target {
            Some(target) if config.selected_to_active => vec![target],
            _ => cell.materials.to_vec(),
        };
        let mut active_images = Vec::with_capacity(receivers.len());
        for m in receivers {
            let scratch = cycle.touch(scene, m)?;
            let graph = &mut scene.material_mut(m)?.graph;
            let node = scratch.add_node(
                graph,
                NodeKind::ImageSample {
                    image: Some(image.name.clone()),
                    color_space: q.color_space(),
                },
            )?;
            graph.set_active(node)?;
            active_images.push((m, node));
        }

        let kind = if bump_as_normal {
            BakeKind::Normal
        } else {
            match config.sink_shader {
                SinkShader::Emission => BakeKind::Emit,
                SinkShader::Diffuse => BakeKind::Diffuse,
            }
        };
        let mut objects = vec![cell.object];
        if config.selected_to_active {
            objects.push(cell.active);
        }
        let pass = BakePass {
            kind,
            margin: config.margin,
            clear: config.clear,
            selected_to_active: config.selected_to_active,
            objects,
            sources,
            active_images,
        };

        self.report
            .push(Diagnostic::info(format!("baking... '{}'", image.name)));
        self.rasterizer.bake(scene, &pass, image)?;
        self.report.rasterizer_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn mesh_scene() -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let obj = scene.add_object("Cube", ObjectKind::Mesh);
        scene.objects[obj.0].selected = true;
        scene.active = Some(obj);
        (scene, obj)
    }

    #[test]
    fn active_object_must_be_a_mesh() {
        let mut scene = Scene::new();
        let cam = scene.add_object("Camera", ObjectKind::Camera);
        scene.active = Some(cam);
        let err = check_preconditions(&scene, &BakeConfig::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BakeError>(),
            Some(&BakeError::NotAMesh("Camera".into()))
        );
    }

    #[test]
    fn selected_to_active_needs_two_objects() {
        let (scene, _) = mesh_scene();
        let config = BakeConfig {
            selected_to_active: true,
            ..Default::default()
        };
        let err = check_preconditions(&scene, &config).unwrap_err();
        assert_eq!(err.downcast_ref::<BakeError>(), Some(&BakeError::NotEnoughObjects(1)));
    }

    #[test]
    fn materials_without_sink_are_fatal() {
        let (mut scene, obj) = mesh_scene();
        let m = scene.add_material("Broken", Graph::new());
        scene.assign_material(obj, m).unwrap();
        let err = check_preconditions(&scene, &BakeConfig::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<BakeError>(),
            Some(&BakeError::MissingSink("Broken".into()))
        );
    }

    #[test]
    fn fill_colors_follow_the_quantity() {
        let config = BakeConfig::default();
        let spec = |q| image_spec(&config, q, String::new(), Default::default());
        assert_eq!(spec(Quantity::Normal).fill, Some(FLAT_NORMAL));
        assert_eq!(spec(Quantity::Bump).fill, Some([0.5, 0.5, 0.5, 1.0]));
        assert_eq!(spec(Quantity::Roughness).fill, Some([0.0, 0.0, 0.0, 1.0]));
        let color = spec(Quantity::Color);
        assert_eq!(color.fill, Some([0.0, 0.0, 0.0, 0.0]));
        assert!(color.alpha);

        let bump_normal = BakeConfig {
            bump_to_normal: true,
            ..Default::default()
        };
        let spec = image_spec(&bump_normal, Quantity::Bump, String::new(), Default::default());
        assert_eq!(spec.fill, Some(FLAT_NORMAL));
    }
}
