mod common;

use common::{MemoryStore, cases_root, load_case};
use principled_baker::{
    bake::{Baker, FlatRasterizer},
    config::BakeConfig,
    dsl::{self, SceneDSL},
    graph::NodeKind,
    quantity::Quantity,
    scene::ObjectKind,
};

#[test]
fn fixtures_load_into_typed_scenes() {
    let scene = load_case("layered.json");
    assert_eq!(scene.objects.len(), 2);
    let panel = scene.object_by_name("Panel").unwrap();
    assert_eq!(scene.active, Some(panel));
    assert_eq!(scene.object(panel).unwrap().materials.len(), 2);
    let camera = scene.object_by_name("Camera").unwrap();
    assert_eq!(scene.object(camera).unwrap().kind, ObjectKind::Camera);
    assert_eq!(scene.selected_meshes(), vec![panel]);

    let paint = scene.material_by_name("Paint").unwrap();
    let g = &scene.material(paint).unwrap().graph;
    let rough = g.node(g.node_by_name("rough").unwrap()).unwrap();
    assert_eq!(rough.kind, NodeKind::ImageSample {
        image: Some("paint_rough.png".into()),
        color_space: principled_baker::graph::ColorSpace::NonColor,
    });
}

#[test]
fn references_to_missing_objects_and_materials_fail() {
    let text = std::fs::read_to_string(cases_root().join("layered.json")).unwrap();

    let mut doc: SceneDSL = serde_json::from_str(&text).unwrap();
    doc.active_object = Some("Nope".into());
    let err = doc.into_scene().unwrap_err();
    assert!(format!("{err:#}").contains("Nope"));

    let mut doc: SceneDSL = serde_json::from_str(&text).unwrap();
    doc.objects[0].materials.push("Ghost".into());
    assert!(doc.into_scene().is_err());

    let mut doc: SceneDSL = serde_json::from_str(&text).unwrap();
    doc.materials[0].connections[0].from.node_id = "missing".into();
    let err = doc.into_scene().unwrap_err();
    assert!(format!("{err:#}").contains("missing"));
}

#[test]
fn baked_scene_exports_and_reloads() {
    let mut scene = load_case("transparent_mix.json");
    let config = BakeConfig {
        resolution: 2,
        new_material: true,
        enabled: [Quantity::Alpha, Quantity::Normal].into_iter().collect(),
        ..Default::default()
    };
    let mut store = MemoryStore::default();
    let mut rasterizer = FlatRasterizer;
    Baker::new(&config, &mut store, &mut rasterizer)
        .run(&mut scene)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    let doc = scene.to_dsl(Default::default()).unwrap();
    dsl::save_scene_to_path(&doc, &path).unwrap();

    let reloaded = dsl::load_scene_from_path(&path).unwrap().into_scene().unwrap();
    assert_eq!(reloaded.materials.len(), 2);
    let created = reloaded.material_by_name("Cube").unwrap();
    let g = &reloaded.material(created).unwrap().graph;
    let bsdf = g.node_by_name("Principled BSDF").unwrap();
    assert_eq!(
        g.producer_kind(g.input(bsdf, "Normal").unwrap()),
        Some(&NodeKind::NormalMap)
    );
    let tex = g.node(g.node_by_name("Normal Texture").unwrap()).unwrap();
    assert_eq!(tex.label.as_deref(), Some("Normal"));

    let cube = reloaded.object_by_name("Cube").unwrap();
    assert_eq!(reloaded.object(cube).unwrap().materials.len(), 2);
}
