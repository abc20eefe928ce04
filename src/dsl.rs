use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::{
    color::Value,
    graph::{ColorSpace, Graph, MathOp, MixBlend, NodeKind},
    scene::{Material, ObjectKind, Scene},
};

/// Node params that configure the node rather than an input socket.
const OPTION_PARAMS: [&str; 6] = ["blend", "operation", "image", "colorSpace", "value", "label"];

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SceneDSL {
    pub version: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub objects: Vec<ObjectDSL>,
    #[serde(default, rename = "activeObject")]
    pub active_object: Option<String>,
    #[serde(default)]
    pub materials: Vec<MaterialDSL>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Metadata {
    pub name: String,
    pub created: Option<String>,
    pub modified: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ObjectDSL {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ObjectKind,
    /// Material slots by material name.
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub selected: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MaterialDSL {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Connection {
    #[serde(default)]
    pub id: String,
    pub from: Endpoint,
    pub to: Endpoint,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Endpoint {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(rename = "portId")]
    pub port_id: String,
}

pub fn load_scene_from_path(path: impl AsRef<Path>) -> Result<SceneDSL> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read DSL json at {}", path.display()))?;
    serde_json::from_str(&text).context("failed to parse DSL json")
}

pub fn save_scene_to_path(scene: &SceneDSL, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(scene).context("failed to serialize DSL json")?;
    std::fs::write(path, text).with_context(|| format!("failed to write DSL json at {}", path.display()))
}

pub fn parse_str<'a>(params: &'a HashMap<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn parse_param<T: serde::de::DeserializeOwned>(
    node: &Node,
    key: &str,
) -> Result<Option<T>> {
    node.params
        .get(key)
        .map(|v| {
            serde_json::from_value(v.clone())
                .with_context(|| format!("invalid param '{key}' on node {}", node.id))
        })
        .transpose()
}

fn node_kind(node: &Node) -> Result<NodeKind> {
    Ok(match node.node_type.as_str() {
        "OutputMaterial" => NodeKind::Sink,
        "BsdfPrincipled" => NodeKind::PrincipledBsdf,
        "BsdfDiffuse" => NodeKind::DiffuseBsdf,
        "BsdfTranslucent" => NodeKind::TranslucentBsdf,
        "Emission" => NodeKind::EmissionBsdf,
        "BsdfTransparent" => NodeKind::TransparentBsdf,
        "MixShader" => NodeKind::MixShader,
        "AddShader" => NodeKind::AddShader,
        "Reroute" => NodeKind::Reroute,
        "NormalMap" => NodeKind::NormalMap,
        "Bump" => NodeKind::Bump,
        "MixRGB" => NodeKind::MixRgb(parse_param::<MixBlend>(node, "blend")?.unwrap_or_default()),
        "Math" => NodeKind::Math(parse_param::<MathOp>(node, "operation")?.unwrap_or_default()),
        "RGB" => NodeKind::RgbConstant,
        "Value" => NodeKind::ValueConstant,
        "TexImage" => NodeKind::ImageSample {
            image: parse_str(&node.params, "image").map(str::to_string),
            color_space: parse_param::<ColorSpace>(node, "colorSpace")?.unwrap_or_default(),
        },
        other => bail!("unknown node type '{other}' (node {})", node.id),
    })
}

impl MaterialDSL {
    /// Build the typed graph. Node ids become node names.
    pub fn to_graph(&self) -> Result<Graph> {
        let mut graph = Graph::new();
        for node in &self.nodes {
            let kind = node_kind(node)?;
            let id = graph
                .add_named_node(kind, node.id.clone())
                .with_context(|| format!("material '{}'", self.name))?;
            graph.node_mut(id)?.label = parse_str(&node.params, "label").map(str::to_string);

            for (key, raw) in &node.params {
                if OPTION_PARAMS.contains(&key.as_str()) {
                    continue;
                }
                let Some(input) = graph.find_input(id, key) else {
                    bail!(
                        "node {} ({}) has no input '{key}' in material '{}'",
                        node.id,
                        node.node_type,
                        self.name
                    );
                };
                let value: Value = serde_json::from_value(raw.clone())
                    .with_context(|| format!("invalid literal for {}.{key}", node.id))?;
                graph.set_input_default(input, value)?;
            }

            // Constant nodes carry their literal on the output.
            if let Some(value) = parse_param::<Value>(node, "value")? {
                let out = match graph.node(id)?.kind {
                    NodeKind::RgbConstant => graph.output(id, "Color")?,
                    NodeKind::ValueConstant => graph.output(id, "Value")?,
                    _ => bail!("param 'value' is only valid on RGB and Value nodes (node {})", node.id),
                };
                graph.set_output_default(out, value)?;
            }
        }

        for c in &self.connections {
            let from_node = graph
                .node_by_name(&c.from.node_id)
                .ok_or_else(|| anyhow!("connection {} references missing node {}", c.id, c.from.node_id))?;
            let to_node = graph
                .node_by_name(&c.to.node_id)
                .ok_or_else(|| anyhow!("connection {} references missing node {}", c.id, c.to.node_id))?;
            let from = graph.output(from_node, &c.from.port_id)?;
            let to = graph.input(to_node, &c.to.port_id)?;
            if graph.is_linked(to) {
                bail!(
                    "input {}.{} has more than one incoming connection in material '{}'",
                    c.to.node_id,
                    c.to.port_id,
                    self.name
                );
            }
            graph.link(from, to)?;
        }

        graph
            .topo_sort()
            .with_context(|| format!("material '{}'", self.name))?;
        Ok(graph)
    }

    pub fn from_material(material: &Material) -> Result<Self> {
        let g = &material.graph;
        let mut nodes = Vec::new();
        for n in g.nodes() {
            let mut params: HashMap<String, serde_json::Value> = HashMap::new();
            match &n.kind {
                NodeKind::MixRgb(blend) => {
                    params.insert("blend".into(), serde_json::to_value(blend)?);
                }
                NodeKind::Math(op) => {
                    params.insert("operation".into(), serde_json::to_value(op)?);
                }
                NodeKind::ImageSample { image, color_space } => {
                    if let Some(image) = image {
                        params.insert("image".into(), serde_json::Value::String(image.clone()));
                    }
                    params.insert("colorSpace".into(), serde_json::to_value(color_space)?);
                }
                NodeKind::RgbConstant | NodeKind::ValueConstant => {
                    if let Some(v) = n.outputs.first().and_then(|s| s.default) {
                        params.insert("value".into(), serde_json::to_value(v)?);
                    }
                }
                _ => {}
            }
            if let Some(label) = &n.label {
                params.insert("label".into(), serde_json::Value::String(label.clone()));
            }
            for s in &n.inputs {
                if let Some(v) = s.default {
                    params.insert(s.id.clone(), serde_json::to_value(v)?);
                }
            }
            nodes.push(Node {
                id: n.name.clone(),
                node_type: n.kind.type_name().to_string(),
                params,
            });
        }

        let mut connections = Vec::new();
        for (i, l) in g.links().iter().enumerate() {
            let from = g.node(l.from.node)?;
            let to = g.node(l.to.node)?;
            connections.push(Connection {
                id: format!("c{i}"),
                from: Endpoint {
                    node_id: from.name.clone(),
                    port_id: g.output_socket(l.from)?.id.clone(),
                },
                to: Endpoint {
                    node_id: to.name.clone(),
                    port_id: g.input_socket(l.to)?.id.clone(),
                },
            });
        }

        Ok(MaterialDSL {
            name: material.name.clone(),
            nodes,
            connections,
        })
    }
}

impl SceneDSL {
    pub fn into_scene(&self) -> Result<Scene> {
        let mut scene = Scene::new();
        for m in &self.materials {
            if scene.material_by_name(&m.name).is_some() {
                bail!("duplicate material name: {}", m.name);
            }
            let graph = m.to_graph()?;
            scene.add_material(m.name.clone(), graph);
        }
        for o in &self.objects {
            if scene.object_by_name(&o.name).is_some() {
                bail!("duplicate object name: {}", o.name);
            }
            let id = scene.add_object(o.name.clone(), o.kind);
            scene.object_mut(id)?.selected = o.selected;
            for name in &o.materials {
                let mat = scene
                    .material_by_name(name)
                    .ok_or_else(|| anyhow!("object {} references missing material {name}", o.name))?;
                scene.assign_material(id, mat)?;
            }
        }
        if let Some(active) = &self.active_object {
            scene.active = Some(
                scene
                    .object_by_name(active)
                    .ok_or_else(|| anyhow!("activeObject references missing object {active}"))?,
            );
        }
        Ok(scene)
    }
}

impl Scene {
    pub fn to_dsl(&self, metadata: Metadata) -> Result<SceneDSL> {
        let mut materials = Vec::with_capacity(self.materials.len());
        for m in &self.materials {
            materials.push(MaterialDSL::from_material(m)?);
        }
        let mut objects = Vec::with_capacity(self.objects.len());
        for o in &self.objects {
            let mut names = Vec::with_capacity(o.materials.len());
            for &m in &o.materials {
                names.push(self.material(m)?.name.clone());
            }
            objects.push(ObjectDSL {
                name: o.name.clone(),
                kind: o.kind,
                materials: names,
                selected: o.selected,
            });
        }
        let active_object = match self.active {
            Some(id) => Some(self.object(id)?.name.clone()),
            None => None,
        };
        Ok(SceneDSL {
            version: "1".into(),
            metadata,
            objects,
            active_object,
            materials,
        })
    }
}
