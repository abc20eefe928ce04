use std::{collections::HashMap, sync::OnceLock};

use anyhow::{Result, anyhow, bail};
use serde::Deserialize;

use crate::color::Value;

const DEFAULT_NODE_SCHEME_JSON: &str = include_str!("../assets/node-scheme.json");

/// Socket layout of every node kind the engine understands.
#[derive(Debug, Clone)]
pub struct NodeScheme {
    pub nodes: HashMap<String, NodeTypeScheme>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawNodeScheme {
    #[serde(rename = "schemaVersion")]
    #[allow(dead_code)]
    pub schema_version: u32,
    #[serde(default)]
    pub nodes: Vec<RawNodeDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawNodeDef {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub inputs: Vec<PortScheme>,
    #[serde(default)]
    pub outputs: Vec<PortScheme>,
}

#[derive(Debug, Clone)]
pub struct NodeTypeScheme {
    pub category: Option<String>,
    pub inputs: Vec<PortScheme>,
    pub outputs: Vec<PortScheme>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketKind {
    Shader,
    Color,
    #[serde(rename = "value")]
    Scalar,
    Vector,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortScheme {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SocketKind,
    #[serde(default)]
    pub default: Option<Value>,
}

impl SocketKind {
    /// Coerce a literal to the shape this socket stores. Shader sockets carry no literal.
    pub fn coerce(self, value: Value) -> Option<Value> {
        match self {
            SocketKind::Shader => None,
            SocketKind::Color => Some(Value::Color(value.to_rgba())),
            SocketKind::Scalar => Some(Value::Scalar(value.to_scalar())),
            SocketKind::Vector => Some(Value::Vector(value.to_vector())),
        }
    }

    pub fn zero(self) -> Option<Value> {
        match self {
            SocketKind::Shader => None,
            SocketKind::Color => Some(Value::Color([0.0, 0.0, 0.0, 1.0])),
            SocketKind::Scalar => Some(Value::Scalar(0.0)),
            SocketKind::Vector => Some(Value::Vector([0.0; 3])),
        }
    }
}

impl PortScheme {
    pub fn default_value(&self) -> Option<Value> {
        match self.default {
            Some(v) => self.kind.coerce(v),
            None => self.kind.zero(),
        }
    }
}

impl NodeScheme {
    pub fn node(&self, node_type: &str) -> Result<&NodeTypeScheme> {
        self.nodes
            .get(node_type)
            .ok_or_else(|| anyhow!("node type missing from scheme: {node_type}"))
    }
}

pub fn parse_scheme(text: &str) -> Result<NodeScheme> {
    let raw: RawNodeScheme =
        serde_json::from_str(text).map_err(|e| anyhow!("invalid node scheme json: {e}"))?;
    let mut nodes = HashMap::new();
    for def in raw.nodes {
        for ports in [&def.inputs, &def.outputs] {
            for (i, p) in ports.iter().enumerate() {
                if ports[..i].iter().any(|q| q.id == p.id) {
                    bail!("duplicate port id '{}' on {}", p.id, def.node_type);
                }
            }
        }
        let prev = nodes.insert(
            def.node_type.clone(),
            NodeTypeScheme {
                category: def.category,
                inputs: def.inputs,
                outputs: def.outputs,
            },
        );
        if prev.is_some() {
            bail!("node type declared twice in scheme: {}", def.node_type);
        }
    }
    Ok(NodeScheme { nodes })
}

/// The bundled scheme, parsed once per process.
pub fn load_default_scheme() -> Result<&'static NodeScheme> {
    static SCHEME: OnceLock<std::result::Result<NodeScheme, String>> = OnceLock::new();
    SCHEME
        .get_or_init(|| parse_scheme(DEFAULT_NODE_SCHEME_JSON).map_err(|e| format!("{e:#}")))
        .as_ref()
        .map_err(|e| anyhow!("failed to load bundled node scheme: {e}"))
}
