//! Typed node/socket/link graph of one material.
//!
//! Nodes live in an append-only slot arena, so a [`NodeId`] stays valid (and never gets
//! reused) for the lifetime of the graph even when other nodes are removed. An input
//! socket holds at most one incoming [`Link`]; linking into an occupied input replaces
//! the previous link.

mod eval;

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::{
    color::Value,
    schema::{self, SocketKind},
};

pub use eval::{eval_input, eval_output};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// An output socket, addressed by node and socket index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    pub node: NodeId,
    pub socket: usize,
}

/// An input socket, addressed by node and socket index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputRef {
    pub node: NodeId,
    pub socket: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Link {
    pub from: OutputRef,
    pub to: InputRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MixBlend {
    #[default]
    #[serde(rename = "MIX")]
    Mix,
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "MULTIPLY")]
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MathOp {
    #[default]
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "SUBTRACT")]
    Subtract,
    #[serde(rename = "MULTIPLY")]
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    #[serde(rename = "sRGB")]
    Srgb,
    #[serde(rename = "Non-Color")]
    NonColor,
}

/// The closed set of node kinds the engine understands.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Sink,
    PrincipledBsdf,
    DiffuseBsdf,
    TranslucentBsdf,
    EmissionBsdf,
    TransparentBsdf,
    MixShader,
    AddShader,
    Reroute,
    NormalMap,
    Bump,
    MixRgb(MixBlend),
    Math(MathOp),
    RgbConstant,
    ValueConstant,
    ImageSample {
        image: Option<String>,
        color_space: ColorSpace,
    },
}

impl NodeKind {
    /// Name of this kind in the node scheme and the scene DSL.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Sink => "OutputMaterial",
            NodeKind::PrincipledBsdf => "BsdfPrincipled",
            NodeKind::DiffuseBsdf => "BsdfDiffuse",
            NodeKind::TranslucentBsdf => "BsdfTranslucent",
            NodeKind::EmissionBsdf => "Emission",
            NodeKind::TransparentBsdf => "BsdfTransparent",
            NodeKind::MixShader => "MixShader",
            NodeKind::AddShader => "AddShader",
            NodeKind::Reroute => "Reroute",
            NodeKind::NormalMap => "NormalMap",
            NodeKind::Bump => "Bump",
            NodeKind::MixRgb(_) => "MixRGB",
            NodeKind::Math(_) => "Math",
            NodeKind::RgbConstant => "RGB",
            NodeKind::ValueConstant => "Value",
            NodeKind::ImageSample { .. } => "TexImage",
        }
    }

    /// BSDF-like nodes whose inputs are terminal for value resolution.
    pub fn is_surface_bsdf(&self) -> bool {
        matches!(
            self,
            NodeKind::PrincipledBsdf
                | NodeKind::DiffuseBsdf
                | NodeKind::TranslucentBsdf
                | NodeKind::EmissionBsdf
        )
    }

    pub fn same_kind(&self, other: &NodeKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Socket {
    pub id: String,
    pub kind: SocketKind,
    /// Literal used while the socket is unlinked. `None` for shader sockets.
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub label: Option<String>,
    pub kind: NodeKind,
    pub inputs: Vec<Socket>,
    pub outputs: Vec<Socket>,
    scratch: bool,
}

impl Node {
    pub fn input_index(&self, socket_id: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.id == socket_id)
    }

    pub fn output_index(&self, socket_id: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.id == socket_id)
    }

    /// Created by the synthesizer for a single bake cycle.
    pub fn is_scratch(&self) -> bool {
        self.scratch
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    links: Vec<Link>,
    active: Option<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node of `kind`, instantiating its sockets from the node scheme.
    pub fn add_node(&mut self, kind: NodeKind) -> Result<NodeId> {
        let name = format!("{}.{}", kind.type_name(), self.nodes.len());
        self.insert_node(kind, name, false)
    }

    pub fn add_named_node(&mut self, kind: NodeKind, name: impl Into<String>) -> Result<NodeId> {
        let name = name.into();
        if self.node_by_name(&name).is_some() {
            bail!("duplicate node name: {name}");
        }
        self.insert_node(kind, name, false)
    }

    pub(crate) fn add_scratch_node(&mut self, kind: NodeKind) -> Result<NodeId> {
        let name = format!("pb.scratch.{}.{}", kind.type_name(), self.nodes.len());
        self.insert_node(kind, name, true)
    }

    fn insert_node(&mut self, kind: NodeKind, name: String, scratch: bool) -> Result<NodeId> {
        let scheme = schema::load_default_scheme()?.node(kind.type_name())?;
        let sockets = |ports: &[schema::PortScheme]| -> Vec<Socket> {
            ports
                .iter()
                .map(|p| Socket {
                    id: p.id.clone(),
                    kind: p.kind,
                    default: p.default_value(),
                })
                .collect()
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node {
            id,
            name,
            label: None,
            inputs: sockets(&scheme.inputs),
            outputs: sockets(&scheme.outputs),
            kind,
            scratch,
        }));
        Ok(id)
    }

    /// Remove a node and every link touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let slot = self
            .nodes
            .get_mut(id.0)
            .ok_or_else(|| anyhow!("node not found: {id:?}"))?;
        let node = slot.take().ok_or_else(|| anyhow!("node already removed: {id:?}"))?;
        self.links.retain(|l| l.from.node != id && l.to.node != id);
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(node)
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| anyhow!("node not found: {id:?}"))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| anyhow!("node not found: {id:?}"))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    pub fn scratch_count(&self) -> usize {
        self.nodes().filter(|n| n.scratch).count()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes().find(|n| n.name == name).map(|n| n.id)
    }

    /// The material output node. The first one wins when several exist.
    pub fn sink(&self) -> Option<NodeId> {
        self.nodes()
            .find(|n| n.kind == NodeKind::Sink && !n.scratch)
            .map(|n| n.id)
    }

    pub fn input(&self, node: NodeId, socket_id: &str) -> Result<InputRef> {
        let n = self.node(node)?;
        let socket = n
            .input_index(socket_id)
            .ok_or_else(|| anyhow!("{} ({}) has no input '{socket_id}'", n.name, n.kind.type_name()))?;
        Ok(InputRef { node, socket })
    }

    pub fn output(&self, node: NodeId, socket_id: &str) -> Result<OutputRef> {
        let n = self.node(node)?;
        let socket = n
            .output_index(socket_id)
            .ok_or_else(|| anyhow!("{} ({}) has no output '{socket_id}'", n.name, n.kind.type_name()))?;
        Ok(OutputRef { node, socket })
    }

    /// Like [`Graph::input`], but a missing socket is not an error.
    pub fn find_input(&self, node: NodeId, socket_id: &str) -> Option<InputRef> {
        let socket = self.node(node).ok()?.input_index(socket_id)?;
        Some(InputRef { node, socket })
    }

    pub fn input_socket(&self, input: InputRef) -> Result<&Socket> {
        let n = self.node(input.node)?;
        n.inputs
            .get(input.socket)
            .ok_or_else(|| anyhow!("{} has no input #{}", n.name, input.socket))
    }

    pub fn output_socket(&self, output: OutputRef) -> Result<&Socket> {
        let n = self.node(output.node)?;
        n.outputs
            .get(output.socket)
            .ok_or_else(|| anyhow!("{} has no output #{}", n.name, output.socket))
    }

    pub fn set_input_default(&mut self, input: InputRef, value: Value) -> Result<()> {
        let n = self.node_mut(input.node)?;
        let name = n.name.clone();
        let socket = n
            .inputs
            .get_mut(input.socket)
            .ok_or_else(|| anyhow!("{name} has no input #{}", input.socket))?;
        socket.default = Some(
            socket
                .kind
                .coerce(value)
                .ok_or_else(|| anyhow!("shader input {name}.{} takes no literal", socket.id))?,
        );
        Ok(())
    }

    pub fn set_output_default(&mut self, output: OutputRef, value: Value) -> Result<()> {
        let n = self.node_mut(output.node)?;
        let name = n.name.clone();
        let socket = n
            .outputs
            .get_mut(output.socket)
            .ok_or_else(|| anyhow!("{name} has no output #{}", output.socket))?;
        socket.default = socket.kind.coerce(value);
        Ok(())
    }

    /// Connect `from` to `to`, replacing any link already feeding `to`.
    pub fn link(&mut self, from: OutputRef, to: InputRef) -> Result<()> {
        self.output_socket(from)?;
        self.input_socket(to)?;
        if from.node == to.node {
            bail!("refusing to link node {:?} to itself", from.node);
        }
        self.links.retain(|l| l.to != to);
        self.links.push(Link { from, to });
        Ok(())
    }

    pub fn unlink(&mut self, to: InputRef) -> Option<Link> {
        let idx = self.links.iter().position(|l| l.to == to)?;
        Some(self.links.remove(idx))
    }

    pub fn incoming(&self, to: InputRef) -> Option<OutputRef> {
        self.links.iter().find(|l| l.to == to).map(|l| l.from)
    }

    pub fn is_linked(&self, to: InputRef) -> bool {
        self.incoming(to).is_some()
    }

    /// Kind of the node producing the value of `to`, if linked.
    pub fn producer_kind(&self, to: InputRef) -> Option<&NodeKind> {
        let from = self.incoming(to)?;
        self.node(from.node).ok().map(|n| &n.kind)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Snapshot of every link, independent of insertion order.
    pub fn topology(&self) -> BTreeSet<Link> {
        self.links.iter().copied().collect()
    }

    pub fn set_active(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        self.active = Some(id);
        Ok(())
    }

    pub fn active(&self) -> Option<NodeId> {
        self.active
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    pub fn topo_sort(&self) -> Result<Vec<NodeId>> {
        let mut indeg: HashMap<NodeId, usize> = self.nodes().map(|n| (n.id, 0usize)).collect();
        let mut outgoing: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for l in &self.links {
            *indeg
                .get_mut(&l.to.node)
                .ok_or_else(|| anyhow!("link references missing node: {:?}", l.to.node))? += 1;
            outgoing.entry(l.from.node).or_default().push(l.to.node);
        }

        let mut q: VecDeque<NodeId> = indeg
            .iter()
            .filter_map(|(id, d)| if *d == 0 { Some(*id) } else { None })
            .collect();
        let mut order: Vec<NodeId> = Vec::with_capacity(indeg.len());

        while let Some(n) = q.pop_front() {
            order.push(n);
            if let Some(nexts) = outgoing.get(&n) {
                for m in nexts {
                    if let Some(entry) = indeg.get_mut(m) {
                        *entry -= 1;
                        if *entry == 0 {
                            q.push_back(*m);
                        }
                    }
                }
            }
        }

        if order.len() != indeg.len() {
            bail!("cycle detected in node graph (cannot topologically sort)");
        }
        Ok(order)
    }

    /// Every node that feeds `start`, directly or transitively, including `start`.
    pub fn upstream_reachable(&self, start: NodeId) -> HashSet<NodeId> {
        let mut incoming: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for l in &self.links {
            incoming.entry(l.to.node).or_default().push(l.from.node);
        }

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = vec![start];
        while let Some(n) = stack.pop() {
            if !visited.insert(n) {
                continue;
            }
            if let Some(prevs) = incoming.get(&n) {
                stack.extend(prevs.iter().copied());
            }
        }
        visited
    }
}
