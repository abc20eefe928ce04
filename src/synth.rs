//! Emits the nodes described by a resolved [`Expr`] into a material graph.
//!
//! Every node created here is tagged scratch and recorded in a [`Scratch`] set owned by
//! the current bake cycle, which removes them again in [`Scratch::teardown`].

use anyhow::{Result, bail};

use crate::{
    color::Value,
    graph::{Graph, InputRef, MathOp, MixBlend, NodeId, NodeKind, OutputRef},
    resolver::{Expr, ResolvedQuantity},
};

/// Handles of the nodes synthesized during one bake cycle.
#[derive(Debug, Default)]
pub struct Scratch {
    nodes: Vec<NodeId>,
}

impl Scratch {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Allocate a scratch node and remember it for teardown.
    pub fn add_node(&mut self, graph: &mut Graph, kind: NodeKind) -> Result<NodeId> {
        let id = graph.add_scratch_node(kind)?;
        self.nodes.push(id);
        Ok(id)
    }

    /// Link the resolved quantity into `target`. A constant always gets its own node so
    /// the target never depends on its own literal.
    pub fn wire_to_sink(
        &mut self,
        graph: &mut Graph,
        resolved: &ResolvedQuantity,
        target: InputRef,
    ) -> Result<OutputRef> {
        let out = match resolved {
            ResolvedQuantity::Constant(v) => self.constant(graph, *v)?,
            ResolvedQuantity::Expression(e) => self.emit(graph, e)?,
        };
        graph.link(out, target)?;
        Ok(out)
    }

    /// Emit `expr` and return the output socket computing it.
    pub fn emit(&mut self, graph: &mut Graph, expr: &Expr) -> Result<OutputRef> {
        match expr {
            Expr::Socket(out) => {
                if !graph.contains(out.node) {
                    bail!("expression references a removed node: {:?}", out.node);
                }
                Ok(*out)
            }
            Expr::Constant(v) => self.constant(graph, *v),
            Expr::Mix { factor, a, b } => {
                let node = self.add_node(graph, NodeKind::MixRgb(MixBlend::Mix))?;
                let fac = graph.input(node, "Fac")?;
                let (c1, c2) = (graph.input(node, "Color1")?, graph.input(node, "Color2")?);
                self.feed(graph, factor, fac)?;
                self.feed(graph, a, c1)?;
                self.feed(graph, b, c2)?;
                graph.output(node, "Color")
            }
            Expr::Add { a, b } => {
                let node = self.add_node(graph, NodeKind::MixRgb(MixBlend::Add))?;
                let fac = graph.input(node, "Fac")?;
                let (c1, c2) = (graph.input(node, "Color1")?, graph.input(node, "Color2")?);
                graph.set_input_default(fac, Value::Scalar(1.0))?;
                self.feed(graph, a, c1)?;
                self.feed(graph, b, c2)?;
                graph.output(node, "Color")
            }
            Expr::Multiply { a, b } => {
                let node = self.add_node(graph, NodeKind::Math(MathOp::Multiply))?;
                let (v0, v1) = (graph.input(node, "Value")?, graph.input(node, "Value.001")?);
                self.feed(graph, a, v0)?;
                self.feed(graph, b, v1)?;
                graph.output(node, "Value")
            }
            Expr::Reroute(inner) => {
                let node = self.add_node(graph, NodeKind::Reroute)?;
                let src = self.emit(graph, inner)?;
                let input = graph.input(node, "Input")?;
                graph.link(src, input)?;
                graph.output(node, "Output")
            }
        }
    }

    /// Operand of a combinator: literals land on the input socket, anything else is
    /// emitted and linked.
    fn feed(&mut self, graph: &mut Graph, expr: &Expr, input: InputRef) -> Result<()> {
        match expr {
            Expr::Constant(v) => graph.set_input_default(input, *v),
            other => {
                let src = self.emit(graph, other)?;
                graph.link(src, input)
            }
        }
    }

    fn constant(&mut self, graph: &mut Graph, value: Value) -> Result<OutputRef> {
        let (kind, socket) = match value {
            Value::Scalar(_) => (NodeKind::ValueConstant, "Value"),
            Value::Color(_) | Value::Vector(_) => (NodeKind::RgbConstant, "Color"),
        };
        let node = self.add_node(graph, kind)?;
        let out = graph.output(node, socket)?;
        graph.set_output_default(out, value)?;
        Ok(out)
    }

    /// Remove every node this cycle created, along with their links.
    pub fn teardown(self, graph: &mut Graph) -> Result<()> {
        for id in self.nodes {
            if graph.contains(id) {
                graph.remove_node(id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::eval_input;

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
    const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

    #[test]
    fn constants_get_their_own_node() {
        let mut g = Graph::new();
        let emit = g.add_node(NodeKind::EmissionBsdf).unwrap();
        let color = g.input(emit, "Color").unwrap();
        let mut scratch = Scratch::default();
        scratch
            .wire_to_sink(&mut g, &ResolvedQuantity::Constant(Value::Scalar(0.25)), color)
            .unwrap();
        assert_eq!(scratch.nodes().len(), 1);
        assert_eq!(g.producer_kind(color), Some(&NodeKind::ValueConstant));
        assert_eq!(eval_input(&g, color), Some(Value::Scalar(0.25)));
    }

    #[test]
    fn mix_operands_become_socket_literals() {
        let mut g = Graph::new();
        let emit = g.add_node(NodeKind::EmissionBsdf).unwrap();
        let color = g.input(emit, "Color").unwrap();
        let expr = Expr::mix(
            Expr::Constant(Value::Scalar(0.3)),
            Expr::Constant(Value::Color(RED)),
            Expr::Constant(Value::Color(BLUE)),
        );
        let mut scratch = Scratch::default();
        let out = scratch
            .wire_to_sink(&mut g, &ResolvedQuantity::Expression(expr.clone()), color)
            .unwrap();
        assert_eq!(scratch.nodes().len(), expr.synthesized_nodes());

        let mix = g.node(out.node).unwrap();
        assert_eq!(mix.kind, NodeKind::MixRgb(MixBlend::Mix));
        let lit = |id: &str| g.input_socket(g.input(out.node, id).unwrap()).unwrap().default;
        assert_eq!(lit("Fac"), Some(Value::Scalar(0.3)));
        assert_eq!(lit("Color1"), Some(Value::Color(RED)));
        assert_eq!(lit("Color2"), Some(Value::Color(BLUE)));
    }

    #[test]
    fn socket_operands_are_relinked() {
        let mut g = Graph::new();
        let fac = g.add_node(NodeKind::ValueConstant).unwrap();
        let tex = g
            .add_node(NodeKind::ImageSample { image: None, color_space: Default::default() })
            .unwrap();
        let emit = g.add_node(NodeKind::EmissionBsdf).unwrap();
        let fac_out = g.output(fac, "Value").unwrap();
        let tex_out = g.output(tex, "Color").unwrap();
        let expr = Expr::mix(
            Expr::Socket(fac_out),
            Expr::Constant(Value::Color(RED)),
            Expr::Socket(tex_out),
        );
        let mut scratch = Scratch::default();
        let out = scratch.emit(&mut g, &expr).unwrap();
        g.link(out, g.input(emit, "Color").unwrap()).unwrap();
        assert_eq!(g.incoming(g.input(out.node, "Fac").unwrap()), Some(fac_out));
        assert_eq!(g.incoming(g.input(out.node, "Color2").unwrap()), Some(tex_out));
    }

    #[test]
    fn teardown_restores_the_original_topology() {
        let mut g = Graph::new();
        let tex = g
            .add_node(NodeKind::ImageSample { image: None, color_space: Default::default() })
            .unwrap();
        let emit = g.add_node(NodeKind::EmissionBsdf).unwrap();
        let before = g.topology();
        let nodes_before = g.node_count();

        let expr = Expr::Reroute(Box::new(Expr::multiply(
            Expr::Socket(g.output(tex, "Color").unwrap()),
            Expr::Constant(Value::Scalar(2.0)),
        )));
        let color = g.input(emit, "Color").unwrap();
        let mut scratch = Scratch::default();
        scratch
            .wire_to_sink(&mut g, &ResolvedQuantity::Expression(expr), color)
            .unwrap();
        assert_eq!(g.scratch_count(), 2);
        g.unlink(color);
        scratch.teardown(&mut g).unwrap();
        assert_eq!(g.scratch_count(), 0);
        assert_eq!(g.node_count(), nodes_before);
        assert_eq!(g.topology(), before);
    }
}
