use anyhow::Result;

use super::{
    expr::{Expr, ResolvedQuantity},
    surface::Resolver,
};
use crate::{
    color::{BLACK, Value, WHITE},
    graph::{InputRef, NodeId, NodeKind},
};

impl Resolver<'_> {
    /// Build the opacity factor chain of the sink's surface.
    ///
    /// White is opaque. At every MixShader a bare transparent operand pins its slot to
    /// black; any other operand contributes its nested factor chain, or white when it has
    /// none.
    pub fn resolve_alpha(&mut self, sink: NodeId) -> Result<Option<Expr>> {
        let surface = self.graph.input(sink, "Surface")?;
        self.alpha_input(surface)
    }

    /// Like [`Resolver::resolve_alpha`], but never empty: a surface without any mix is
    /// fully opaque, unless the surface itself is transparent.
    pub(super) fn resolve_alpha_quantity(&mut self, sink: NodeId) -> Result<ResolvedQuantity> {
        if let Some(expr) = self.resolve_alpha(sink)? {
            return Ok(ResolvedQuantity::from_expr(expr));
        }
        let surface = self.graph.input(sink, "Surface")?;
        let value = if self.is_bare_transparent(surface)? { BLACK } else { WHITE };
        Ok(ResolvedQuantity::Constant(Value::Color(value)))
    }

    fn alpha_input(&mut self, input: InputRef) -> Result<Option<Expr>> {
        let Some(from) = self.graph.incoming(input) else {
            return Ok(None);
        };
        let graph = self.graph;
        let node = graph.node(from.node)?;
        match node.kind {
            NodeKind::Reroute => {
                let inner = self.alpha_input(graph.input(node.id, "Input")?)?;
                Ok(inner.map(|e| Expr::Reroute(Box::new(e))))
            }
            NodeKind::MixShader => {
                let factor = self.literal_or_socket(graph.input(node.id, "Fac")?)?;
                let slots = [
                    graph.input(node.id, "Shader")?,
                    graph.input(node.id, "Shader.001")?,
                ];
                let a = self.alpha_operand(slots[0])?;
                let b = self.alpha_operand(slots[1])?;
                Ok(Some(Expr::mix(factor, a, b)))
            }
            _ => Ok(None),
        }
    }

    fn alpha_operand(&mut self, slot: InputRef) -> Result<Expr> {
        let placement = if self.is_bare_transparent(slot)? { BLACK } else { WHITE };
        Ok(self
            .alpha_input(slot)?
            .unwrap_or(Expr::Constant(Value::Color(placement))))
    }

    /// The input is fed by a TransparentBSDF, possibly through reroutes.
    fn is_bare_transparent(&self, input: InputRef) -> Result<bool> {
        let mut current = input;
        loop {
            let Some(from) = self.graph.incoming(current) else {
                return Ok(false);
            };
            let node = self.graph.node(from.node)?;
            match node.kind {
                NodeKind::TransparentBsdf => return Ok(true),
                NodeKind::Reroute => current = self.graph.input(node.id, "Input")?,
                _ => return Ok(false),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        color::{BLACK, Value, WHITE},
        graph::{Graph, NodeId, NodeKind, eval_input},
        quantity::Quantity,
        resolver::{Expr, ResolveOptions, ResolvedQuantity, Resolver},
        synth::Scratch,
    };

    fn link(g: &mut Graph, from: NodeId, out: &str, to: NodeId, input: &str) {
        let o = g.output(from, out).unwrap();
        let i = g.input(to, input).unwrap();
        g.link(o, i).unwrap();
    }

    fn transparency_mix(g: &mut Graph, transparent_slot: &str, other_slot: &str) -> NodeId {
        let sink = g.add_node(NodeKind::Sink).unwrap();
        let mix = g.add_node(NodeKind::MixShader).unwrap();
        let diffuse = g.add_node(NodeKind::DiffuseBsdf).unwrap();
        let transparent = g.add_node(NodeKind::TransparentBsdf).unwrap();
        let fac = g.input(mix, "Fac").unwrap();
        g.set_input_default(fac, Value::Scalar(0.3)).unwrap();
        link(g, diffuse, "BSDF", mix, other_slot);
        link(g, transparent, "BSDF", mix, transparent_slot);
        link(g, mix, "Shader", sink, "Surface");
        sink
    }

    #[test]
    fn transparent_on_slot_two_puts_white_first() {
        let mut g = Graph::new();
        let sink = transparency_mix(&mut g, "Shader.001", "Shader");
        let mut r = Resolver::new(&g, "m", ResolveOptions::default());
        assert_eq!(
            r.resolve_alpha(sink).unwrap(),
            Some(Expr::mix(
                Expr::Constant(Value::Scalar(0.3)),
                Expr::Constant(Value::Color(WHITE)),
                Expr::Constant(Value::Color(BLACK)),
            ))
        );
    }

    #[test]
    fn transparent_on_slot_one_puts_black_first() {
        let mut g = Graph::new();
        let sink = transparency_mix(&mut g, "Shader", "Shader.001");
        let mut r = Resolver::new(&g, "m", ResolveOptions::default());
        assert_eq!(
            r.resolve_alpha(sink).unwrap(),
            Some(Expr::mix(
                Expr::Constant(Value::Scalar(0.3)),
                Expr::Constant(Value::Color(BLACK)),
                Expr::Constant(Value::Color(WHITE)),
            ))
        );
    }

    #[test]
    fn nested_mixes_build_a_chain() {
        let mut g = Graph::new();
        let sink = transparency_mix(&mut g, "Shader.001", "Shader");
        let outer = g.add_node(NodeKind::MixShader).unwrap();
        let other = g.add_node(NodeKind::PrincipledBsdf).unwrap();
        let inner_out = g.incoming(g.input(sink, "Surface").unwrap()).unwrap();
        g.link(inner_out, g.input(outer, "Shader").unwrap()).unwrap();
        link(&mut g, other, "BSDF", outer, "Shader.001");
        link(&mut g, outer, "Shader", sink, "Surface");

        let mut r = Resolver::new(&g, "m", ResolveOptions::default());
        let chain = r.resolve_alpha(sink).unwrap().unwrap();
        let Expr::Mix { a, b, .. } = chain else {
            panic!("expected a mix");
        };
        assert!(matches!(*a, Expr::Mix { .. }));
        assert_eq!(*b, Expr::Constant(Value::Color(WHITE)));
    }

    #[test]
    fn opaque_surface_has_constant_full_alpha() {
        let mut g = Graph::new();
        let sink = g.add_node(NodeKind::Sink).unwrap();
        let bsdf = g.add_node(NodeKind::PrincipledBsdf).unwrap();
        link(&mut g, bsdf, "BSDF", sink, "Surface");
        let mut r = Resolver::new(&g, "m", ResolveOptions::default());
        assert_eq!(
            r.resolve_quantity(sink, Quantity::Alpha).unwrap(),
            ResolvedQuantity::Constant(Value::Color(WHITE))
        );
    }

    #[test]
    fn bare_transparent_surface_has_zero_alpha() {
        let mut g = Graph::new();
        let sink = g.add_node(NodeKind::Sink).unwrap();
        let t = g.add_node(NodeKind::TransparentBsdf).unwrap();
        let reroute = g.add_node(NodeKind::Reroute).unwrap();
        link(&mut g, t, "BSDF", reroute, "Input");
        link(&mut g, reroute, "Output", sink, "Surface");
        let mut r = Resolver::new(&g, "m", ResolveOptions::default());
        assert_eq!(
            r.resolve_quantity(sink, Quantity::Alpha).unwrap(),
            ResolvedQuantity::Constant(Value::Color(BLACK))
        );
    }

    #[test]
    fn synthesized_chain_evaluates_to_opacity() {
        let mut g = Graph::new();
        let sink = transparency_mix(&mut g, "Shader.001", "Shader");
        let resolved = Resolver::new(&g, "m", ResolveOptions::default())
            .resolve_quantity(sink, Quantity::Alpha)
            .unwrap();
        let mut scratch = Scratch::default();
        let emission = g.add_node(NodeKind::EmissionBsdf).unwrap();
        let color = g.input(emission, "Color").unwrap();
        scratch.wire_to_sink(&mut g, &resolved, color).unwrap();
        let v = eval_input(&g, color).unwrap().to_scalar();
        assert!((v - 0.7).abs() < 1e-6, "got {v}");
        scratch.teardown(&mut g).unwrap();
        assert_eq!(g.scratch_count(), 0);
    }
}
