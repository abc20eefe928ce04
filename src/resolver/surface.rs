use anyhow::Result;

use super::expr::{Expr, ResolvedQuantity};
use crate::{
    color::{FLAT_NORMAL, Value},
    graph::{Graph, InputRef, Node, NodeId, NodeKind, OutputRef},
    quantity::Quantity,
    report::Diagnostic,
};

/// Per-run switches that change how bump and normal maps are flattened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Blend the resolved normal towards the flat normal by the NormalMap strength.
    pub use_normal_strength: bool,
    /// Multiply the resolved height by the Bump strength.
    pub use_bump_strength: bool,
}

/// Read-only resolver over one material's graph.
///
/// Soft failures (a bump or normal map with nothing feeding it) are collected as
/// warnings and resolve to `None`; they never abort resolution.
pub struct Resolver<'a> {
    pub(super) graph: &'a Graph,
    pub(super) material: &'a str,
    options: ResolveOptions,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a Graph, material: &'a str, options: ResolveOptions) -> Self {
        Self {
            graph,
            material,
            options,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub(super) fn warn(&mut self, message: String) {
        self.diagnostics.push(Diagnostic::warning(message));
    }

    /// Resolve `quantity` from the sink node, substituting the quantity's neutral value
    /// when nothing contributes.
    pub fn resolve_quantity(&mut self, sink: NodeId, quantity: Quantity) -> Result<ResolvedQuantity> {
        if quantity == Quantity::Alpha {
            return self.resolve_alpha_quantity(sink);
        }
        Ok(match self.resolve_sink(sink, quantity)? {
            Some(expr) => ResolvedQuantity::from_expr(expr),
            None => ResolvedQuantity::Constant(quantity.neutral()),
        })
    }

    /// Descend from the sink into Surface, or into Displacement for that quantity.
    pub fn resolve_sink(&mut self, sink: NodeId, quantity: Quantity) -> Result<Option<Expr>> {
        match quantity {
            Quantity::Alpha => self.resolve_alpha(sink),
            Quantity::Displacement => {
                let input = self.graph.input(sink, "Displacement")?;
                Ok(self.graph.incoming(input).map(Expr::Socket))
            }
            _ => {
                let input = self.graph.input(sink, "Surface")?;
                self.resolve(input, quantity)
            }
        }
    }

    /// Resolve whatever feeds `input`. `None` means "use the literal default".
    pub fn resolve(&mut self, input: InputRef, quantity: Quantity) -> Result<Option<Expr>> {
        match self.graph.incoming(input) {
            Some(from) => self.resolve_output(from, quantity),
            None => Ok(None),
        }
    }

    fn resolve_output(&mut self, output: OutputRef, quantity: Quantity) -> Result<Option<Expr>> {
        let graph = self.graph;
        let node = graph.node(output.node)?;
        match &node.kind {
            NodeKind::Reroute => self.resolve(graph.input(node.id, "Input")?, quantity),
            NodeKind::MixShader => self.mix_shader(node, quantity),
            NodeKind::AddShader => self.add_shader(node, quantity),
            NodeKind::PrincipledBsdf
            | NodeKind::DiffuseBsdf
            | NodeKind::TranslucentBsdf
            | NodeKind::EmissionBsdf => self.bsdf(node, quantity),
            NodeKind::NormalMap => self.normal_map(node, quantity),
            NodeKind::Bump => self.bump(node, quantity),
            // Transparency contributes nothing outside the alpha pass.
            NodeKind::TransparentBsdf => Ok(None),
            NodeKind::Sink
            | NodeKind::MixRgb(_)
            | NodeKind::Math(_)
            | NodeKind::RgbConstant
            | NodeKind::ValueConstant
            | NodeKind::ImageSample { .. } => Ok(None),
        }
    }

    fn mix_shader(&mut self, node: &Node, quantity: Quantity) -> Result<Option<Expr>> {
        let factor = self.literal_or_socket(self.graph.input(node.id, "Fac")?)?;
        let slots = [
            self.graph.input(node.id, "Shader")?,
            self.graph.input(node.id, "Shader.001")?,
        ];
        let transparent = slots.map(|s| {
            quantity != Quantity::Alpha
                && self.graph.producer_kind(s) == Some(&NodeKind::TransparentBsdf)
        });

        let mut resolved = [None, None];
        for i in 0..2 {
            if !transparent[i] {
                resolved[i] = self.resolve(slots[i], quantity)?;
            }
        }
        // A bare transparent operand borrows the other operand, so opaque materials do
        // not pick up a blend towards "nothing".
        let [r0, r1] = resolved;
        let (a, b) = match transparent {
            [true, false] => (r1.clone(), r1),
            [false, true] => (r0.clone(), r0),
            _ => (r0, r1),
        };
        if a.is_none() && b.is_none() {
            return Ok(None);
        }
        let neutral = || Expr::Constant(quantity.neutral());
        Ok(Some(Expr::mix(
            factor,
            a.unwrap_or_else(neutral),
            b.unwrap_or_else(neutral),
        )))
    }

    fn add_shader(&mut self, node: &Node, quantity: Quantity) -> Result<Option<Expr>> {
        let a = self.resolve(self.graph.input(node.id, "Shader")?, quantity)?;
        let b = self.resolve(self.graph.input(node.id, "Shader.001")?, quantity)?;
        if a.is_none() && b.is_none() {
            return Ok(None);
        }
        let neutral = || Expr::Constant(quantity.neutral());
        Ok(Some(Expr::add(a.unwrap_or_else(neutral), b.unwrap_or_else(neutral))))
    }

    fn bsdf(&mut self, node: &Node, quantity: Quantity) -> Result<Option<Expr>> {
        let Some(input) = quantity
            .bsdf_input(&node.kind)
            .and_then(|name| self.graph.find_input(node.id, name))
        else {
            return Ok(None);
        };
        if quantity == Quantity::Bump || quantity.is_normal_like() {
            // Only reachable through a Bump or NormalMap node on the vector input.
            return self.resolve(input, quantity);
        }
        match self.graph.incoming(input) {
            Some(from) => Ok(Some(Expr::Socket(from))),
            None => Ok(self.graph.input_socket(input)?.default.map(Expr::Constant)),
        }
    }

    fn normal_map(&mut self, node: &Node, quantity: Quantity) -> Result<Option<Expr>> {
        if !quantity.is_normal_like() {
            return Ok(None);
        }
        let Some(source) = self
            .graph
            .find_input(node.id, "Color")
            .and_then(|color| self.graph.incoming(color))
        else {
            self.warn(format!(
                "{quantity}: normal map '{}' in '{}' has no Color input linked, using the flat normal",
                node.name, self.material
            ));
            return Ok(None);
        };
        let source = Expr::Socket(source);
        if !self.options.use_normal_strength {
            return Ok(Some(source));
        }
        let strength = self.literal_or_socket(self.graph.input(node.id, "Strength")?)?;
        Ok(Some(Expr::mix(strength, Expr::Constant(Value::Color(FLAT_NORMAL)), source)))
    }

    fn bump(&mut self, node: &Node, quantity: Quantity) -> Result<Option<Expr>> {
        if quantity != Quantity::Bump {
            return Ok(None);
        }
        let Some(height) = self
            .graph
            .find_input(node.id, "Height")
            .and_then(|h| self.graph.incoming(h))
        else {
            self.warn(format!(
                "{quantity}: bump node '{}' in '{}' has no Height input linked, skipping it",
                node.name, self.material
            ));
            return Ok(None);
        };
        let height = Expr::Socket(height);
        if !self.options.use_bump_strength {
            return Ok(Some(height));
        }
        let strength = self.literal_or_socket(self.graph.input(node.id, "Strength")?)?;
        Ok(Some(Expr::multiply(height, strength)))
    }

    /// The linked source of `input`, or its literal default copied as a constant.
    pub(super) fn literal_or_socket(&self, input: InputRef) -> Result<Expr> {
        if let Some(from) = self.graph.incoming(input) {
            return Ok(Expr::Socket(from));
        }
        let socket = self.graph.input_socket(input)?;
        Ok(Expr::Constant(socket.default.unwrap_or(Value::Scalar(0.0))))
    }
}
