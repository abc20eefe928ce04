use crate::{color::Value, graph::OutputRef};

/// Description of the subgraph that computes one quantity.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// An existing output socket, wired through unchanged.
    Socket(OutputRef),
    Constant(Value),
    /// Weighted lerp: `a * (1 - factor) + b * factor`.
    Mix {
        factor: Box<Expr>,
        a: Box<Expr>,
        b: Box<Expr>,
    },
    /// Both operands contribute fully.
    Add { a: Box<Expr>, b: Box<Expr> },
    Multiply { a: Box<Expr>, b: Box<Expr> },
    /// Explicit wiring point, kept so factor chains mirror the source layout.
    Reroute(Box<Expr>),
}

impl Expr {
    pub fn mix(factor: Expr, a: Expr, b: Expr) -> Self {
        Expr::Mix {
            factor: Box::new(factor),
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    pub fn add(a: Expr, b: Expr) -> Self {
        Expr::Add {
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    pub fn multiply(a: Expr, b: Expr) -> Self {
        Expr::Multiply {
            a: Box::new(a),
            b: Box::new(b),
        }
    }

    pub fn as_constant(&self) -> Option<Value> {
        match self {
            Expr::Constant(v) => Some(*v),
            _ => None,
        }
    }

    /// Collapse mixes whose operands are identical and reroutes around constants.
    ///
    /// The factor of such a mix cannot change the result, so it is dropped even when it
    /// is driven by a socket.
    pub fn fold(self) -> Expr {
        match self {
            Expr::Mix { factor, a, b } => {
                let (a, b) = (a.fold(), b.fold());
                if a == b {
                    a
                } else {
                    Expr::mix(factor.fold(), a, b)
                }
            }
            Expr::Add { a, b } => Expr::add(a.fold(), b.fold()),
            Expr::Multiply { a, b } => Expr::multiply(a.fold(), b.fold()),
            Expr::Reroute(inner) => match inner.fold() {
                Expr::Constant(v) => Expr::Constant(v),
                other => Expr::Reroute(Box::new(other)),
            },
            leaf => leaf,
        }
    }

    /// Number of nodes the synthesizer emits for this expression.
    pub fn synthesized_nodes(&self) -> usize {
        match self {
            Expr::Socket(_) => 0,
            Expr::Constant(_) => 1,
            Expr::Mix { factor, a, b } => {
                1 + operand_nodes(factor) + operand_nodes(a) + operand_nodes(b)
            }
            Expr::Add { a, b } | Expr::Multiply { a, b } => {
                1 + operand_nodes(a) + operand_nodes(b)
            }
            Expr::Reroute(inner) => 1 + inner.synthesized_nodes(),
        }
    }
}

/// Constants feeding a combinator become socket literals, not nodes.
fn operand_nodes(e: &Expr) -> usize {
    match e {
        Expr::Constant(_) => 0,
        other => other.synthesized_nodes(),
    }
}

/// Outcome of resolving one quantity on one material.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedQuantity {
    /// Same literal everywhere; nothing needs rendering.
    Constant(Value),
    /// A graph expression that must be rasterized.
    Expression(Expr),
}

impl ResolvedQuantity {
    pub fn from_expr(expr: Expr) -> Self {
        match expr.fold() {
            Expr::Constant(v) => ResolvedQuantity::Constant(v),
            other => ResolvedQuantity::Expression(other),
        }
    }

    pub fn as_constant(&self) -> Option<Value> {
        match self {
            ResolvedQuantity::Constant(v) => Some(*v),
            ResolvedQuantity::Expression(_) => None,
        }
    }

    pub fn expr(&self) -> Option<&Expr> {
        match self {
            ResolvedQuantity::Constant(_) => None,
            ResolvedQuantity::Expression(e) => Some(e),
        }
    }
}
