//! Socket resolution: turns the subgraph feeding a material's sink into a description of
//! the flattened expression for one [`Quantity`](crate::quantity::Quantity).
//!
//! This module is read-only. It never touches the graph; [`crate::synth`] consumes the
//! [`Expr`] it produces and emits the nodes.
//!
//! - `expr`: the expression description and constant folding
//! - `surface`: value resolution through shaders, reroutes, bump and normal maps
//! - `alpha`: the transparency factor chain
//! - `query`: read-only probes used by the planner

mod alpha;
mod expr;
mod query;
mod surface;

pub use expr::{Expr, ResolvedQuantity};
pub use query::{Probe, collect_literals, has_node_kind, is_quantity_linked};
pub use surface::{ResolveOptions, Resolver};
