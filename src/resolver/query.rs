//! Read-only probes over a material graph. Nothing here synthesizes nodes.

use anyhow::Result;

use crate::{
    color::Value,
    graph::{Graph, InputRef, NodeKind},
    quantity::Quantity,
};

/// What a BSDF input reachable from the surface carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Probe {
    Literal(Value),
    Linked,
}

/// Every value of `quantity` found on the BSDFs reachable from `input` through reroutes and
/// shader combinators, one probe per BSDF that has the input.
pub fn collect_literals(graph: &Graph, input: InputRef, quantity: Quantity) -> Result<Vec<Probe>> {
    let mut found = Vec::new();
    collect_into(graph, input, quantity, &mut found)?;
    Ok(found)
}

fn collect_into(
    graph: &Graph,
    input: InputRef,
    quantity: Quantity,
    found: &mut Vec<Probe>,
) -> Result<()> {
    let Some(from) = graph.incoming(input) else {
        return Ok(());
    };
    let node = graph.node(from.node)?;
    match &node.kind {
        NodeKind::Reroute => collect_into(graph, graph.input(node.id, "Input")?, quantity, found),
        NodeKind::MixShader | NodeKind::AddShader => {
            for slot in ["Shader", "Shader.001"] {
                collect_into(graph, graph.input(node.id, slot)?, quantity, found)?;
            }
            Ok(())
        }
        kind if kind.is_surface_bsdf() => {
            let Some(socket) = quantity
                .bsdf_input(kind)
                .and_then(|name| graph.find_input(node.id, name))
            else {
                return Ok(());
            };
            if graph.is_linked(socket) {
                found.push(Probe::Linked);
            } else if let Some(v) = graph.input_socket(socket)?.default {
                found.push(Probe::Literal(v));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Whether any BSDF reachable from `input` drives `quantity` from a link rather than a
/// literal. Bump only counts when a Bump node has its Height linked, normal-like
/// quantities only when a NormalMap has its Color linked.
pub fn is_quantity_linked(graph: &Graph, input: InputRef, quantity: Quantity) -> Result<bool> {
    let Some(from) = graph.incoming(input) else {
        return Ok(false);
    };
    let node = graph.node(from.node)?;
    match &node.kind {
        NodeKind::Reroute => is_quantity_linked(graph, graph.input(node.id, "Input")?, quantity),
        NodeKind::MixShader | NodeKind::AddShader => {
            for slot in ["Shader", "Shader.001"] {
                if is_quantity_linked(graph, graph.input(node.id, slot)?, quantity)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        kind if kind.is_surface_bsdf() => {
            let Some(socket) = quantity
                .bsdf_input(kind)
                .and_then(|name| graph.find_input(node.id, name))
            else {
                return Ok(false);
            };
            if quantity == Quantity::Bump {
                Ok(producer_has_linked(graph, socket, &NodeKind::Bump, "Height"))
            } else if quantity.is_normal_like() {
                Ok(producer_has_linked(graph, socket, &NodeKind::NormalMap, "Color"))
            } else {
                Ok(graph.is_linked(socket))
            }
        }
        _ => Ok(false),
    }
}

fn producer_has_linked(graph: &Graph, socket: InputRef, kind: &NodeKind, input: &str) -> bool {
    let Some(from) = graph.incoming(socket) else {
        return false;
    };
    if graph.producer_kind(socket) != Some(kind) {
        return false;
    }
    graph
        .find_input(from.node, input)
        .is_some_and(|i| graph.is_linked(i))
}

/// Whether a node of the same kind as `kind` feeds `input`, at any depth.
pub fn has_node_kind(graph: &Graph, input: InputRef, kind: &NodeKind) -> bool {
    let Some(from) = graph.incoming(input) else {
        return false;
    };
    graph
        .upstream_reachable(from.node)
        .into_iter()
        .filter_map(|id| graph.node(id).ok())
        .any(|n| n.kind.same_kind(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principled_with(g: &mut Graph, roughness: f32) -> crate::graph::NodeId {
        let bsdf = g.add_node(NodeKind::PrincipledBsdf).unwrap();
        let r = g.input(bsdf, "Roughness").unwrap();
        g.set_input_default(r, Value::Scalar(roughness)).unwrap();
        bsdf
    }

    #[test]
    fn literals_are_collected_from_both_mix_branches() {
        let mut g = Graph::new();
        let sink = g.add_node(NodeKind::Sink).unwrap();
        let mix = g.add_node(NodeKind::MixShader).unwrap();
        let a = principled_with(&mut g, 0.2);
        let b = principled_with(&mut g, 0.9);
        g.link(g.output(a, "BSDF").unwrap(), g.input(mix, "Shader").unwrap())
            .unwrap();
        g.link(g.output(b, "BSDF").unwrap(), g.input(mix, "Shader.001").unwrap())
            .unwrap();
        let surface = g.input(sink, "Surface").unwrap();
        g.link(g.output(mix, "Shader").unwrap(), surface).unwrap();

        let probes = collect_literals(&g, surface, Quantity::Roughness).unwrap();
        assert_eq!(probes, vec![
            Probe::Literal(Value::Scalar(0.2)),
            Probe::Literal(Value::Scalar(0.9)),
        ]);
        assert!(!is_quantity_linked(&g, surface, Quantity::Roughness).unwrap());
    }

    #[test]
    fn linked_inputs_are_reported() {
        let mut g = Graph::new();
        let sink = g.add_node(NodeKind::Sink).unwrap();
        let bsdf = principled_with(&mut g, 0.5);
        let v = g.add_node(NodeKind::ValueConstant).unwrap();
        g.link(g.output(v, "Value").unwrap(), g.input(bsdf, "Metallic").unwrap())
            .unwrap();
        let surface = g.input(sink, "Surface").unwrap();
        g.link(g.output(bsdf, "BSDF").unwrap(), surface).unwrap();

        assert_eq!(
            collect_literals(&g, surface, Quantity::Metallic).unwrap(),
            vec![Probe::Linked]
        );
        assert!(is_quantity_linked(&g, surface, Quantity::Metallic).unwrap());
    }

    #[test]
    fn bump_counts_as_linked_only_with_a_height_source() {
        let mut g = Graph::new();
        let sink = g.add_node(NodeKind::Sink).unwrap();
        let bsdf = principled_with(&mut g, 0.5);
        let bump = g.add_node(NodeKind::Bump).unwrap();
        g.link(g.output(bump, "Normal").unwrap(), g.input(bsdf, "Normal").unwrap())
            .unwrap();
        let surface = g.input(sink, "Surface").unwrap();
        g.link(g.output(bsdf, "BSDF").unwrap(), surface).unwrap();
        assert!(!is_quantity_linked(&g, surface, Quantity::Bump).unwrap());

        let h = g.add_node(NodeKind::ValueConstant).unwrap();
        g.link(g.output(h, "Value").unwrap(), g.input(bump, "Height").unwrap())
            .unwrap();
        assert!(is_quantity_linked(&g, surface, Quantity::Bump).unwrap());
        assert!(!is_quantity_linked(&g, surface, Quantity::Normal).unwrap());
    }

    #[test]
    fn node_kind_search_sees_through_reroutes() {
        let mut g = Graph::new();
        let sink = g.add_node(NodeKind::Sink).unwrap();
        let reroute = g.add_node(NodeKind::Reroute).unwrap();
        let t = g.add_node(NodeKind::TransparentBsdf).unwrap();
        g.link(g.output(t, "BSDF").unwrap(), g.input(reroute, "Input").unwrap())
            .unwrap();
        let surface = g.input(sink, "Surface").unwrap();
        assert!(!has_node_kind(&g, surface, &NodeKind::TransparentBsdf));
        g.link(g.output(reroute, "Output").unwrap(), surface).unwrap();
        assert!(has_node_kind(&g, surface, &NodeKind::TransparentBsdf));
        assert!(!has_node_kind(&g, surface, &NodeKind::PrincipledBsdf));
    }
}
