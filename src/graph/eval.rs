//! Constant evaluation of colour/value networks.
//!
//! Returns `None` as soon as a value depends on something that varies over the surface
//! (image samples, BSDF closures, ...).

use super::{Graph, InputRef, MathOp, MixBlend, NodeKind, OutputRef};
use crate::color::Value;

pub fn eval_input(graph: &Graph, input: InputRef) -> Option<Value> {
    match graph.incoming(input) {
        Some(from) => eval_output(graph, from),
        None => graph.input_socket(input).ok()?.default,
    }
}

pub fn eval_output(graph: &Graph, output: OutputRef) -> Option<Value> {
    let node = graph.node(output.node).ok()?;
    let input = |id: &str| graph.find_input(node.id, id).and_then(|i| eval_input(graph, i));
    match &node.kind {
        NodeKind::RgbConstant | NodeKind::ValueConstant => {
            node.outputs.get(output.socket)?.default
        }
        NodeKind::Reroute => input("Input"),
        // Emission-like closures bake to their colour input.
        NodeKind::EmissionBsdf | NodeKind::DiffuseBsdf => input("Color"),
        NodeKind::MixRgb(blend) => {
            let fac = input("Fac")?.to_scalar();
            let c1 = input("Color1")?.to_rgba();
            let c2 = input("Color2")?.to_rgba();
            let out: [f32; 4] = match blend {
                MixBlend::Mix => Value::lerp(Value::Color(c1), Value::Color(c2), fac).to_rgba(),
                MixBlend::Add => std::array::from_fn(|i| {
                    if i == 3 { c1[3] } else { c1[i] + fac * c2[i] }
                }),
                MixBlend::Multiply => std::array::from_fn(|i| {
                    if i == 3 { c1[3] } else { c1[i] * (1.0 - fac + fac * c2[i]) }
                }),
            };
            Some(Value::Color(out))
        }
        NodeKind::Math(op) => {
            let a = input("Value")?.to_scalar();
            let b = input("Value.001")?.to_scalar();
            Some(Value::Scalar(match op {
                MathOp::Add => a + b,
                MathOp::Subtract => a - b,
                MathOp::Multiply => a * b,
            }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn mix_rgb_lerps_between_literals() {
        let mut g = Graph::new();
        let mix = g.add_node(NodeKind::MixRgb(MixBlend::Mix)).unwrap();
        g.set_input_default(g.input(mix, "Fac").unwrap(), Value::Scalar(0.25))
            .unwrap();
        g.set_input_default(g.input(mix, "Color1").unwrap(), Value::Color([0.0, 0.0, 0.0, 1.0]))
            .unwrap();
        g.set_input_default(g.input(mix, "Color2").unwrap(), Value::Color([1.0, 1.0, 1.0, 1.0]))
            .unwrap();
        let out = eval_output(&g, g.output(mix, "Color").unwrap()).unwrap();
        assert_eq!(out, Value::Color([0.25, 0.25, 0.25, 1.0]));
    }

    #[test]
    fn image_samples_are_not_constant() {
        let mut g = Graph::new();
        let tex = g
            .add_node(NodeKind::ImageSample { image: None, color_space: Default::default() })
            .unwrap();
        let emit = g.add_node(NodeKind::EmissionBsdf).unwrap();
        g.link(g.output(tex, "Color").unwrap(), g.input(emit, "Color").unwrap())
            .unwrap();
        assert_eq!(eval_output(&g, g.output(emit, "Emission").unwrap()), None);
    }

    #[test]
    fn math_multiply_reads_linked_operands() {
        let mut g = Graph::new();
        let v = g.add_node(NodeKind::ValueConstant).unwrap();
        g.set_output_default(g.output(v, "Value").unwrap(), Value::Scalar(4.0))
            .unwrap();
        let m = g.add_node(NodeKind::Math(MathOp::Multiply)).unwrap();
        g.link(g.output(v, "Value").unwrap(), g.input(m, "Value").unwrap())
            .unwrap();
        g.set_input_default(g.input(m, "Value.001").unwrap(), Value::Scalar(0.5))
            .unwrap();
        assert_eq!(eval_output(&g, g.output(m, "Value").unwrap()), Some(Value::Scalar(2.0)));
    }
}
