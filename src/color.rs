//! Literal socket values and the colour-space helpers used when writing them to images.

use serde::{Deserialize, Serialize};

/// Literal carried by an unlinked socket or a synthesized constant node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f32),
    Color([f32; 4]),
    Vector([f32; 3]),
}

/// Reference normal of a flat, unperturbed tangent-space normal map.
pub const FLAT_NORMAL: [f32; 4] = [0.5, 0.5, 1.0, 1.0];
pub const BLACK: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

impl Value {
    /// RGBA view used when the value lands on a colour socket or in an image.
    pub fn to_rgba(self) -> [f32; 4] {
        match self {
            Value::Scalar(v) => [v, v, v, 1.0],
            Value::Color(c) => c,
            Value::Vector([x, y, z]) => [x, y, z, 1.0],
        }
    }

    /// Scalar view, averaging the colour channels like an implicit colour-to-float socket
    /// conversion does.
    pub fn to_scalar(self) -> f32 {
        match self {
            Value::Scalar(v) => v,
            Value::Color([r, g, b, _]) => (r + g + b) / 3.0,
            Value::Vector([x, y, z]) => (x + y + z) / 3.0,
        }
    }

    pub fn to_vector(self) -> [f32; 3] {
        match self {
            Value::Scalar(v) => [v, v, v],
            Value::Color([r, g, b, _]) => [r, g, b],
            Value::Vector(v) => v,
        }
    }

    /// Exact equality used for autodetect folding. Scalars and colours never compare equal.
    pub fn same_literal(&self, other: &Value) -> bool {
        self == other
    }

    pub fn lerp(a: Value, b: Value, t: f32) -> Value {
        match (a, b) {
            (Value::Scalar(x), Value::Scalar(y)) => Value::Scalar(x + (y - x) * t),
            _ => {
                let (x, y) = (a.to_rgba(), b.to_rgba());
                Value::Color(std::array::from_fn(|i| x[i] + (y[i] - x[i]) * t))
            }
        }
    }
}

fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

pub fn linear_to_srgb_channel(x: f32) -> f32 {
    // https://en.wikipedia.org/wiki/SRGB
    if x <= 0.003_130_8 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

pub fn srgb_to_linear_channel(x: f32) -> f32 {
    if x <= 0.040_45 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

/// Quantize a linear channel to 8 bits, optionally encoding it as sRGB first. Alpha is
/// never encoded.
pub fn encode_u8(x: f32, srgb: bool) -> u8 {
    let v = if srgb { linear_to_srgb_channel(x) } else { x };
    (clamp01(v) * 255.0).round() as u8
}

pub fn decode_u8(x: u8, srgb: bool) -> f32 {
    let v = f32::from(x) / 255.0;
    if srgb { srgb_to_linear_channel(v) } else { v }
}
