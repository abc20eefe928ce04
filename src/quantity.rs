use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    color::{BLACK, FLAT_NORMAL, Value},
    graph::{ColorSpace, NodeKind},
};

/// One shading property that can be baked into its own texture.
///
/// Variants are declared in canonical bake order, so `Ord` sorts a plan the way
/// explicit mode lists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quantity {
    Alpha,
    Color,
    Metallic,
    Roughness,
    Normal,
    Bump,
    Displacement,
    Specular,
    Anisotropic,
    #[serde(rename = "Anisotropic Rotation")]
    AnisotropicRotation,
    Clearcoat,
    #[serde(rename = "Clearcoat Normal")]
    ClearcoatNormal,
    #[serde(rename = "Clearcoat Roughness")]
    ClearcoatRoughness,
    #[serde(rename = "IOR")]
    Ior,
    Sheen,
    #[serde(rename = "Sheen Tint")]
    SheenTint,
    #[serde(rename = "Specular Tint")]
    SpecularTint,
    Subsurface,
    #[serde(rename = "Subsurface Color")]
    SubsurfaceColor,
    #[serde(rename = "Subsurface Radius")]
    SubsurfaceRadius,
    Tangent,
    Transmission,
    #[serde(rename = "Transmission Roughness")]
    TransmissionRoughness,
}

impl Quantity {
    pub const ALL: [Quantity; 23] = [
        Quantity::Alpha,
        Quantity::Color,
        Quantity::Metallic,
        Quantity::Roughness,
        Quantity::Normal,
        Quantity::Bump,
        Quantity::Displacement,
        Quantity::Specular,
        Quantity::Anisotropic,
        Quantity::AnisotropicRotation,
        Quantity::Clearcoat,
        Quantity::ClearcoatNormal,
        Quantity::ClearcoatRoughness,
        Quantity::Ior,
        Quantity::Sheen,
        Quantity::SheenTint,
        Quantity::SpecularTint,
        Quantity::Subsurface,
        Quantity::SubsurfaceColor,
        Quantity::SubsurfaceRadius,
        Quantity::Tangent,
        Quantity::Transmission,
        Quantity::TransmissionRoughness,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Quantity::Alpha => "Alpha",
            Quantity::Color => "Color",
            Quantity::Metallic => "Metallic",
            Quantity::Roughness => "Roughness",
            Quantity::Normal => "Normal",
            Quantity::Bump => "Bump",
            Quantity::Displacement => "Displacement",
            Quantity::Specular => "Specular",
            Quantity::Anisotropic => "Anisotropic",
            Quantity::AnisotropicRotation => "Anisotropic Rotation",
            Quantity::Clearcoat => "Clearcoat",
            Quantity::ClearcoatNormal => "Clearcoat Normal",
            Quantity::ClearcoatRoughness => "Clearcoat Roughness",
            Quantity::Ior => "IOR",
            Quantity::Sheen => "Sheen",
            Quantity::SheenTint => "Sheen Tint",
            Quantity::SpecularTint => "Specular Tint",
            Quantity::Subsurface => "Subsurface",
            Quantity::SubsurfaceColor => "Subsurface Color",
            Quantity::SubsurfaceRadius => "Subsurface Radius",
            Quantity::Tangent => "Tangent",
            Quantity::Transmission => "Transmission",
            Quantity::TransmissionRoughness => "Transmission Roughness",
        }
    }

    /// Input socket of a BSDF-like node that carries this quantity.
    ///
    /// Bump travels through the node's Normal input. Alpha and Displacement do not live
    /// on a BSDF at all.
    pub fn bsdf_input(self, kind: &NodeKind) -> Option<&'static str> {
        match self {
            Quantity::Alpha | Quantity::Displacement => None,
            Quantity::Color if *kind == NodeKind::PrincipledBsdf => Some("Base Color"),
            Quantity::Bump => Some("Normal"),
            other => Some(other.name()),
        }
    }

    /// Vector inputs that are only bakeable when driven by a normal map.
    pub fn is_normal_like(self) -> bool {
        matches!(
            self,
            Quantity::Normal | Quantity::ClearcoatNormal | Quantity::Tangent
        )
    }

    /// Whether autodetect may fold this quantity by comparing literal values.
    pub fn is_literal_comparable(self) -> bool {
        !matches!(
            self,
            Quantity::Alpha
                | Quantity::Displacement
                | Quantity::Bump
                | Quantity::SubsurfaceRadius
                | Quantity::Normal
                | Quantity::ClearcoatNormal
                | Quantity::Tangent
        )
    }

    /// Value standing in for an operand that resolved to nothing.
    pub fn neutral(self) -> Value {
        if self.is_normal_like() {
            Value::Color(FLAT_NORMAL)
        } else if self == Quantity::Bump {
            Value::Color([0.5, 0.5, 0.5, 1.0])
        } else {
            Value::Color(BLACK)
        }
    }

    pub fn color_space(self) -> ColorSpace {
        if self == Quantity::Color {
            ColorSpace::Srgb
        } else {
            ColorSpace::NonColor
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_sorted_in_canonical_order() {
        let mut sorted = Quantity::ALL;
        sorted.sort();
        assert_eq!(sorted, Quantity::ALL);
        assert_eq!(&Quantity::ALL[..7], &[
            Quantity::Alpha,
            Quantity::Color,
            Quantity::Metallic,
            Quantity::Roughness,
            Quantity::Normal,
            Quantity::Bump,
            Quantity::Displacement,
        ]);
    }

    #[test]
    fn serde_names_match_display_names() {
        for q in Quantity::ALL {
            let json = serde_json::to_string(&q).unwrap();
            assert_eq!(json, format!("\"{}\"", q.name()));
        }
    }

    #[test]
    fn color_maps_to_base_color_only_on_principled() {
        assert_eq!(Quantity::Color.bsdf_input(&NodeKind::PrincipledBsdf), Some("Base Color"));
        assert_eq!(Quantity::Color.bsdf_input(&NodeKind::DiffuseBsdf), Some("Color"));
        assert_eq!(Quantity::Bump.bsdf_input(&NodeKind::DiffuseBsdf), Some("Normal"));
        assert_eq!(Quantity::Alpha.bsdf_input(&NodeKind::PrincipledBsdf), None);
    }
}
