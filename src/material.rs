//! Materials: how an element's geometry is shaded and blended.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::{Releasable, ResourceId, ResourceKind, ResourceLedger, ResourceToken};

/// An sRGB colour written as `"#rrggbb"` in configs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Color = Color(0xffffff);

    /// Channels in sRGB space, 0-1.
    pub fn to_srgb(self) -> [f32; 3] {
        [
            ((self.0 >> 16) & 0xff) as f32 / 255.0,
            ((self.0 >> 8) & 0xff) as f32 / 255.0,
            (self.0 & 0xff) as f32 / 255.0,
        ]
    }

    /// Channels in linear space, for lighting maths on an sRGB target.
    pub fn to_linear(self) -> [f32; 3] {
        self.to_srgb().map(|c| {
            if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        })
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let hex = value.strip_prefix('#').unwrap_or(&value);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("expected a colour like \"#8b5cf6\", got {value:?}"));
        }
        u32::from_str_radix(hex, 16)
            .map(Color)
            .map_err(|_| format!("invalid hex colour {value:?}"))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        format!("#{:06x}", color.0)
    }
}

/// Lighting model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shading {
    /// Ambient + diffuse + specular from the scene lights.
    Phong { shininess: f32 },
    /// Flat colour, ignores lights.
    Unlit,
}

impl Default for Shading {
    fn default() -> Self {
        Shading::Phong { shininess: 30.0 }
    }
}

/// How fragments combine with what is already drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Blending {
    #[default]
    Normal,
    Additive,
}

/// Declarative material options for a group of elements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialStyle {
    pub shading: Shading,
    pub emissive: Option<Color>,
    /// Draw triangle meshes as their edges.
    pub wireframe: bool,
    pub double_sided: bool,
    pub blending: Blending,
}

impl MaterialStyle {
    pub fn unlit() -> Self {
        Self {
            shading: Shading::Unlit,
            ..Self::default()
        }
    }
}

/// An allocated material. Owned by exactly one scene element.
#[derive(Debug)]
pub struct Material {
    token: ResourceToken,
    /// Base colour, linear RGB.
    pub color: [f32; 3],
    pub opacity: f32,
    /// Emissive colour, linear RGB.
    pub emissive: [f32; 3],
    pub shading: Shading,
    pub blending: Blending,
    pub double_sided: bool,
}

impl Material {
    pub fn new(ledger: &ResourceLedger, color: Color, opacity: f32, style: &MaterialStyle) -> Self {
        Self {
            token: ledger.allocate(ResourceKind::Material),
            color: color.to_linear(),
            opacity,
            emissive: style.emissive.map(Color::to_linear).unwrap_or([0.0; 3]),
            shading: style.shading,
            blending: style.blending,
            double_sided: style.double_sided,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.token.id()
    }

    /// Whether the material needs blending with what is behind it.
    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0 || self.blending == Blending::Additive
    }

    pub fn is_lit(&self) -> bool {
        matches!(self.shading, Shading::Phong { .. })
    }

    pub fn shininess(&self) -> f32 {
        match self.shading {
            Shading::Phong { shininess } => shininess,
            Shading::Unlit => 0.0,
        }
    }
}

impl Releasable for Material {
    fn release(&mut self) {
        self.token.release();
    }

    fn is_released(&self) -> bool {
        self.token.is_released()
    }
}
