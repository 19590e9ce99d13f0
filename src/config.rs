//! Declarative generation parameters for one visual.
//!
//! A [`SceneConfig`] is created once per mount and never mutated. Configs
//! are plain serde data so section tables can live in JSON as easily as in
//! [`crate::presets`].

use serde::{Deserialize, Serialize};

use crate::error::VisualError;
use crate::material::{Color, MaterialStyle};
use crate::motion::Motion;

/// Immutable description of one section's visual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub name: String,
    /// Multiplier applied to every element's opacity; the visual sits
    /// behind page content.
    #[serde(default = "default_visual_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub camera: CameraSettings,
    #[serde(default)]
    pub lighting: LightingSettings,
    pub groups: Vec<ElementGroup>,
}

fn default_visual_opacity() -> f32 {
    1.0
}

/// Perspective camera placed on +Z looking at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub distance: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            distance: 5.0,
        }
    }
}

/// One uniform ambient light and one off-axis point light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingSettings {
    pub ambient_color: Color,
    pub ambient_intensity: f32,
    pub point_color: Color,
    pub point_intensity: f32,
    pub point_position: [f32; 3],
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            ambient_color: Color::WHITE,
            ambient_intensity: 0.5,
            point_color: Color(0x8b5cf6),
            point_intensity: 1.0,
            point_position: [2.0, 3.0, 4.0],
        }
    }
}

/// What each generated element looks like.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// Cube mesh, one element per count.
    Box { size: f32 },
    /// Rectangle mesh in the XY plane, one element per count.
    Plane { width: f32, height: f32 },
    /// Regular polygon mesh, one element per count.
    Polygon { radius: f32, sides: u32 },
    /// UV sphere mesh, one element per count.
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    /// A single point-cloud element with `count` points.
    Points,
    /// A single line element with `count` independent segments whose
    /// endpoints both come from the layout.
    Segments,
}

impl Shape {
    /// Meshes produce one element per count; clouds and segment sets
    /// produce a single element.
    pub fn is_mesh(&self) -> bool {
        !matches!(self, Shape::Points | Shape::Segments)
    }
}

/// Where generated positions come from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layout {
    /// Uniformly random spherical angles on a sphere surface.
    SphereSurface { radius: f32 },
    /// Evenly spread spiral on a sphere surface.
    FibonacciSphere { radius: f32 },
    /// Latitude/longitude grid vertices of a UV sphere.
    SphereGrid { radius: f32, segments: u32 },
    /// Evenly spaced on a circle in the XY plane.
    Ring { radius: f32 },
    /// Row-major grid in the XY plane with random depth.
    Grid {
        columns: u32,
        spacing: f32,
        depth_jitter: f32,
    },
    /// Evenly spaced along X, centered on the origin.
    Timeline { length: f32 },
    /// Uniformly random inside an axis-aligned box.
    BoxScatter { extent: [f32; 3] },
    /// Everything at the origin.
    Origin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaletteMode {
    /// Each element picks a palette colour at random.
    #[default]
    Random,
    /// Every element uses the first palette colour.
    Fixed,
}

/// Opacity drawn uniformly from `[min, max]` per element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpacityRange {
    pub min: f32,
    pub max: f32,
}

impl OpacityRange {
    pub fn fixed(value: f32) -> Self {
        Self { min: value, max: value }
    }
}

impl Default for OpacityRange {
    fn default() -> Self {
        Self::fixed(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InitialRotation {
    /// Same rotation (Euler XYZ, radians) for every element.
    Fixed { radians: [f32; 3] },
    /// Uniformly random rotation up to `max` per axis.
    Random { max: [f32; 3] },
    /// Orient +Z towards the origin.
    FaceOrigin,
    /// No initial rotation.
    #[default]
    Identity,
}

/// Auxiliary connector lines for a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkStyle {
    pub pattern: LinkPattern,
    pub color: Color,
    #[serde(default = "default_link_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub motion: Motion,
}

fn default_link_opacity() -> f32 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkPattern {
    /// Connect each generated position to the previous one.
    Chain,
    /// Connect `count` random pairs of generated positions.
    RandomPairs { count: usize },
}

/// A homogeneous set of elements inside one visual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementGroup {
    #[serde(default)]
    pub label: String,
    pub shape: Shape,
    pub count: usize,
    pub layout: Layout,
    /// Added to every generated element position.
    #[serde(default)]
    pub offset: [f32; 3],
    pub palette: Vec<Color>,
    #[serde(default)]
    pub palette_mode: PaletteMode,
    #[serde(default)]
    pub opacity: OpacityRange,
    #[serde(default)]
    pub material: MaterialStyle,
    #[serde(default)]
    pub initial_rotation: InitialRotation,
    /// Border drawn along the element's outer edges.
    #[serde(default)]
    pub outline: Option<Color>,
    #[serde(default)]
    pub links: Option<LinkStyle>,
    #[serde(default)]
    pub motion: Motion,
}

impl ElementGroup {
    /// Number of primary elements this group generates.
    pub fn element_count(&self) -> usize {
        if self.shape.is_mesh() {
            self.count
        } else {
            usize::from(self.count > 0)
        }
    }
}

impl SceneConfig {
    /// Parse and validate a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, VisualError> {
        let config: SceneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Total primary elements across all groups.
    pub fn element_count(&self) -> usize {
        self.groups.iter().map(ElementGroup::element_count).sum()
    }

    pub fn validate(&self) -> Result<(), VisualError> {
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(VisualError::config(format!(
                "{}: visual opacity {} outside [0, 1]",
                self.name, self.opacity
            )));
        }

        let camera = &self.camera;
        if !(camera.fov > 0.0 && camera.fov < 180.0) {
            return Err(VisualError::config(format!("{}: camera fov {} out of range", self.name, camera.fov)));
        }
        if !(camera.near > 0.0 && camera.near < camera.far) {
            return Err(VisualError::config(format!(
                "{}: camera clip range {}..{} is empty",
                self.name, camera.near, camera.far
            )));
        }

        for (index, group) in self.groups.iter().enumerate() {
            let label = if group.label.is_empty() {
                format!("{}/group {}", self.name, index)
            } else {
                format!("{}/{}", self.name, group.label)
            };

            if group.palette.is_empty() {
                return Err(VisualError::config(format!("{label}: palette is empty")));
            }

            let range = group.opacity;
            if !(0.0..=1.0).contains(&range.min) || !(0.0..=1.0).contains(&range.max) || range.min > range.max {
                return Err(VisualError::config(format!(
                    "{label}: opacity range {}..{} invalid",
                    range.min, range.max
                )));
            }

            if let Shape::Polygon { sides, .. } = group.shape {
                if sides < 3 {
                    return Err(VisualError::config(format!("{label}: polygon needs at least 3 sides")));
                }
            }
            if let Shape::Sphere { width_segments, height_segments, .. } = group.shape {
                if width_segments < 3 || height_segments < 2 {
                    return Err(VisualError::config(format!("{label}: sphere has too few segments")));
                }
            }

            match group.layout {
                Layout::Grid { columns: 0, .. } => {
                    return Err(VisualError::config(format!("{label}: grid needs at least one column")));
                }
                Layout::SphereGrid { segments, .. } if segments < 2 => {
                    return Err(VisualError::config(format!("{label}: sphere grid needs at least 2 segments")));
                }
                _ => {}
            }

            if let Some(links) = &group.links {
                if !(0.0..=1.0).contains(&links.opacity) {
                    return Err(VisualError::config(format!("{label}: link opacity {} invalid", links.opacity)));
                }
            }
        }

        Ok(())
    }
}
