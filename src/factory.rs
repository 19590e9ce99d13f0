//! Geometry/material factory: turns a [`SceneConfig`] into owned
//! [`VisualElement`]s.
//!
//! The factory only allocates. It registers nothing and keeps nothing; the
//! caller hands the returned elements to [`crate::scene_graph::assemble`].
//! Randomised layouts draw from the supplied RNG, so tests can seed it while
//! mounts use an unseeded one.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use rand::Rng;

use crate::config::{ElementGroup, InitialRotation, Layout, LinkPattern, LinkStyle, PaletteMode, SceneConfig, Shape};
use crate::error::VisualError;
use crate::material::{Color, Material, MaterialStyle};
use crate::motion::facing_origin;
use crate::primitives::{self, Geometry, MeshData, Topology};
use crate::resource::ResourceLedger;
use crate::scene_graph::{ElementRole, Outline, Transform, VisualElement};

/// Build every element described by `config`.
///
/// The config is validated before anything is allocated, so an invalid
/// config leaves the ledger untouched.
pub fn build_elements<R: Rng + ?Sized>(
    config: &SceneConfig,
    ledger: &ResourceLedger,
    rng: &mut R,
) -> Result<Vec<VisualElement>, VisualError> {
    config.validate()?;

    let mut elements = Vec::new();
    for (group_index, group) in config.groups.iter().enumerate() {
        if group.count == 0 {
            continue;
        }
        let builder = GroupBuilder {
            group,
            group_index,
            visual_opacity: config.opacity,
            ledger,
        };
        builder.build(rng, &mut elements);
    }

    log::debug!(
        "{}: built {} elements ({} primary)",
        config.name,
        elements.len(),
        elements.iter().filter(|e| e.role == ElementRole::Primary).count()
    );
    Ok(elements)
}

struct GroupBuilder<'a> {
    group: &'a ElementGroup,
    group_index: usize,
    visual_opacity: f32,
    ledger: &'a ResourceLedger,
}

impl GroupBuilder<'_> {
    fn build<R: Rng + ?Sized>(&self, rng: &mut R, out: &mut Vec<VisualElement>) {
        let group = self.group;
        let offset = Vec3::from_array(group.offset);

        let positions = match group.shape {
            Shape::Segments => layout_positions(&group.layout, group.count * 2, rng),
            _ => layout_positions(&group.layout, group.count, rng),
        };

        match group.shape {
            Shape::Points => {
                let points: Vec<[f32; 3]> = positions.iter().map(|p| p.to_array()).collect();
                out.push(self.cloud(Topology::Points, primitives::point_cloud(&points), offset, rng));
            }
            Shape::Segments => {
                let pairs: Vec<_> = positions
                    .chunks_exact(2)
                    .map(|pair| (pair[0].to_array(), pair[1].to_array()))
                    .collect();
                out.push(self.cloud(Topology::Lines, primitives::segments(&pairs), offset, rng));
            }
            shape => {
                let base = shape_mesh(shape);
                for (index, position) in positions.iter().enumerate() {
                    out.push(self.mesh_element(&base, index, *position + offset, rng));
                }
            }
        }

        if let Some(links) = &group.links {
            if let Some(element) = self.links(links, &positions, offset, rng) {
                out.push(element);
            }
        }
    }

    fn material<R: Rng + ?Sized>(&self, rng: &mut R) -> Material {
        let color = pick_color(&self.group.palette, self.group.palette_mode, rng);
        let range = self.group.opacity;
        let opacity = if range.max > range.min {
            rng.random_range(range.min..=range.max)
        } else {
            range.min
        };
        Material::new(self.ledger, color, opacity * self.visual_opacity, &self.group.material)
    }

    fn mesh_element<R: Rng + ?Sized>(&self, base: &MeshData, index: usize, position: Vec3, rng: &mut R) -> VisualElement {
        let (topology, data) = if self.group.material.wireframe {
            (Topology::Lines, primitives::wireframe(base))
        } else {
            (Topology::Triangles, base.clone())
        };

        let rest = Transform {
            position,
            rotation: initial_rotation(&self.group.initial_rotation, position, rng),
            scale: Vec3::ONE,
        };
        let geometry = Geometry::new(self.ledger, topology, data);
        let material = self.material(rng);
        let mut element = VisualElement::new(ElementRole::Primary, self.group_index, index, rest, geometry, material)
            .with_motion(self.group.motion);

        if let Some(color) = self.group.outline {
            element = element.with_outline(Outline {
                geometry: Geometry::new(self.ledger, Topology::Lines, primitives::outline(base)),
                material: Material::new(self.ledger, color, self.visual_opacity, &MaterialStyle::unlit()),
            });
        }
        element
    }

    /// A single element holding every generated vertex, positioned at the
    /// group offset so it spins about its own centre.
    fn cloud<R: Rng + ?Sized>(&self, topology: Topology, data: MeshData, offset: Vec3, rng: &mut R) -> VisualElement {
        let geometry = Geometry::new(self.ledger, topology, data);
        let material = self.material(rng);
        VisualElement::new(ElementRole::Primary, self.group_index, 0, Transform::at(offset), geometry, material)
            .with_motion(self.group.motion)
    }

    fn links<R: Rng + ?Sized>(
        &self,
        style: &LinkStyle,
        positions: &[Vec3],
        offset: Vec3,
        rng: &mut R,
    ) -> Option<VisualElement> {
        let pairs = link_pairs(style.pattern, positions, rng);
        if pairs.is_empty() {
            return None;
        }
        let geometry = Geometry::new(self.ledger, Topology::Lines, primitives::segments(&pairs));
        let line_style = MaterialStyle {
            blending: self.group.material.blending,
            ..MaterialStyle::unlit()
        };
        let material = Material::new(self.ledger, style.color, style.opacity * self.visual_opacity, &line_style);
        Some(
            VisualElement::new(ElementRole::Link, self.group_index, 0, Transform::at(offset), geometry, material)
                .with_motion(style.motion),
        )
    }
}

fn shape_mesh(shape: Shape) -> MeshData {
    match shape {
        Shape::Box { size } => primitives::box_mesh(size),
        Shape::Plane { width, height } => primitives::plane_mesh(width, height),
        Shape::Polygon { radius, sides } => primitives::polygon_mesh(radius, sides),
        Shape::Sphere {
            radius,
            width_segments,
            height_segments,
        } => primitives::sphere_mesh(radius, width_segments, height_segments),
        Shape::Points | Shape::Segments => MeshData::default(),
    }
}

fn pick_color<R: Rng + ?Sized>(palette: &[Color], mode: PaletteMode, rng: &mut R) -> Color {
    match mode {
        PaletteMode::Fixed => palette[0],
        PaletteMode::Random => palette[rng.random_range(0..palette.len())],
    }
}

fn initial_rotation<R: Rng + ?Sized>(rotation: &InitialRotation, position: Vec3, rng: &mut R) -> Vec3 {
    match *rotation {
        InitialRotation::Fixed { radians } => Vec3::from_array(radians),
        InitialRotation::Random { max } => Vec3::new(
            rng.random::<f32>() * max[0],
            rng.random::<f32>() * max[1],
            rng.random::<f32>() * max[2],
        ),
        InitialRotation::FaceOrigin => facing_origin(position),
        InitialRotation::Identity => Vec3::ZERO,
    }
}

fn link_pairs<R: Rng + ?Sized>(pattern: LinkPattern, positions: &[Vec3], rng: &mut R) -> Vec<([f32; 3], [f32; 3])> {
    match pattern {
        LinkPattern::Chain => positions
            .windows(2)
            .map(|pair| (pair[1].to_array(), pair[0].to_array()))
            .collect(),
        LinkPattern::RandomPairs { count } => {
            if positions.is_empty() {
                return Vec::new();
            }
            (0..count)
                .map(|_| {
                    let a = positions[rng.random_range(0..positions.len())];
                    let b = positions[rng.random_range(0..positions.len())];
                    (a.to_array(), b.to_array())
                })
                .collect()
        }
    }
}

/// Generate `count` positions for a layout pattern.
pub fn layout_positions<R: Rng + ?Sized>(layout: &Layout, count: usize, rng: &mut R) -> Vec<Vec3> {
    match *layout {
        Layout::SphereSurface { radius } => (0..count)
            .map(|_| {
                let theta = rng.random::<f32>() * TAU;
                let phi = rng.random::<f32>() * PI;
                Vec3::new(
                    radius * phi.sin() * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                    radius * phi.cos(),
                )
            })
            .collect(),
        Layout::FibonacciSphere { radius } => {
            let n = count as f32;
            (0..count)
                .map(|i| {
                    let phi = (-1.0 + 2.0 * i as f32 / n).acos();
                    let theta = (n * PI).sqrt() * phi;
                    Vec3::new(
                        radius * theta.cos() * phi.sin(),
                        radius * theta.sin() * phi.sin(),
                        radius * phi.cos(),
                    )
                })
                .collect()
        }
        Layout::SphereGrid { radius, segments } => {
            let grid = primitives::sphere_mesh(radius, segments, segments).positions;
            grid.iter().cycle().take(count).map(|p| Vec3::from_array(*p)).collect()
        }
        Layout::Ring { radius } => (0..count)
            .map(|i| {
                let angle = i as f32 / count as f32 * TAU;
                Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0)
            })
            .collect(),
        Layout::Grid {
            columns,
            spacing,
            depth_jitter,
        } => {
            let columns = columns.max(1) as usize;
            let half = (columns - 1) as f32 * spacing * 0.5;
            (0..count)
                .map(|i| {
                    let col = (i % columns) as f32;
                    let row = (i / columns) as f32;
                    let z = (rng.random::<f32>() * 2.0 - 1.0) * depth_jitter;
                    Vec3::new(col * spacing - half, row * spacing - half, z)
                })
                .collect()
        }
        Layout::Timeline { length } => (0..count)
            .map(|i| {
                let x = if count > 1 {
                    i as f32 / (count - 1) as f32 * length - length * 0.5
                } else {
                    0.0
                };
                Vec3::new(x, 0.0, 0.0)
            })
            .collect(),
        Layout::BoxScatter { extent } => (0..count)
            .map(|_| {
                Vec3::new(
                    (rng.random::<f32>() - 0.5) * extent[0],
                    (rng.random::<f32>() - 0.5) * extent[1],
                    (rng.random::<f32>() - 0.5) * extent[2],
                )
            })
            .collect(),
        Layout::Origin => vec![Vec3::ZERO; count],
    }
}
