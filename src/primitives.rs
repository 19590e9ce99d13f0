//! CPU-side geometry: primitive generators and the owned [`Geometry`]
//! resource handed to the scene.

use std::collections::BTreeMap;
use std::f32::consts::{PI, TAU};

use crate::resource::{Releasable, ResourceId, ResourceKind, ResourceLedger, ResourceToken};

/// How the vertex stream is assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    Lines,
    Points,
}

/// Untracked vertex data produced by the generators below.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    fn push(&mut self, position: [f32; 3], normal: [f32; 3]) -> u32 {
        self.positions.push(position);
        self.normals.push(normal);
        (self.positions.len() - 1) as u32
    }
}

/// An allocated geometry. Owned by exactly one scene element.
#[derive(Debug)]
pub struct Geometry {
    token: ResourceToken,
    topology: Topology,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    indices: Vec<u32>,
}

impl Geometry {
    pub fn new(ledger: &ResourceLedger, topology: Topology, data: MeshData) -> Self {
        debug_assert_eq!(data.positions.len(), data.normals.len());
        Self {
            token: ledger.allocate(ResourceKind::Geometry),
            topology,
            positions: data.positions,
            normals: data.normals,
            indices: data.indices,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.token.id()
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Nothing to draw (no indices, or already released).
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl Releasable for Geometry {
    fn release(&mut self) {
        if self.token.release() {
            self.positions = Vec::new();
            self.normals = Vec::new();
            self.indices = Vec::new();
        }
    }

    fn is_released(&self) -> bool {
        self.token.is_released()
    }
}

/// Axis-aligned cube of edge `size`, centered at origin, flat-shaded.
pub fn box_mesh(size: f32) -> MeshData {
    let h = size * 0.5;
    // (normal, u axis, v axis) per face; corners wound counter-clockwise.
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ];

    let mut mesh = MeshData::default();
    for (n, u, v) in faces {
        let corner = |su: f32, sv: f32| {
            [
                (n[0] + u[0] * su + v[0] * sv) * h,
                (n[1] + u[1] * su + v[1] * sv) * h,
                (n[2] + u[2] * su + v[2] * sv) * h,
            ]
        };
        let a = mesh.push(corner(-1.0, -1.0), n);
        let b = mesh.push(corner(1.0, -1.0), n);
        let c = mesh.push(corner(1.0, 1.0), n);
        let d = mesh.push(corner(-1.0, 1.0), n);
        mesh.indices.extend_from_slice(&[a, b, c, c, d, a]);
    }
    mesh
}

/// Rectangle in the XY plane facing +Z.
pub fn plane_mesh(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let n = [0.0, 0.0, 1.0];
    let mut mesh = MeshData::default();
    let a = mesh.push([-hw, -hh, 0.0], n);
    let b = mesh.push([hw, -hh, 0.0], n);
    let c = mesh.push([hw, hh, 0.0], n);
    let d = mesh.push([-hw, hh, 0.0], n);
    mesh.indices.extend_from_slice(&[a, b, c, c, d, a]);
    mesh
}

/// Regular polygon (triangle fan) in the XY plane facing +Z. Six sides
/// gives a hexagon.
pub fn polygon_mesh(radius: f32, sides: u32) -> MeshData {
    let n = [0.0, 0.0, 1.0];
    let mut mesh = MeshData::default();
    let center = mesh.push([0.0, 0.0, 0.0], n);
    for side in 0..sides {
        let angle = TAU * side as f32 / sides as f32;
        mesh.push([radius * angle.cos(), radius * angle.sin(), 0.0], n);
    }
    for side in 0..sides {
        let a = center + 1 + side;
        let b = center + 1 + (side + 1) % sides;
        mesh.indices.extend_from_slice(&[center, a, b]);
    }
    mesh
}

/// UV sphere centered at origin.
pub fn sphere_mesh(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();

    for lat in 0..=height_segments {
        let theta = PI * lat as f32 / height_segments as f32;
        for lon in 0..=width_segments {
            let phi = TAU * lon as f32 / width_segments as f32;
            let normal = [phi.cos() * theta.sin(), theta.cos(), phi.sin() * theta.sin()];
            mesh.push([normal[0] * radius, normal[1] * radius, normal[2] * radius], normal);
        }
    }

    for lat in 0..height_segments {
        for lon in 0..width_segments {
            let first = lat * (width_segments + 1) + lon;
            let second = first + width_segments + 1;
            mesh.indices.extend_from_slice(&[first, first + 1, second, second, first + 1, second + 1]);
        }
    }

    mesh
}

/// Convert a triangle mesh to its unique edges, for wireframe drawing.
pub fn wireframe(mesh: &MeshData) -> MeshData {
    let edges = edge_usage(&mesh.indices);
    MeshData {
        positions: mesh.positions.clone(),
        normals: mesh.normals.clone(),
        indices: edges.keys().flat_map(|&(a, b)| [a, b]).collect(),
    }
}

/// Boundary edges of a triangle mesh (edges used by a single triangle).
/// For flat shapes this is the visible border.
pub fn outline(mesh: &MeshData) -> MeshData {
    let edges = edge_usage(&mesh.indices);
    MeshData {
        positions: mesh.positions.clone(),
        normals: mesh.normals.clone(),
        indices: edges
            .iter()
            .filter(|(_, &uses)| uses == 1)
            .flat_map(|(&(a, b), _)| [a, b])
            .collect(),
    }
}

/// Unindexed point list.
pub fn point_cloud(points: &[[f32; 3]]) -> MeshData {
    MeshData {
        positions: points.to_vec(),
        normals: vec![[0.0, 0.0, 1.0]; points.len()],
        indices: (0..points.len() as u32).collect(),
    }
}

/// Independent line segments from endpoint pairs.
pub fn segments(pairs: &[([f32; 3], [f32; 3])]) -> MeshData {
    let mut mesh = MeshData::default();
    for &(start, end) in pairs {
        let a = mesh.push(start, [0.0, 0.0, 1.0]);
        let b = mesh.push(end, [0.0, 0.0, 1.0]);
        mesh.indices.extend_from_slice(&[a, b]);
    }
    mesh
}

fn edge_usage(indices: &[u32]) -> BTreeMap<(u32, u32), usize> {
    let mut edges = BTreeMap::new();
    for tri in indices.chunks_exact(3) {
        for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            let edge = if a < b { (a, b) } else { (b, a) };
            *edges.entry(edge).or_insert(0) += 1;
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn length(p: [f32; 3]) -> f32 {
        (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt()
    }

    #[test]
    fn test_box_mesh() {
        let mesh = box_mesh(0.3);
        assert_eq!(mesh.positions.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        for p in &mesh.positions {
            for c in p {
                assert!((c.abs() - 0.15).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_polygon_mesh() {
        let mesh = polygon_mesh(0.3, 6);
        assert_eq!(mesh.positions.len(), 7);
        assert_eq!(mesh.indices.len(), 18);
        for p in &mesh.positions[1..] {
            assert!((length(*p) - 0.3).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sphere_mesh_radius() {
        let mesh = sphere_mesh(2.0, 32, 32);
        assert_eq!(mesh.positions.len(), 33 * 33);
        assert_eq!(mesh.indices.len(), 32 * 32 * 6);
        for p in &mesh.positions {
            assert!((length(*p) - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_plane_outline_is_border() {
        let outline = outline(&plane_mesh(1.5, 1.0));
        // Four border edges; the shared diagonal is dropped.
        assert_eq!(outline.indices.len(), 8);
    }

    #[test]
    fn test_wireframe_edges_are_unique() {
        let edges = wireframe(&box_mesh(1.0));
        // 6 faces * (4 border + 1 diagonal)
        assert_eq!(edges.indices.len(), 30 * 2);
    }

    #[test]
    fn test_geometry_release_clears_data() {
        let ledger = ResourceLedger::new();
        let mut geometry = Geometry::new(&ledger, Topology::Triangles, box_mesh(1.0));
        assert_eq!(geometry.vertex_count(), 24);

        geometry.release();
        assert!(geometry.is_released());
        assert_eq!(geometry.vertex_count(), 0);
        assert!(ledger.counts().is_balanced());
    }
}
