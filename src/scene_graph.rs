//! Scene graph for one section visual.
//!
//! A [`Scene`] owns every [`VisualElement`] the factory produced plus the
//! light rig. Elements are moved in on [`Scene::add`], so an element can
//! only ever be inserted once, and every geometry/material has exactly one
//! owner until [`Scene::release_all`].

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::camera::PerspectiveCamera;
use crate::config::SceneConfig;
use crate::lighting::LightRig;
use crate::material::Material;
use crate::motion::Motion;
use crate::primitives::Geometry;
use crate::resource::Releasable;
use crate::viewport::Viewport;

/// Unique identifier for scene elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Transform component for scene elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3, // Euler angles (XYZ) in radians
    pub scale: Vec3,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn model_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Whether an element was generated from `count` or is auxiliary geometry
/// (connector lines) derived from generated positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRole {
    Primary,
    Link,
}

/// Border edges drawn with the parent element's transform.
#[derive(Debug)]
pub struct Outline {
    pub geometry: Geometry,
    pub material: Material,
}

/// One drawable primitive: a mesh, a point cloud or a line-segment set.
#[derive(Debug)]
pub struct VisualElement {
    pub role: ElementRole,
    /// Index of the config group this element came from.
    pub group: usize,
    /// Phase offset for the motion laws.
    pub index: usize,
    /// Transform at creation; motion is always applied relative to it.
    pub rest: Transform,
    pub transform: Transform,
    pub motion: Motion,
    pub geometry: Geometry,
    pub material: Material,
    pub outline: Option<Outline>,
    pub visible: bool,
}

impl VisualElement {
    pub fn new(role: ElementRole, group: usize, index: usize, rest: Transform, geometry: Geometry, material: Material) -> Self {
        Self {
            role,
            group,
            index,
            rest,
            transform: rest,
            motion: Motion::default(),
            geometry,
            material,
            outline: None,
            visible: true,
        }
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }

    pub fn with_outline(mut self, outline: Outline) -> Self {
        self.outline = Some(outline);
        self
    }

    /// Recompute the transform for clock time `t`.
    pub fn animate(&mut self, t: f64) {
        if self.motion.is_static() {
            return;
        }
        self.transform = self.motion.sample(t, self.index).apply(&self.rest);
    }

    /// Every resource this element owns, regardless of shape.
    pub fn resources_mut(&mut self) -> Vec<&mut dyn Releasable> {
        let mut resources: Vec<&mut dyn Releasable> = vec![&mut self.geometry, &mut self.material];
        if let Some(outline) = &mut self.outline {
            resources.push(&mut outline.geometry);
            resources.push(&mut outline.material);
        }
        resources
    }

    pub fn is_released(&self) -> bool {
        self.geometry.is_released()
            && self.material.is_released()
            && self
                .outline
                .as_ref()
                .map_or(true, |o| o.geometry.is_released() && o.material.is_released())
    }
}

/// The scene: elements plus lights.
#[derive(Debug)]
pub struct Scene {
    elements: Vec<(ElementId, VisualElement)>,
    lights: LightRig,
    /// Next element ID to assign.
    next_id: u64,
    released: bool,
}

impl Scene {
    pub fn new(lights: LightRig) -> Self {
        Self {
            elements: Vec::new(),
            lights,
            next_id: 1,
            released: false,
        }
    }

    /// Take ownership of an element and return its ID.
    pub fn add(&mut self, element: VisualElement) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        self.elements.push((id, element));
        id
    }

    pub fn get(&self, id: ElementId) -> Option<&VisualElement> {
        self.elements.iter().find(|(e, _)| *e == id).map(|(_, element)| element)
    }

    /// All elements in insertion order (for rendering).
    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &VisualElement)> {
        self.elements.iter().map(|(id, element)| (*id, element))
    }

    /// Elements generated from group counts, excluding links.
    pub fn primary_elements(&self) -> impl Iterator<Item = &VisualElement> {
        self.elements
            .iter()
            .map(|(_, element)| element)
            .filter(|element| element.role == ElementRole::Primary)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    /// Apply the motion laws for clock time `t` to every element.
    pub fn advance_to(&mut self, t: f64) {
        for (_, element) in &mut self.elements {
            element.animate(t);
        }
    }

    /// Number of geometries and materials owned by the scene.
    pub fn resource_count(&self) -> usize {
        self.elements
            .iter()
            .map(|(_, e)| if e.outline.is_some() { 4 } else { 2 })
            .sum()
    }

    /// Release every owned geometry and material. Returns how many were
    /// released by this call; a second call releases nothing.
    pub fn release_all(&mut self) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;

        let mut count = 0;
        for (_, element) in &mut self.elements {
            for resource in element.resources_mut() {
                if !resource.is_released() {
                    resource.release();
                    count += 1;
                }
            }
        }
        count
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

/// Build a scene from factory output: every element added once, the light
/// rig from the config, and a camera bound to the viewport's aspect.
pub fn assemble(
    elements: Vec<VisualElement>,
    config: &SceneConfig,
    viewport: Viewport,
) -> (Scene, PerspectiveCamera) {
    let mut scene = Scene::new(LightRig::from_settings(&config.lighting));
    for element in elements {
        scene.add(element);
    }

    let mut camera = PerspectiveCamera::new(&config.camera, 1.0);
    camera.set_aspect(viewport.aspect());

    log::debug!(
        "{}: assembled {} elements ({} resources)",
        config.name,
        scene.len(),
        scene.resource_count()
    );
    (scene, camera)
}
