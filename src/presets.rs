//! Built-in visuals for the site's page sections.
//!
//! Rates were tuned at 60 frames per second; they are stored here as
//! per-second values.

use std::f32::consts::PI;

use crate::config::{
    ElementGroup, InitialRotation, Layout, LinkPattern, LinkStyle, OpacityRange, PaletteMode, SceneConfig, Shape,
};
use crate::material::{Blending, Color, MaterialStyle, Shading};
use crate::motion::{Motion, Wave};

const VIOLET: Color = Color(0x8b5cf6);
const PURPLE: Color = Color(0x6d28d9);
const INDIGO: Color = Color(0x4c1d95);
const LAVENDER: Color = Color(0x7c3aed);

/// Section names in page order.
pub const SECTIONS: [&str; 6] = ["about", "skills", "projects", "experience", "certifications", "contact"];

/// Look up a section's visual by name.
pub fn section(name: &str) -> Option<SceneConfig> {
    let config = match name {
        "about" => about(),
        "skills" => skills(),
        "projects" => projects(),
        "experience" => experience(),
        "certifications" => certifications(),
        "contact" => contact(),
        _ => return None,
    };
    Some(config)
}

pub fn all() -> Vec<SceneConfig> {
    SECTIONS.iter().filter_map(|name| section(name)).collect()
}

fn group(label: &str, shape: Shape, count: usize, layout: Layout, color: Color) -> ElementGroup {
    ElementGroup {
        label: label.to_string(),
        shape,
        count,
        layout,
        offset: [0.0; 3],
        palette: vec![color],
        palette_mode: PaletteMode::Fixed,
        opacity: OpacityRange::default(),
        material: MaterialStyle::default(),
        initial_rotation: InitialRotation::Identity,
        outline: None,
        links: None,
        motion: Motion::default(),
    }
}

fn glow() -> MaterialStyle {
    MaterialStyle {
        blending: Blending::Additive,
        ..MaterialStyle::unlit()
    }
}

/// Drifting particles behind the foreground shapes.
fn dust(extent: [f32; 3]) -> ElementGroup {
    ElementGroup {
        material: glow(),
        motion: Motion::spinning(0.03, 0.03, 0.0),
        ..group("dust", Shape::Points, 100, Layout::BoxScatter { extent }, VIOLET)
    }
}

fn scene(name: &str, opacity: f32, groups: Vec<ElementGroup>) -> SceneConfig {
    SceneConfig {
        name: name.to_string(),
        opacity,
        camera: Default::default(),
        lighting: Default::default(),
        groups,
    }
}

fn about() -> SceneConfig {
    let cubes = ElementGroup {
        palette: vec![VIOLET, PURPLE, INDIGO, LAVENDER],
        palette_mode: PaletteMode::Random,
        opacity: OpacityRange::fixed(0.7),
        material: MaterialStyle {
            shading: Shading::Phong { shininess: 100.0 },
            ..MaterialStyle::default()
        },
        initial_rotation: InitialRotation::Random { max: [PI, PI, 0.0] },
        motion: Motion {
            spin: [0.18, 0.24, 0.0],
            spin_per_index: [0.006, 0.006, 0.0],
            float: Some(Wave::new(0.12, 1.0)),
            ..Motion::default()
        },
        ..group("cubes", Shape::Box { size: 0.3 }, 20, Layout::SphereSurface { radius: 4.0 }, VIOLET)
    };
    scene("about", 0.4, vec![cubes])
}

fn skills() -> SceneConfig {
    let sphere = ElementGroup {
        offset: [0.0, 0.7, 0.0],
        material: MaterialStyle::unlit(),
        motion: Motion::spinning(0.12, 0.18, 0.0),
        ..group(
            "sphere",
            Shape::Points,
            33 * 33,
            Layout::SphereGrid {
                radius: 2.0,
                segments: 32,
            },
            VIOLET,
        )
    };
    let lines = ElementGroup {
        opacity: OpacityRange::fixed(0.3),
        material: MaterialStyle::unlit(),
        motion: Motion::spinning(0.06, 0.12, 0.0),
        ..group("lines", Shape::Segments, 50, Layout::BoxScatter { extent: [4.0; 3] }, PURPLE)
    };
    scene("skills", 0.3, vec![sphere, lines])
}

fn projects() -> SceneConfig {
    let hexagons = ElementGroup {
        opacity: OpacityRange { min: 0.5, max: 0.8 },
        material: MaterialStyle {
            double_sided: true,
            ..MaterialStyle::default()
        },
        initial_rotation: InitialRotation::Fixed {
            radians: [PI / 2.0, 0.0, 0.0],
        },
        motion: Motion {
            spin: [0.0, 0.0, 0.12],
            pulse: Some(Wave::new(0.1, 1.0)),
            ..Motion::default()
        },
        ..group(
            "hexagons",
            Shape::Polygon { radius: 0.3, sides: 6 },
            30,
            Layout::Grid {
                columns: 5,
                spacing: 1.1,
                depth_jitter: 1.0,
            },
            VIOLET,
        )
    };
    scene("projects", 0.3, vec![hexagons])
}

fn experience() -> SceneConfig {
    let milestones = ElementGroup {
        material: MaterialStyle {
            shading: Shading::Phong { shininess: 100.0 },
            emissive: Some(INDIGO),
            ..MaterialStyle::default()
        },
        links: Some(LinkStyle {
            pattern: LinkPattern::Chain,
            color: PURPLE,
            opacity: 1.0,
            motion: Motion::default(),
        }),
        motion: Motion {
            pulse: Some(Wave::new(0.2, 1.0)),
            ..Motion::default()
        },
        ..group(
            "milestones",
            Shape::Sphere {
                radius: 0.1,
                width_segments: 16,
                height_segments: 16,
            },
            5,
            Layout::Timeline { length: 6.0 },
            VIOLET,
        )
    };
    scene("experience", 0.3, vec![milestones, dust([8.0, 4.0, 4.0])])
}

fn certifications() -> SceneConfig {
    let cards = ElementGroup {
        opacity: OpacityRange::fixed(0.5),
        material: MaterialStyle {
            double_sided: true,
            ..MaterialStyle::default()
        },
        initial_rotation: InitialRotation::FaceOrigin,
        outline: Some(Color::WHITE),
        motion: Motion {
            orbit: Some(0.3),
            ..Motion::default()
        },
        ..group("cards", Shape::Plane { width: 1.5, height: 1.0 }, 5, Layout::Ring { radius: 3.0 }, VIOLET)
    };
    scene("certifications", 0.3, vec![cards, dust([8.0; 3])])
}

fn contact() -> SceneConfig {
    let globe = ElementGroup {
        opacity: OpacityRange::fixed(0.3),
        material: MaterialStyle {
            wireframe: true,
            ..MaterialStyle::default()
        },
        motion: Motion::spinning(0.0, 0.12, 0.0),
        ..group(
            "globe",
            Shape::Sphere {
                radius: 2.0,
                width_segments: 32,
                height_segments: 32,
            },
            1,
            Layout::Origin,
            PURPLE,
        )
    };
    let points = ElementGroup {
        material: glow(),
        links: Some(LinkStyle {
            pattern: LinkPattern::RandomPairs { count: 30 },
            color: VIOLET,
            opacity: 0.3,
            motion: Motion::spinning(0.0, 0.12, 0.0),
        }),
        motion: Motion::spinning(0.0, 0.12, 0.0),
        ..group("points", Shape::Points, 200, Layout::FibonacciSphere { radius: 2.0 }, VIOLET)
    };
    scene("contact", 0.3, vec![globe, points])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_sections_validate() {
        let configs = all();
        assert_eq!(configs.len(), SECTIONS.len());
        for config in &configs {
            config.validate().unwrap();
            assert!(config.element_count() > 0, "{} is empty", config.name);
        }
    }

    #[test]
    fn test_unknown_section() {
        assert!(section("hero").is_none());
    }

    #[test]
    fn test_about_matches_scatter_scenario() {
        let about = section("about").unwrap();
        assert_eq!(about.element_count(), 20);
        assert_eq!(about.groups[0].layout, Layout::SphereSurface { radius: 4.0 });
    }

    #[test]
    fn test_presets_survive_json() {
        for config in all() {
            let json = serde_json::to_string(&config).unwrap();
            assert_eq!(SceneConfig::from_json(&json).unwrap(), config);
        }
    }
}
