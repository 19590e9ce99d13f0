//! Ambient 3D section visuals: declarative scene configs, a procedural
//! element factory, and a mount/unmount lifecycle that owns every GPU
//! resource it allocates.

pub mod animation;
pub mod camera;
pub mod config;
pub mod error;
pub mod factory;
pub mod gpu;
pub mod lifecycle;
pub mod lighting;
pub mod material;
pub mod motion;
pub mod presets;
pub mod primitives;
pub mod resource;
pub mod scene_graph;
pub mod surface;
pub mod viewport;

pub use config::SceneConfig;
pub use error::VisualError;
pub use lifecycle::{CallbackOutcome, Host, MountOutcome, Phase, SceneVisual};

#[cfg(not(target_arch = "wasm32"))]
pub mod offscreen;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
