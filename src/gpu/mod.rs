pub mod context;
pub mod mesh;
pub mod pipeline;
pub mod renderer;
