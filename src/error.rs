//! Error taxonomy for section visuals.
//!
//! Only genuine failures live here. Skipped initialisation and stale
//! callbacks are ordinary outcomes (see [`crate::lifecycle::MountOutcome`]
//! and [`crate::lifecycle::CallbackOutcome`]), never errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisualError {
    /// The host could not provide a drawing context (no canvas, no GPU
    /// adapter, device request refused, ...). Non-fatal: the visual simply
    /// does not render.
    #[error("drawing context unavailable: {0}")]
    ResourceCreation(String),

    /// A scene config failed validation.
    #[error("invalid scene config: {0}")]
    InvalidConfig(String),

    /// A scene config could not be parsed from JSON.
    #[error("failed to parse scene config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The host refused to register a frame or resize callback.
    #[error("host callback registration failed: {0}")]
    Host(String),

    /// A frame could not be drawn or captured.
    #[error("frame not rendered: {0}")]
    Render(String),
}

impl VisualError {
    pub fn resource(message: impl Into<String>) -> Self {
        Self::ResourceCreation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }
}
