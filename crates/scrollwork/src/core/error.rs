use thiserror::Error;

use crate::api::types::TargetId;

/// Errors surfaced by the animation core.
///
/// None of these are fatal to the frame loop: callers log them and move on.
#[derive(Debug, Error)]
pub enum MotionError {
    /// The target handle does not resolve to a mounted element.
    #[error("target {0:?} is not mounted")]
    TargetMissing(TargetId),
    /// The target was mounted once but has since been detached.
    #[error("target {0:?} was detached")]
    TargetDetached(TargetId),
    /// A clock subscriber's owner has been torn down.
    #[error("subscriber owner was disposed")]
    Disposed,
    /// Manifest or config JSON could not be parsed.
    #[error("invalid motion json: {0}")]
    Json(#[from] serde_json::Error),
    /// A position string such as `"top bottom-=100"` could not be parsed.
    #[error("invalid trigger position {0:?}")]
    Position(String),
    /// A toggle-actions string such as `"play none none reverse"` could not be parsed.
    #[error("invalid toggle actions {0:?}")]
    ToggleActions(String),
}
