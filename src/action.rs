//! Drawing actions: the unit of replication.
//!
//! Rendering and input capture live outside this crate. The drawing surface
//! produces `Path` actions from strokes and consumes every action to render;
//! nothing here interprets geometry.

use serde::{Deserialize, Serialize};

/// Brush size bounds offered by the toolbar.
pub const MIN_BRUSH_SIZE: f64 = 1.0;
pub const MAX_BRUSH_SIZE: f64 = 50.0;

/// Tool that produced a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Brush,
    /// Paints with the background color.
    Eraser,
}

/// Canvas-space point. Coordinates are `f64` end to end because the frame
/// codec normalizes every JSON number to a float.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// One freehand stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStroke {
    pub points: Vec<Point>,
    pub tool: Tool,
    /// CSS hex color, e.g. `#FF0000`.
    pub color: String,
    pub size: f64,
}

impl PathStroke {
    #[must_use]
    pub fn new(tool: Tool, color: impl Into<String>, size: f64, points: Vec<Point>) -> Self {
        Self { points, tool, color: color.into(), size: size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE) }
    }
}

/// Emoji reaction placed at a canvas position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmojiBurst {
    pub emoji: String,
    pub x: f64,
    pub y: f64,
}

/// A replicated drawing operation. Immutable once created.
///
/// Wire shape: `{"type": "path", "data": {...}}`; `clear` and `undo` carry no
/// `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum DrawingAction {
    Path(PathStroke),
    Clear,
    Undo,
    Emoji(EmojiBurst),
}

impl DrawingAction {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Clear => "clear",
            Self::Undo => "undo",
            Self::Emoji(_) => "emoji",
        }
    }

    /// Sound/animation cue the feedback collaborator should play, if any.
    /// Eraser strokes are silent.
    #[must_use]
    pub fn feedback(&self) -> Option<Feedback> {
        match self {
            Self::Path(stroke) if stroke.tool == Tool::Brush => Some(Feedback::Draw),
            Self::Path(_) => None,
            Self::Clear => Some(Feedback::Clear),
            Self::Undo => Some(Feedback::Undo),
            Self::Emoji(_) => Some(Feedback::Emoji),
        }
    }
}

/// Reaction cues for the feedback collaborator. No acknowledgment path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Draw,
    Clear,
    Undo,
    Emoji,
    Join,
}

#[cfg(test)]
#[path = "action_test.rs"]
mod tests;
