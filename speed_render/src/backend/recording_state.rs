/// Recording state machine shared by command buffer implementations
///
/// Idle -> Recording -> Idle, driven by `begin`/`end`. Every recording-only
/// operation is gated through `require_recording` before a backend touches
/// its native handle. An ended recording stays executable until it is
/// submitted once.

use glam::UVec2;
use crate::backend::pipeline::PipelineType;
use crate::error::Result;

/// Viewport (and matching scissor) covering a whole render size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport at the origin spanning `size`, depth range 0..1
    pub fn covering(size: UVec2) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.x as f32,
            height: size.y as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Recording flag, render size and bound pipeline kind of a command buffer
#[derive(Debug, Default, Clone)]
pub struct RecordingState {
    recording: bool,
    executable: bool,
    render_size: Option<UVec2>,
    pipeline_type: Option<PipelineType>,
}

impl RecordingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Idle -> Recording. Returns false if already recording.
    ///
    /// Pipeline bindings do not survive a new recording.
    pub fn begin(&mut self) -> bool {
        if self.recording {
            return false;
        }
        self.recording = true;
        self.executable = false;
        self.pipeline_type = None;
        true
    }

    /// Recording -> Idle. Returns false if not recording. Clears the render size.
    pub fn end(&mut self) -> bool {
        if !self.recording {
            return false;
        }
        self.render_size = None;
        self.recording = false;
        self.executable = true;
        true
    }

    /// True between `end` and the next submission
    pub fn is_executable(&self) -> bool {
        self.executable
    }

    /// Fails with `InvalidOperation` unless an ended recording is waiting
    /// for submission
    pub fn require_executable(&self) -> Result<()> {
        if self.recording {
            crate::engine_bail_warn!("speed::CommandBuffer", InvalidOperation,
                "Command buffer must be ended before being submitted");
        }
        if !self.executable {
            crate::engine_bail_warn!("speed::CommandBuffer", InvalidOperation,
                "Command buffer has no recorded commands to submit (never begun or already submitted)");
        }
        Ok(())
    }

    /// Executable -> Idle. The recording must be redone before the next submission.
    pub fn mark_submitted(&mut self) {
        self.executable = false;
    }

    /// Fails with `InvalidOperation` unless recording
    ///
    /// # Arguments
    ///
    /// * `operation` - Name of the rejected operation, used in the error message
    pub fn require_recording(&self, operation: &str) -> Result<()> {
        if !self.recording {
            crate::engine_bail_warn!("speed::CommandBuffer", InvalidOperation,
                "{}: this action can be performed only while recording", operation);
        }
        Ok(())
    }

    pub fn render_size(&self) -> Option<UVec2> {
        self.render_size
    }

    pub fn bound_pipeline_type(&self) -> Option<PipelineType> {
        self.pipeline_type
    }

    /// Store a new render size
    ///
    /// # Returns
    ///
    /// The viewport/scissor to re-issue, or `None` when the size was cleared
    pub fn set_render_size(&mut self, size: Option<UVec2>) -> Result<Option<Viewport>> {
        self.require_recording("set_render_size")?;

        if let Some(size) = size {
            if size.x == 0 || size.y == 0 {
                crate::engine_bail_warn!("speed::CommandBuffer", InvalidArgument,
                    "Render size must be non-zero, got {}x{}", size.x, size.y);
            }
        }

        self.render_size = size;
        Ok(size.map(Viewport::covering))
    }

    /// Register a pipeline bind
    ///
    /// # Returns
    ///
    /// The viewport/scissor to re-issue before binding (graphics pipelines only)
    ///
    /// # Errors
    ///
    /// `InvalidOperation` when not recording, or when binding a graphics
    /// pipeline without an active render size
    pub fn bind_pipeline(&mut self, pipeline_type: PipelineType) -> Result<Option<Viewport>> {
        self.require_recording("bind_pipeline")?;

        let viewport = match pipeline_type {
            PipelineType::Graphics => match self.render_size {
                Some(size) => Some(Viewport::covering(size)),
                None => crate::engine_bail_warn!("speed::CommandBuffer", InvalidOperation,
                    "Command buffer must have a render size for binding a graphics pipeline"),
            },
            PipelineType::Compute => None,
        };

        self.pipeline_type = Some(pipeline_type);
        Ok(viewport)
    }
}

#[cfg(test)]
#[path = "recording_state_tests.rs"]
mod tests;
