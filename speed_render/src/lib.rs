/*!
# Speed Render

Backend-agnostic core of an explicit-API rendering backend.

This crate defines the resource and command interfaces a GPU backend
implements, plus the backend-independent pieces of their behavior:
recording state machine, transfer bounds validation, deferred disposal of
transient resources, swapchain extent selection, errors and logging.

## Architecture

- **BackendFactory**: creates every resource (buffers, textures, passes, pipelines, swapchains)
- **Renderer**: submit, present and wait on command buffers
- **CommandBuffer**: Idle/Recording state machine for draws, clears and transfers
- **Texture**: semantic layout tracking (`TextureLayout`)
- **DeviceBuffer**: usage-tagged buffers, host mapping for staging buffers
- **Swapchain**: frame acquisition and recreation
- **Semaphore**: timeline synchronization

The Vulkan implementation lives in the `speed_render_vulkan` crate.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod backend;

// Main speed namespace module
pub mod speed {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton (logger)
    pub use crate::engine::Engine;

    // Backend entry traits
    pub use crate::backend::{BackendFactory, Config, Renderer};

    // Logging sub-module (types only, macros are exported at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Render sub-module with all backend types
    pub mod render {
        pub use crate::backend::*;
    }
}

// Re-export math types used in the public API
pub use glam;
