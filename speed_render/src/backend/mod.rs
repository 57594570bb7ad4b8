/// Backend-agnostic resource and command interfaces

pub mod backend_factory;
pub mod command_buffer;
pub mod device_buffer;
pub mod dispose_queue;
pub mod framebuffer;
pub mod pipeline;
pub mod recording_state;
pub mod render_pass;
pub mod renderer;
pub mod semaphore;
pub mod shader;
pub mod swapchain;
pub mod texture;
pub mod transfer;

pub use backend_factory::*;
pub use command_buffer::*;
pub use device_buffer::*;
pub use dispose_queue::*;
pub use framebuffer::*;
pub use pipeline::*;
pub use recording_state::*;
pub use render_pass::*;
pub use renderer::*;
pub use semaphore::*;
pub use shader::*;
pub use swapchain::*;
pub use texture::*;
pub use transfer::*;
