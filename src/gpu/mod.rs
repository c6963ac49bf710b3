//! GPU Device Layer
//!
//! Asset finalization talks to the graphics API through the object-safe
//! [`GpuDevice`] trait instead of raw GL calls. Two backends exist:
//!
//! - [`GlDevice`]: the real OpenGL backend over `glow`, bound to the thread
//!   that owns the context (the device types are deliberately `!Sync`).
//! - [`HeadlessDevice`]: a recording backend that allocates ids and logs
//!   every operation, so the whole pipeline runs without a context.
//!
//! GPU objects created during finalize are wrapped in the RAII types from
//! [`release`]; dropping a wrapper on any thread forwards the id into a
//! channel that the notifier pass drains on the GL thread.

pub mod device;
pub mod gl;
pub mod headless;
pub mod release;

pub use device::{
    BufferId, GpuDevice, LinkedProgram, ProgramDesc, ProgramId, StageLogs, TextureDesc, TextureId,
    TextureKind, mip_count,
};
pub use gl::GlDevice;
pub use headless::{GpuOp, HeadlessDevice};
pub use release::{GpuBuffer, GpuProgram, GpuTexture, ReleaseQueue, ReleaseSender};

/// Everything a finalize step may touch: the device plus the release channel
/// used to adopt freshly created GPU objects into RAII wrappers.
pub struct GpuContext<'a> {
    /// The device owning the current GL context (or a headless stand-in).
    pub device: &'a dyn GpuDevice,
    releases: ReleaseSender,
}

impl<'a> GpuContext<'a> {
    pub(crate) fn new(device: &'a dyn GpuDevice, releases: ReleaseSender) -> Self {
        Self { device, releases }
    }

    /// Wraps a texture id so it is deleted when its owner drops.
    #[must_use]
    pub fn own_texture(&self, id: TextureId) -> GpuTexture {
        GpuTexture::new(id, self.releases.clone())
    }

    /// Wraps a buffer id so it is deleted when its owner drops.
    #[must_use]
    pub fn own_buffer(&self, id: BufferId) -> GpuBuffer {
        GpuBuffer::new(id, self.releases.clone())
    }

    /// Wraps a program id so it is deleted when its owner drops.
    #[must_use]
    pub fn own_program(&self, id: ProgramId) -> GpuProgram {
        GpuProgram::new(id, self.releases.clone())
    }
}
