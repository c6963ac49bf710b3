//! Deferred GPU object release.
//!
//! Payloads own their GPU objects through [`GpuTexture`], [`GpuBuffer`] and
//! [`GpuProgram`]. The last handle to an asset can drop on any thread, but
//! deletion must happen where the context lives, so the wrappers forward
//! their id into a channel instead of calling the device directly. The
//! notifier pass drains the channel each frame and performs the deletes.
//! Each wrapper releases its id exactly once.

use flume::{Receiver, Sender};

use super::device::{BufferId, GpuDevice, ProgramId, TextureId};

/// An id travelling from a dropped wrapper to the GL thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasedObject {
    Texture(TextureId),
    Buffer(BufferId),
    Program(ProgramId),
}

/// Clonable sending half handed to every RAII wrapper.
#[derive(Clone)]
pub struct ReleaseSender(Sender<ReleasedObject>);

impl ReleaseSender {
    fn send(&self, obj: ReleasedObject) {
        // A closed channel means the server is gone; the context (and its
        // objects) are going away with it.
        let _ = self.0.send(obj);
    }
}

/// Both halves of the release channel, owned by the asset server.
pub struct ReleaseQueue {
    tx: Sender<ReleasedObject>,
    rx: Receiver<ReleasedObject>,
}

impl ReleaseQueue {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self { tx, rx }
    }

    #[must_use]
    pub fn sender(&self) -> ReleaseSender {
        ReleaseSender(self.tx.clone())
    }

    /// Deletes every pending id through the device. Returns how many objects
    /// were released.
    pub fn drain(&self, device: &dyn GpuDevice) -> usize {
        let mut released = 0;
        for obj in self.rx.try_iter() {
            match obj {
                ReleasedObject::Texture(id) => device.delete_texture(id),
                ReleasedObject::Buffer(id) => device.delete_buffer(id),
                ReleasedObject::Program(id) => device.delete_program(id),
            }
            released += 1;
        }
        if released > 0 {
            log::trace!("released {released} GPU objects");
        }
        released
    }
}

impl Default for ReleaseQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive ownership of a GPU texture object.
pub struct GpuTexture {
    id: TextureId,
    releases: ReleaseSender,
}

impl GpuTexture {
    #[must_use]
    pub fn new(id: TextureId, releases: ReleaseSender) -> Self {
        Self { id, releases }
    }

    #[must_use]
    pub fn id(&self) -> TextureId {
        self.id
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        self.releases.send(ReleasedObject::Texture(self.id));
    }
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GpuTexture").field(&self.id).finish()
    }
}

/// Exclusive ownership of a GPU buffer object.
pub struct GpuBuffer {
    id: BufferId,
    releases: ReleaseSender,
}

impl GpuBuffer {
    #[must_use]
    pub fn new(id: BufferId, releases: ReleaseSender) -> Self {
        Self { id, releases }
    }

    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        self.releases.send(ReleasedObject::Buffer(self.id));
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GpuBuffer").field(&self.id).finish()
    }
}

/// Exclusive ownership of a GPU program object.
pub struct GpuProgram {
    id: ProgramId,
    releases: ReleaseSender,
}

impl GpuProgram {
    #[must_use]
    pub fn new(id: ProgramId, releases: ReleaseSender) -> Self {
        Self { id, releases }
    }

    #[must_use]
    pub fn id(&self) -> ProgramId {
        self.id
    }
}

impl Drop for GpuProgram {
    fn drop(&mut self) {
        self.releases.send(ReleasedObject::Program(self.id));
    }
}

impl std::fmt::Debug for GpuProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GpuProgram").field(&self.id).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
