//! Recording backend with no GPU behind it.
//!
//! Hands out ids and appends every call to an operation log. Integration
//! tests run the full pipeline against it and assert on the log (upload
//! counts, delete pairing, finalize ordering). It can also be told to fail
//! the next program link to exercise the degrade path.

use std::cell::{Cell, RefCell};

use crate::errors::{CandelaError, Result};

use super::device::{
    BufferId, GpuDevice, LinkedProgram, ProgramDesc, ProgramId, StageLogs, TextureDesc, TextureId,
    TextureKind,
};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuOp {
    CreateTexture {
        id: TextureId,
        kind: TextureKind,
        width: u32,
        height: u32,
        layers: u32,
        mip_levels: u32,
    },
    UploadTexture {
        id: TextureId,
        layer: u32,
        bytes: usize,
    },
    GenerateMipmaps(TextureId),
    BindTexture {
        unit: u32,
        id: TextureId,
    },
    DeleteTexture(TextureId),
    CreateBuffer {
        id: BufferId,
        bytes: usize,
    },
    DeleteBuffer(BufferId),
    CreateProgram {
        id: ProgramId,
        stages: u32,
        link_ok: bool,
    },
    BindProgram(ProgramId),
    DeleteProgram(ProgramId),
}

/// In-memory [`GpuDevice`] that records instead of rendering.
#[derive(Default)]
pub struct HeadlessDevice {
    next_id: Cell<u32>,
    ops: RefCell<Vec<GpuOp>>,
    fail_next_link: Cell<bool>,
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            ops: RefCell::new(Vec::new()),
            fail_next_link: Cell::new(false),
        }
    }

    fn alloc_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn record(&self, op: GpuOp) {
        self.ops.borrow_mut().push(op);
    }

    /// Snapshot of every call recorded so far, in call order.
    #[must_use]
    pub fn ops(&self) -> Vec<GpuOp> {
        self.ops.borrow().clone()
    }

    /// Number of recorded ops matching `pred`.
    pub fn count(&self, pred: impl Fn(&GpuOp) -> bool) -> usize {
        self.ops.borrow().iter().filter(|op| pred(op)).count()
    }

    /// Makes the next `create_program` report a link failure.
    pub fn fail_next_link(&self) {
        self.fail_next_link.set(true);
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureId> {
        let id = TextureId(self.alloc_id());
        self.record(GpuOp::CreateTexture {
            id,
            kind: desc.kind,
            width: desc.width,
            height: desc.height,
            layers: desc.layers,
            mip_levels: desc.mip_levels,
        });
        Ok(id)
    }

    fn upload_texture(
        &self,
        id: TextureId,
        desc: &TextureDesc,
        layer: u32,
        pixels: &[u8],
    ) -> Result<()> {
        if pixels.len() < desc.layer_len() {
            return Err(CandelaError::GpuObjectCreate(format!(
                "texture upload for {id:?} needs {} bytes, got {}",
                desc.layer_len(),
                pixels.len()
            )));
        }
        self.record(GpuOp::UploadTexture {
            id,
            layer,
            bytes: pixels.len(),
        });
        Ok(())
    }

    fn generate_mipmaps(&self, id: TextureId) {
        self.record(GpuOp::GenerateMipmaps(id));
    }

    fn bind_texture(&self, unit: u32, id: TextureId) {
        self.record(GpuOp::BindTexture { unit, id });
    }

    fn delete_texture(&self, id: TextureId) {
        self.record(GpuOp::DeleteTexture(id));
    }

    fn create_vertex_buffer(&self, bytes: &[u8]) -> Result<BufferId> {
        let id = BufferId(self.alloc_id());
        self.record(GpuOp::CreateBuffer {
            id,
            bytes: bytes.len(),
        });
        Ok(id)
    }

    fn delete_buffer(&self, id: BufferId) {
        self.record(GpuOp::DeleteBuffer(id));
    }

    fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<LinkedProgram> {
        let id = ProgramId(self.alloc_id());
        let link_ok = !self.fail_next_link.replace(false);
        let stages = 2 + u32::from(desc.geometry.is_some());
        self.record(GpuOp::CreateProgram {
            id,
            stages,
            link_ok,
        });
        Ok(LinkedProgram {
            id,
            link_ok,
            link_log: if link_ok {
                String::new()
            } else {
                "simulated link failure".to_string()
            },
            stage_logs: StageLogs::new(),
        })
    }

    fn bind_program(&self, id: ProgramId) {
        self.record(GpuOp::BindProgram(id));
    }

    fn delete_program(&self, id: ProgramId) {
        self.record(GpuOp::DeleteProgram(id));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let device = HeadlessDevice::new();
        let desc = TextureDesc::d2(2, 2);
        let id = device.create_texture(&desc).unwrap();
        device
            .upload_texture(id, &desc, 0, &[0u8; 16])
            .unwrap();
        device.delete_texture(id);

        let ops = device.ops();
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], GpuOp::CreateTexture { .. }));
        assert!(matches!(ops[2], GpuOp::DeleteTexture(t) if t == id));
    }

    #[test]
    fn short_upload_is_rejected() {
        let device = HeadlessDevice::new();
        let desc = TextureDesc::d2(2, 2);
        let id = device.create_texture(&desc).unwrap();
        assert!(device.upload_texture(id, &desc, 0, &[0u8; 3]).is_err());
    }

    #[test]
    fn link_failure_is_one_shot() {
        let device = HeadlessDevice::new();
        device.fail_next_link();
        let desc = ProgramDesc {
            name: "p",
            vertex: "v",
            fragment: "f",
            geometry: None,
        };
        assert!(!device.create_program(&desc).unwrap().link_ok);
        assert!(device.create_program(&desc).unwrap().link_ok);
    }
}
