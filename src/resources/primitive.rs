//! 简单图元 (`Primitives/*.obj`)
//!
//! 只保留位置和 UV 的小网格，给后处理和调试绘制用。默认载荷是覆盖整个
//! NDC 的全屏四边形。

use bytemuck::{Pod, Zeroable};

use crate::assets::{Asset, AssetKind, Handle, LoadContext};
use crate::errors::Result;
use crate::gpu::{BufferId, GpuBuffer, GpuContext};
use crate::resources::mesh::ObjData;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PrimitiveVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Position/UV triangle list.
#[derive(Default)]
pub struct Primitive {
    vertices: Vec<PrimitiveVertex>,
    gpu: Option<GpuBuffer>,
}

impl Primitive {
    /// Two counter-clockwise triangles spanning NDC at z = 0.
    #[must_use]
    pub fn fullscreen_quad() -> Self {
        let corner = |x: f32, y: f32| PrimitiveVertex {
            position: [x, y, 0.0],
            uv: [f32::midpoint(x, 1.0), f32::midpoint(y, 1.0)],
        };
        Self {
            vertices: vec![
                corner(-1.0, -1.0),
                corner(1.0, -1.0),
                corner(1.0, 1.0),
                corner(-1.0, -1.0),
                corner(1.0, 1.0),
                corner(-1.0, 1.0),
            ],
            gpu: None,
        }
    }

    #[must_use]
    pub fn from_obj(data: &ObjData) -> Self {
        let mut vertices = Vec::with_capacity(data.triangles.len() * 3);
        for triangle in &data.triangles {
            for corner in triangle {
                vertices.push(PrimitiveVertex {
                    position: data.positions[corner.position].to_array(),
                    uv: corner
                        .uv
                        .map_or([0.0, 0.0], |i| data.uvs[i].to_array()),
                });
            }
        }
        Self {
            vertices,
            gpu: None,
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn vertices(&self) -> &[PrimitiveVertex] {
        &self.vertices
    }

    #[must_use]
    pub fn gpu_id(&self) -> Option<BufferId> {
        self.gpu.as_ref().map(GpuBuffer::id)
    }
}

impl Asset for Primitive {
    type Params = ();
    const KIND: AssetKind = AssetKind::Primitive;

    fn new(_: &()) -> Self {
        Self::default()
    }

    fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
        *self = Self::fullscreen_quad();
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let text = ctx.io().read_text(Self::KIND, ctx.name())?;
        *self = Self::from_obj(&ObjData::parse(&text));
        Ok(())
    }

    fn finalize(&mut self, gpu: &mut GpuContext<'_>) -> Result<()> {
        let id = gpu.device.create_vertex_buffer(bytemuck::cast_slice(&self.vertices))?;
        self.gpu = Some(gpu.own_buffer(id));
        Ok(())
    }
}

impl Handle<Primitive> {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.read().vertex_count()
    }

    #[must_use]
    pub fn gpu_id(&self) -> Option<BufferId> {
        self.read().gpu_id()
    }
}
