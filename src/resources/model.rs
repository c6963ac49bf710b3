//! 模型 (`Models/*.obj` + 同名材质)
//!
//! 模型把同名网格和材质捆在一起：网格同步加载后展开成交错顶点流（每段
//! `usemtl` 范围写入自己的材质层基址），材质以模型名异步加载，`.mat`
//! 文件决定皮肤。上传阶段只建一个顶点缓冲。

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::assets::{Asset, AssetKind, Handle, LoadContext};
use crate::errors::Result;
use crate::gpu::{BufferId, GpuBuffer, GpuContext};
use crate::resources::material::{CHANNELS_PER_SKIN, LAYERS_PER_SKIN, Material, MaterialParams};
use crate::resources::mesh::Mesh;

/// Interleaved vertex as the shaders consume it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub uv: [f32; 2],
    /// Base array layer of this corner's material range.
    pub material_id: f32,
    pub bone_ids: [i32; 4],
    pub bone_weights: [f32; 4],
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    /// Componentwise bounds of `points`; [`Self::ZERO`] when empty.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::ZERO;
        };
        points.fold(
            Self {
                min: first,
                max: first,
            },
            |bounds, point| Self {
                min: bounds.min.min(point),
                max: bounds.max.max(point),
            },
        )
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.max - self.min) / 2.0 + self.min
    }

    #[must_use]
    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) / 2.0
    }

    /// Radius of the bounding sphere around [`Self::center`].
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.min.distance(self.max) / 2.0
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Mesh geometry flattened for rendering, plus the material it draws with.
#[derive(Default)]
pub struct Model {
    vertices: Vec<ModelVertex>,
    aabb: Aabb,
    radius: f32,
    material: Option<Handle<Material>>,
    gpu: Option<GpuBuffer>,
}

/// One interleaved vertex per corner. Corners inside the mesh's n-th
/// material range carry that range's base array layer.
fn flatten(mesh: &Mesh) -> Vec<ModelVertex> {
    let mut vertices = Vec::with_capacity(mesh.vertex_count());
    for (index, range) in mesh.ranges().iter().enumerate() {
        let layer_base = (index * LAYERS_PER_SKIN) as f32;
        for corner in range.start..range.start + range.count {
            vertices.push(ModelVertex {
                position: mesh.positions()[corner].to_array(),
                normal: mesh.normals()[corner].to_array(),
                tangent: mesh.tangents()[corner].to_array(),
                bitangent: mesh.bitangents()[corner].to_array(),
                uv: mesh.uvs()[corner].to_array(),
                material_id: layer_base,
                bone_ids: [0; 4],
                bone_weights: [0.0; 4],
            });
        }
    }
    vertices
}

impl Model {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn vertices(&self) -> &[ModelVertex] {
        &self.vertices
    }

    #[must_use]
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[must_use]
    pub fn material(&self) -> Option<&Handle<Material>> {
        self.material.as_ref()
    }

    /// Base array layer for `skin`, clamped to the skins the material
    /// actually packed. Zero before the material is initialized.
    #[must_use]
    pub fn skin_id(&self, skin: usize) -> u32 {
        self.material
            .as_ref()
            .map_or(0, |material| material.read().layer_base(skin))
    }

    #[must_use]
    pub fn gpu_id(&self) -> Option<BufferId> {
        self.gpu.as_ref().map(GpuBuffer::id)
    }
}

impl Asset for Model {
    type Params = ();
    const KIND: AssetKind = AssetKind::Model;

    fn new(_: &()) -> Self {
        Self::default()
    }

    fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
        *self = Self::default();
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        // 网格同步，材质异步
        let mesh = ctx.load::<Mesh>(ctx.name(), (), false);
        let mesh = mesh.read();
        self.vertices = flatten(&mesh);
        self.aabb = Aabb::from_points(mesh.positions().iter().copied());
        self.radius = self.aabb.radius();

        // One empty skin per range; the .mat file fills the names in.
        let channels = vec![String::new(); mesh.ranges().len() * CHANNELS_PER_SKIN];
        self.material = Some(ctx.load::<Material>(ctx.name(), MaterialParams { channels }, true));
        Ok(())
    }

    fn finalize(&mut self, gpu: &mut GpuContext<'_>) -> Result<()> {
        let id = gpu.device.create_vertex_buffer(bytemuck::cast_slice(&self.vertices))?;
        self.gpu = Some(gpu.own_buffer(id));
        Ok(())
    }
}

impl Handle<Model> {
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        self.read().aabb()
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        self.read().radius()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.read().vertex_count()
    }

    /// See [`Model::skin_id`].
    #[must_use]
    pub fn skin_id(&self, skin: usize) -> u32 {
        self.read().skin_id(skin)
    }

    #[must_use]
    pub fn gpu_id(&self) -> Option<BufferId> {
        self.read().gpu_id()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::mesh::ObjData;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<ModelVertex>(), 92);
    }

    #[test]
    fn bounds_cover_all_points_and_the_sphere_spans_the_diagonal() {
        let aabb = Aabb::from_points([
            Vec3::new(-1.0, 0.0, 2.0),
            Vec3::new(3.0, -2.0, 0.0),
            Vec3::new(0.0, 1.0, 1.0),
        ]);
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(3.0, 1.0, 2.0));
        assert_eq!(aabb.center(), Vec3::new(1.0, -0.5, 1.0));
        assert!((aabb.radius() - aabb.min.distance(aabb.max) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn empty_point_sets_collapse_to_zero() {
        assert_eq!(Aabb::from_points([]), Aabb::ZERO);
    }

    #[test]
    fn ranges_stamp_their_layer_base_into_the_stream() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
usemtl a
f 1 2 3
usemtl b
f 1 2 3
";
        let mesh = Mesh::from_obj(&ObjData::parse(text));
        let vertices = flatten(&mesh);
        assert_eq!(vertices.len(), 6);
        assert!(vertices[..3].iter().all(|v| v.material_id == 0.0));
        assert!(vertices[3..].iter().all(|v| v.material_id == 3.0));
        assert!(vertices.iter().all(|v| v.bone_weights == [0.0; 4]));
    }
}
