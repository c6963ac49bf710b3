//! The backend-agnostic device trait and its descriptor types.
//!
//! The trait surface is exactly what asset finalization needs: texture
//! storage + upload, immutable vertex buffers, program compile/link, binds
//! and deletes. Ids are plain integer newtypes handed out by the backend;
//! they deliberately carry no lifetime so payload structs stay `Send` while
//! actual GL work remains confined to the thread driving the notifier.

use smallvec::SmallVec;

use crate::errors::Result;

/// Opaque texture object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Opaque buffer object id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Opaque shader program id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Texture dimensionality as exposed to asset payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureKind {
    /// One-dimensional (stored as height-1 2D on GL backends).
    D1,
    /// Plain two-dimensional.
    #[default]
    D2,
    /// Two-dimensional array; `layers` counts the slices.
    D2Array,
    /// Six-face cube; `layer` in uploads selects the face (+X .. -Z order).
    Cube,
}

/// Backend-independent texture description used for creation and uploads.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    /// Array slice count (1 unless `D2Array`; 6 faces are implied for cubes).
    pub layers: u32,
    pub mip_levels: u32,
    /// Linear min/mag filtering (nearest otherwise). Mip filters follow suit.
    pub linear: bool,
    /// Clamp-to-edge wrapping (repeat otherwise).
    pub clamp: bool,
    /// Max anisotropy, when anisotropic filtering is wanted.
    pub anisotropy: Option<f32>,
}

impl TextureDesc {
    /// A plain 2D RGBA8 texture with a single mip level.
    #[must_use]
    pub fn d2(width: u32, height: u32) -> Self {
        Self {
            kind: TextureKind::D2,
            width,
            height,
            layers: 1,
            mip_levels: 1,
            linear: true,
            clamp: false,
            anisotropy: None,
        }
    }

    /// Byte length of one RGBA8 layer at mip 0.
    #[must_use]
    pub fn layer_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Shader stage sources handed to [`GpuDevice::create_program`].
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    /// Name used in diagnostics only.
    pub name: &'a str,
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub geometry: Option<&'a str>,
}

/// Info logs of stages that failed to compile, labeled by stage. Inline
/// capacity covers the three possible stages.
pub type StageLogs = SmallVec<[(&'static str, String); 3]>;

/// Outcome of a program build. Compile/link failures do not destroy the
/// program object; callers keep the id and degrade.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    pub id: ProgramId,
    pub link_ok: bool,
    /// Link info log when `link_ok` is false.
    pub link_log: String,
    pub stage_logs: StageLogs,
}

/// Mip chain length for a full pyramid over the smaller edge:
/// `floor(log2(min(w, h))) + 1`.
#[must_use]
pub fn mip_count(width: u32, height: u32) -> u32 {
    width.min(height).max(1).ilog2() + 1
}

/// The device owning GPU object lifetimes.
///
/// Implementations are not required to be `Send` or `Sync`; a real GL
/// backend is intrinsically bound to its context thread, and the notifier
/// pass is the only caller.
pub trait GpuDevice {
    /// Allocates texture storage per `desc`.
    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureId>;

    /// Uploads one RGBA8 layer (or cube face) at mip 0.
    fn upload_texture(
        &self,
        id: TextureId,
        desc: &TextureDesc,
        layer: u32,
        pixels: &[u8],
    ) -> Result<()>;

    /// Fills the mip chain below level 0.
    fn generate_mipmaps(&self, id: TextureId);

    /// Binds a texture to the given texture unit.
    fn bind_texture(&self, unit: u32, id: TextureId);

    fn delete_texture(&self, id: TextureId);

    /// Creates an immutable vertex buffer from raw bytes.
    fn create_vertex_buffer(&self, bytes: &[u8]) -> Result<BufferId>;

    fn delete_buffer(&self, id: BufferId);

    /// Compiles and links a program. Stage or link failures are reported in
    /// the returned [`LinkedProgram`], not as `Err`; `Err` means the backend
    /// could not even allocate the objects.
    fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<LinkedProgram>;

    /// Makes the program current.
    fn bind_program(&self, id: ProgramId);

    fn delete_program(&self, id: ProgramId);
}

// ============================================================================
// Tests
// ============================================================================
