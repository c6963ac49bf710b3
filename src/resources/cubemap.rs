//! 立方体贴图 (`Textures/Cubemaps/`)
//!
//! 六个面各自来自一张图：后缀 right/left/bottom/top/front/back，依次尝试
//! `.png/.jpg/.tga`，先平铺命名（`<name>right.png`）再目录命名
//! (`<name>/right.png`)。第一张找到的面决定边长，其余面统一缩放；缺失的
//! 面用棋盘格占位填充。

use crate::assets::{Asset, AssetIo, AssetKind, Handle, LoadContext};
use crate::errors::Result;
use crate::gpu::{GpuContext, GpuDevice, GpuTexture, TextureDesc, TextureId, TextureKind};
use crate::resources::image::{FillPolicy, Image, ImageParams};

const SIDES: [&str; 6] = ["right", "left", "bottom", "top", "front", "back"];
const EXTENSIONS: [&str; 3] = [".png", ".jpg", ".tga"];

/// Six square faces and, after finalize, one GL cube texture.
pub struct Cubemap {
    faces: Vec<Image>,
    edge: u32,
    gpu: Option<GpuTexture>,
}

impl Cubemap {
    /// Face edge length in pixels.
    #[must_use]
    pub fn edge(&self) -> u32 {
        self.edge
    }

    #[must_use]
    pub fn gpu_id(&self) -> Option<TextureId> {
        self.gpu.as_ref().map(GpuTexture::id)
    }

    pub fn bind(&self, device: &dyn GpuDevice, unit: u32) {
        if let Some(gpu) = &self.gpu {
            device.bind_texture(unit, gpu.id());
        }
    }

    /// First existing face file for `side`, flat naming before directory
    /// naming, extensions in preference order.
    fn face_source(io: &AssetIo, name: &str, side: &str) -> Option<String> {
        EXTENSIONS.iter().find_map(|ext| {
            let flat = format!("{name}{side}{ext}");
            if io.exists(AssetKind::Cubemap, &flat) {
                return Some(flat);
            }
            let nested = format!("{name}/{side}{ext}");
            io.exists(AssetKind::Cubemap, &nested).then_some(nested)
        })
    }

    fn load_face(io: &AssetIo, name: &str, side: &str, edge: u32) -> Image {
        let params = ImageParams {
            size: (edge > 0).then_some((edge, edge)),
            smooth_resize: true,
            fill: FillPolicy::checkered(),
        };
        let Some(source) = Self::face_source(io, name, side) else {
            log::warn!("cubemap '{name}' missing face '{side}', filling");
            return Image::new(&params);
        };
        match io
            .read_bytes(AssetKind::Cubemap, &source)
            .and_then(|bytes| Image::decode(&bytes, &params))
        {
            Ok(image) => image,
            Err(err) => {
                log::warn!("cubemap '{name}' face '{side}': {err}");
                Image::new(&params)
            }
        }
    }
}

impl Asset for Cubemap {
    type Params = ();
    const KIND: AssetKind = AssetKind::Cubemap;

    fn new(_: &()) -> Self {
        Self {
            faces: Vec::new(),
            edge: 0,
            gpu: None,
        }
    }

    /// Face files are probed per side; there is no single source to check.
    fn source_exists(_io: &AssetIo, _name: &str, _params: &()) -> bool {
        true
    }

    fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
        self.edge = 1;
        self.faces = (0..SIDES.len())
            .map(|_| Image::solid(1, 1, [255, 255, 255, 255]))
            .collect();
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut edge = 0;
        let mut faces = Vec::with_capacity(SIDES.len());
        for side in SIDES {
            let mut face = Self::load_face(ctx.io(), ctx.name(), side, edge);
            if edge == 0 {
                // The first face fixes the edge for the whole map.
                edge = face.width();
                if face.height() != edge {
                    face = face.resized(edge, edge, true);
                }
            }
            faces.push(face);
        }
        self.faces = faces;
        self.edge = edge;
        Ok(())
    }

    fn finalize(&mut self, gpu: &mut GpuContext<'_>) -> Result<()> {
        if self.faces.len() != SIDES.len() {
            return Ok(());
        }
        let desc = TextureDesc {
            kind: TextureKind::Cube,
            width: self.edge,
            height: self.edge,
            layers: SIDES.len() as u32,
            mip_levels: 1,
            linear: false,
            clamp: true,
            anisotropy: None,
        };
        let id = gpu.device.create_texture(&desc)?;
        for (face, image) in self.faces.iter().enumerate() {
            gpu.device
                .upload_texture(id, &desc, face as u32, image.pixels())?;
        }
        self.gpu = Some(gpu.own_texture(id));
        Ok(())
    }
}

impl Handle<Cubemap> {
    pub fn bind(&self, device: &dyn GpuDevice, unit: u32) {
        self.read().bind(device, unit);
    }

    #[must_use]
    pub fn gpu_id(&self) -> Option<TextureId> {
        self.read().gpu_id()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuOp, HeadlessDevice, ReleaseQueue};

    #[test]
    fn finalize_uploads_six_clamped_faces() {
        let mut cubemap = Cubemap::new(&());
        cubemap.edge = 2;
        cubemap.faces = (0..6).map(|_| Image::solid(2, 2, [7, 7, 7, 255])).collect();

        let device = HeadlessDevice::new();
        let releases = ReleaseQueue::new();
        let mut gpu = GpuContext::new(&device, releases.sender());
        cubemap.finalize(&mut gpu).unwrap();

        assert!(matches!(
            device.ops()[0],
            GpuOp::CreateTexture {
                kind: TextureKind::Cube,
                width: 2,
                height: 2,
                layers: 6,
                ..
            }
        ));
        assert_eq!(
            device.count(|op| matches!(op, GpuOp::UploadTexture { .. })),
            6
        );
    }

    #[test]
    fn face_probe_prefers_flat_names_and_png() {
        let dir = tempfile::tempdir().unwrap();
        let cubemaps = dir.path().join("Textures/Cubemaps");
        std::fs::create_dir_all(cubemaps.join("sky")).unwrap();
        std::fs::write(cubemaps.join("skyright.png"), b"flat png").unwrap();
        std::fs::write(cubemaps.join("skyright.jpg"), b"flat jpg").unwrap();
        std::fs::write(cubemaps.join("sky/left.jpg"), b"nested jpg").unwrap();

        let io = AssetIo::new(dir.path());
        assert_eq!(
            Cubemap::face_source(&io, "sky", "right").as_deref(),
            Some("skyright.png")
        );
        assert_eq!(
            Cubemap::face_source(&io, "sky", "left").as_deref(),
            Some("sky/left.jpg")
        );
        assert_eq!(Cubemap::face_source(&io, "sky", "back"), None);
    }

    #[test]
    fn missing_faces_fill_checkered_at_the_placeholder_edge() {
        let dir = tempfile::tempdir().unwrap();
        let io = AssetIo::new(dir.path());
        let face = Cubemap::load_face(&io, "void", "front", 0);
        assert_eq!(face.width(), 256);
        let sized = Cubemap::load_face(&io, "void", "front", 8);
        assert_eq!((sized.width(), sized.height()), (8, 8));
    }
}
