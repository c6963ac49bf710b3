//! 单图纹理 (`Textures/`)
//!
//! 纹理包装一张 [`Image`]：initialize 阶段以非线程方式借道图片资源拿到
//! 像素，finalize 阶段在 GPU 线程上建纹理、传像素、生 mipmap。

use crate::assets::{Asset, AssetKind, Handle, LoadContext};
use crate::errors::Result;
use crate::gpu::{
    GpuContext, GpuDevice, GpuTexture, TextureDesc, TextureId, TextureKind, mip_count,
};
use crate::resources::image::{FillPolicy, Image, ImageParams};

const MAX_ANISOTROPY: f32 = 16.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TextureParams {
    /// 1D, 2D or 2D-array storage.
    pub kind: TextureKind,
    /// Array layer count; a source image is split into `layers` horizontal
    /// bands top to bottom. Only meaningful for [`TextureKind::D2Array`].
    pub layers: u32,
    pub mipmaps: bool,
    /// 16x anisotropic filtering.
    pub anisotropy: bool,
    /// Forwarded to the nested image load.
    pub image: ImageParams,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            kind: TextureKind::D2,
            layers: 1,
            mipmaps: true,
            anisotropy: true,
            image: ImageParams {
                size: None,
                smooth_resize: true,
                fill: FillPolicy::checkered(),
            },
        }
    }
}

/// One GL texture fed by one image asset.
pub struct Texture {
    params: TextureParams,
    image: Option<Handle<Image>>,
    gpu: Option<GpuTexture>,
}

impl Texture {
    #[must_use]
    pub fn gpu_id(&self) -> Option<TextureId> {
        self.gpu.as_ref().map(GpuTexture::id)
    }

    /// Binds to `unit`. A texture that has not finalized yet binds nothing.
    pub fn bind(&self, device: &dyn GpuDevice, unit: u32) {
        if let Some(gpu) = &self.gpu {
            device.bind_texture(unit, gpu.id());
        }
    }

    fn build_desc(&self, image: &Image) -> TextureDesc {
        let layers = match self.params.kind {
            TextureKind::D2Array => self.params.layers.max(1),
            _ => 1,
        };
        let width = image.width();
        let height = (image.height() / layers).max(1);
        // 1D textures stay linear-filtered and unmipped, like the 2D
        // non-mipmap path stays nearest.
        let one_dimensional = self.params.kind == TextureKind::D1;
        let mip_levels = if self.params.mipmaps && !one_dimensional {
            mip_count(width, height)
        } else {
            1
        };
        TextureDesc {
            kind: self.params.kind,
            width,
            height,
            layers,
            mip_levels,
            linear: self.params.mipmaps || one_dimensional,
            clamp: false,
            anisotropy: self.params.anisotropy.then_some(MAX_ANISOTROPY),
        }
    }
}

impl Asset for Texture {
    type Params = TextureParams;
    const KIND: AssetKind = AssetKind::Texture;

    fn new(params: &TextureParams) -> Self {
        Self {
            params: params.clone(),
            image: None,
            gpu: None,
        }
    }

    fn load_default(&mut self, ctx: &mut LoadContext<'_>) {
        // The shared default: the 1x1 opaque-white default image.
        self.image = Some(ctx.load::<Image>("", ImageParams::default(), false));
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        self.image = Some(ctx.load::<Image>(ctx.name(), self.params.image.clone(), false));
        Ok(())
    }

    fn finalize(&mut self, gpu: &mut GpuContext<'_>) -> Result<()> {
        let Some(image) = &self.image else {
            return Ok(());
        };
        let image = image.read();
        let desc = self.build_desc(&image);
        let id = gpu.device.create_texture(&desc)?;
        let layer_len = desc.layer_len();
        for layer in 0..desc.layers {
            let start = layer as usize * layer_len;
            gpu.device
                .upload_texture(id, &desc, layer, &image.pixels()[start..start + layer_len])?;
        }
        if desc.mip_levels > 1 {
            gpu.device.generate_mipmaps(id);
        }
        self.gpu = Some(gpu.own_texture(id));
        Ok(())
    }
}

impl Handle<Texture> {
    /// Binds the finalized texture to `unit`.
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
    use std::sync::Arc;

    use super::*;
    use crate::assets::handle::AssetRecord;
    use crate::gpu::{GpuOp, HeadlessDevice, ReleaseQueue};

    fn image_handle(image: Image) -> Handle<Image> {
        let (tx, _rx) = flume::unbounded();
        Handle::from_record(Arc::new(AssetRecord::new(
            "img",
            image,
            ImageParams::default(),
            tx,
        )))
    }

    fn finalize_with(texture: &mut Texture) -> (HeadlessDevice, ReleaseQueue) {
        let device = HeadlessDevice::new();
        let releases = ReleaseQueue::new();
        {
            let mut gpu = GpuContext::new(&device, releases.sender());
            texture.finalize(&mut gpu).unwrap();
        }
        (device, releases)
    }

    #[test]
    fn finalize_creates_uploads_and_mips() {
        let mut texture = Texture::new(&TextureParams::default());
        texture.image = Some(image_handle(Image::solid(8, 8, [255; 4])));
        let (device, _releases) = finalize_with(&mut texture);

        let ops = device.ops();
        assert!(matches!(
            ops[0],
            GpuOp::CreateTexture {
                width: 8,
                height: 8,
                mip_levels: 4,
                ..
            }
        ));
        assert!(matches!(&ops[1], GpuOp::UploadTexture { bytes, .. } if *bytes == 8 * 8 * 4));
        assert!(matches!(ops[2], GpuOp::GenerateMipmaps(_)));
        assert!(texture.gpu_id().is_some());
    }

    #[test]
    fn array_textures_split_the_image_into_bands() {
        let mut texture = Texture::new(&TextureParams {
            kind: TextureKind::D2Array,
            layers: 4,
            mipmaps: false,
            ..TextureParams::default()
        });
        texture.image = Some(image_handle(Image::solid(4, 16, [1, 2, 3, 4])));
        let (device, _releases) = finalize_with(&mut texture);

        let uploads = device.count(|op| matches!(op, GpuOp::UploadTexture { .. }));
        assert_eq!(uploads, 4);
        assert!(matches!(
            device.ops()[0],
            GpuOp::CreateTexture {
                height: 4,
                layers: 4,
                ..
            }
        ));
    }

    #[test]
    fn unfinalized_textures_bind_nothing() {
        let texture = Texture::new(&TextureParams::default());
        let device = HeadlessDevice::new();
        texture.bind(&device, 3);
        assert!(device.ops().is_empty());
    }

    #[test]
    fn dropping_the_texture_releases_the_gl_object() {
        let mut texture = Texture::new(&TextureParams::default());
        texture.image = Some(image_handle(Image::solid(2, 2, [0; 4])));
        let (device, releases) = finalize_with(&mut texture);
        drop(texture);
        assert_eq!(releases.drain(&device), 1);
        assert_eq!(device.count(|op| matches!(op, GpuOp::DeleteTexture(_))), 1);
    }
}
