//! PBR 材质 (`Materials/*.mat`)
//!
//! 一个材质是 6·N 个纹理通道（每个皮肤 albedo/normal/metalness/roughness/
//! height/occlusion 各一），打包成每皮肤 3 层的 2D 数组纹理：albedo 层、
//! normal 层、以及由四个灰度通道的 R 分量拼成的 (metal, rough, height, AO)
//! 层。通道既可以由调用方直接给出，也可以在 `.mat` 文件的 `PBR` 块里声明。

use crate::assets::{Asset, AssetIo, AssetKind, Handle, LoadContext};
use crate::errors::Result;
use crate::gpu::{
    GpuContext, GpuDevice, GpuTexture, TextureDesc, TextureId, TextureKind, mip_count,
};
use crate::resources::image::{FillPolicy, Image, ImageParams};
use crate::utils::text::quoted_span;

/// Texture channels per skin.
pub const CHANNELS_PER_SKIN: usize = 6;
/// Packed array layers per skin.
pub const LAYERS_PER_SKIN: usize = 3;

const CHANNEL_KEYS: [&str; CHANNELS_PER_SKIN] = [
    "albedo",
    "normal",
    "metalness",
    "roughness",
    "height",
    "occlusion",
];

#[derive(Debug, Clone, Default)]
pub struct MaterialParams {
    /// 6·N channel names in skin order; empty slots fill with placeholders.
    /// An empty list defers entirely to the `.mat` file.
    pub channels: Vec<String>,
}

/// Channel images packed into one 2D-array texture.
pub struct Material {
    channels: Vec<String>,
    skins: usize,
    width: u32,
    height: u32,
    /// `LAYERS_PER_SKIN * skins` planes of RGBA8, back to back.
    packed: Vec<u8>,
    gpu: Option<GpuTexture>,
}

// ============================================================================
// .mat 解析
// ============================================================================

/// One `PBR` block: six slots, missing entries left empty.
fn parse_pbr_block<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut block = vec![String::new(); CHANNELS_PER_SKIN];
    let mut depth = 0_i32;
    for line in lines {
        if line.contains('{') {
            depth += 1;
            continue;
        }
        if line.contains('}') {
            depth -= 1;
            if depth <= 0 {
                break;
            }
            continue;
        }
        for (slot, key) in CHANNEL_KEYS.iter().enumerate() {
            if line.contains(key) {
                if let Some((name, _)) = quoted_span(line) {
                    block[slot] = name.to_owned();
                }
                break;
            }
        }
    }
    block
}

/// Every `PBR` block in the file, flattened to 6·K channel names.
fn parse_mat(text: &str) -> Vec<String> {
    let mut channels = Vec::new();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        if line.contains('{') || line.contains('}') {
            continue;
        }
        if line.contains("PBR") {
            channels.extend(parse_pbr_block(&mut lines));
        }
    }
    channels
}

// ============================================================================
// 打包
// ============================================================================

impl Material {
    #[must_use]
    pub fn skin_count(&self) -> usize {
        self.skins
    }

    #[must_use]
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Base array layer of `skin`, clamped into range.
    #[must_use]
    pub fn layer_base(&self, skin: usize) -> u32 {
        let clamped = skin.min(self.skins.saturating_sub(1));
        (clamped * LAYERS_PER_SKIN) as u32
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

    fn slot_fill(slot: usize) -> FillPolicy {
        if slot % CHANNELS_PER_SKIN == 0 {
            FillPolicy::checkered()
        } else {
            FillPolicy::solid()
        }
    }

    /// Loads every channel, sizes them uniformly, and packs the planes.
    fn build(&mut self, mut channels: Vec<String>, ctx: &mut LoadContext<'_>) {
        // Round up to whole skins; enforce at least one.
        let remainder = channels.len() % CHANNELS_PER_SKIN;
        let target = if remainder != 0 {
            channels.len() + CHANNELS_PER_SKIN - remainder
        } else {
            channels.len().max(CHANNELS_PER_SKIN)
        };
        channels.resize(target, String::new());
        let skins = channels.len() / CHANNELS_PER_SKIN;

        // Named channels go through the registry so repeated names share
        // one decode; unnamed slots fill directly.
        let images: Vec<Image> = channels
            .iter()
            .enumerate()
            .map(|(slot, name)| {
                let params = ImageParams {
                    size: None,
                    smooth_resize: true,
                    fill: Self::slot_fill(slot),
                };
                if name.is_empty() {
                    Image::new(&params)
                } else {
                    ctx.load::<Image>(name, params, false).read().clone()
                }
            })
            .collect();

        // Uniform size: the largest input wins, each axis independently.
        let width = images.iter().map(Image::width).max().unwrap_or(1);
        let height = images.iter().map(Image::height).max().unwrap_or(1);
        let plane = (width * height * 4) as usize;

        let mut packed = vec![0_u8; plane * LAYERS_PER_SKIN * skins];
        for skin in 0..skins {
            let sized: Vec<Image> = images[skin * CHANNELS_PER_SKIN..(skin + 1) * CHANNELS_PER_SKIN]
                .iter()
                .map(|image| image.resized(width, height, true))
                .collect();
            let base = skin * LAYERS_PER_SKIN * plane;
            packed[base..base + plane].copy_from_slice(sized[0].pixels());
            packed[base + plane..base + 2 * plane].copy_from_slice(sized[1].pixels());
            // 第三层: R 分量打包 (metal, rough, height, AO)
            let mix = &mut packed[base + 2 * plane..base + 3 * plane];
            for px in 0..(width * height) as usize {
                mix[px * 4] = sized[2].pixels()[px * 4];
                mix[px * 4 + 1] = sized[3].pixels()[px * 4];
                mix[px * 4 + 2] = sized[4].pixels()[px * 4];
                mix[px * 4 + 3] = sized[5].pixels()[px * 4];
            }
        }

        self.channels = channels;
        self.skins = skins;
        self.width = width;
        self.height = height;
        self.packed = packed;
    }
}

impl Asset for Material {
    type Params = MaterialParams;
    const KIND: AssetKind = AssetKind::Material;

    fn new(params: &MaterialParams) -> Self {
        Self {
            channels: params.channels.clone(),
            skins: 0,
            width: 0,
            height: 0,
            packed: Vec::new(),
            gpu: None,
        }
    }

    /// The `.mat` file is optional; caller channels alone make a material,
    /// so a missing file never reroutes to the default record.
    fn source_exists(_io: &AssetIo, _name: &str, _params: &MaterialParams) -> bool {
        true
    }

    fn load_default(&mut self, ctx: &mut LoadContext<'_>) {
        let channels = std::mem::take(&mut self.channels);
        self.build(channels, ctx);
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let mut channels = std::mem::take(&mut self.channels);
        // A .mat file replaces the caller's list; empty file slots fall back
        // to whatever the caller put at that index.
        if ctx.io().exists(Self::KIND, ctx.name()) {
            let text = ctx.io().read_text(Self::KIND, ctx.name())?;
            let mut parsed = parse_mat(&text);
            if !parsed.is_empty() {
                for (slot, name) in parsed.iter_mut().enumerate() {
                    if name.is_empty() {
                        if let Some(existing) = channels.get(slot) {
                            name.clone_from(existing);
                        }
                    }
                }
                channels = parsed;
            }
        }
        self.build(channels, ctx);
        Ok(())
    }

    fn finalize(&mut self, gpu: &mut GpuContext<'_>) -> Result<()> {
        if self.skins == 0 {
            return Ok(());
        }
        let layers = (self.skins * LAYERS_PER_SKIN) as u32;
        let desc = TextureDesc {
            kind: TextureKind::D2Array,
            width: self.width,
            height: self.height,
            layers,
            mip_levels: mip_count(self.width, self.height),
            linear: true,
            clamp: false,
            anisotropy: Some(16.0),
        };
        let id = gpu.device.create_texture(&desc)?;
        let plane = desc.layer_len();
        for layer in 0..layers {
            let start = layer as usize * plane;
            gpu.device
                .upload_texture(id, &desc, layer, &self.packed[start..start + plane])?;
        }
        if desc.mip_levels > 1 {
            gpu.device.generate_mipmaps(id);
        }
        self.gpu = Some(gpu.own_texture(id));
        Ok(())
    }
}

impl Handle<Material> {
    #[must_use]
    pub fn skin_count(&self) -> usize {
        self.read().skin_count()
    }

    /// See [`Material::layer_base`].
    #[must_use]
    pub fn layer_base(&self, skin: usize) -> u32 {
        self.read().layer_base(skin)
    }

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
