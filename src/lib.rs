#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod resources;
pub mod assets;
pub mod gpu;
pub mod engine;
pub mod errors;
pub mod utils;

pub use resources::{
    Config, Cubemap, Image, Material, Mesh, Model, Primitive, Shader, ShaderPkg, Sound, Texture,
};
pub use resources::{ConfigParams, FillPolicy, ImageParams, MaterialParams, TextureParams};
pub use assets::{Asset, AssetIo, AssetKind, AssetServer, AssetServerSettings, Handle, LoadState};
pub use gpu::{GlDevice, GpuDevice, HeadlessDevice};
pub use engine::Engine;
pub use errors::CandelaError;
pub use utils::text;
