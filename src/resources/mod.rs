//! 资源类型定义模块
//!
//! 每种可加载资源对应一个 [`Asset`](crate::assets::Asset) 实现：
//! - Config: 键值配置表
//! - Image: 像素数据（解码 / 填充，无 GPU 阶段）
//! - Texture: 单图纹理
//! - Cubemap: 六面立方体贴图
//! - Material: PBR 材质数组纹理
//! - Mesh: OBJ 几何数据（无 GPU 阶段）
//! - Model: 交错顶点缓冲 + 包围盒
//! - Primitive: 仅位置/UV 的简单几何
//! - Shader / `ShaderPkg`: GLSL 程序与可复用代码片段
//! - Sound: PCM 音频数据（无 GPU 阶段）

pub mod config;
pub mod cubemap;
pub mod image;
pub mod material;
pub mod mesh;
pub mod model;
pub mod primitive;
pub mod shader;
pub mod shader_pkg;
pub mod sound;
pub mod texture;

// 重新导出常用类型
pub use config::{Config, ConfigParams};
pub use cubemap::Cubemap;
pub use image::{FillPolicy, Image, ImageParams};
pub use material::{Material, MaterialParams};
pub use mesh::{Mesh, MeshRange, ObjData};
pub use model::{Aabb, Model, ModelVertex};
pub use primitive::{Primitive, PrimitiveVertex};
pub use shader::Shader;
pub use shader_pkg::ShaderPkg;
pub use sound::Sound;
pub use texture::{Texture, TextureParams};
