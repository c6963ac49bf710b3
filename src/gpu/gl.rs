//! OpenGL backend over `glow`.
//!
//! One [`GlDevice`] wraps the `glow::Context` for the thread that owns the
//! GL context. Interior id tables use `RefCell`, which keeps the type
//! `!Sync`; a device reference therefore cannot leak to worker threads,
//! matching the rule that all finalize work runs on the context thread.

use std::cell::{Cell, RefCell};

use glow::HasContext;
use rustc_hash::FxHashMap;

use crate::errors::{CandelaError, Result};

use super::device::{
    BufferId, GpuDevice, LinkedProgram, ProgramDesc, ProgramId, StageLogs, TextureDesc, TextureId,
    TextureKind,
};

// Core since GL 4.6, absent from the glow enum set we rely on.
const TEXTURE_MAX_ANISOTROPY: u32 = 0x84FE;

fn gl_target(kind: TextureKind) -> u32 {
    match kind {
        // No GLES-safe 1D target; height-1 2D behaves identically.
        TextureKind::D1 | TextureKind::D2 => glow::TEXTURE_2D,
        TextureKind::D2Array => glow::TEXTURE_2D_ARRAY,
        TextureKind::Cube => glow::TEXTURE_CUBE_MAP,
    }
}

/// OpenGL implementation of [`GpuDevice`].
pub struct GlDevice {
    gl: glow::Context,
    textures: RefCell<FxHashMap<u32, (glow::Texture, u32)>>,
    buffers: RefCell<FxHashMap<u32, glow::Buffer>>,
    programs: RefCell<FxHashMap<u32, glow::Program>>,
    next_id: Cell<u32>,
}

impl GlDevice {
    /// Takes ownership of a context created by the windowing layer.
    #[must_use]
    pub fn new(gl: glow::Context) -> Self {
        Self {
            gl,
            textures: RefCell::new(FxHashMap::default()),
            buffers: RefCell::new(FxHashMap::default()),
            programs: RefCell::new(FxHashMap::default()),
            next_id: Cell::new(1),
        }
    }

    /// Direct access for render code layered on top of the asset pipeline.
    #[must_use]
    pub fn raw(&self) -> &glow::Context {
        &self.gl
    }

    fn alloc_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn compile_stage(
        &self,
        program: glow::Program,
        stage: u32,
        label: &'static str,
        source: &str,
        logs: &mut StageLogs,
    ) -> Result<glow::Shader> {
        unsafe {
            let shader = self
                .gl
                .create_shader(stage)
                .map_err(CandelaError::GpuObjectCreate)?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if !self.gl.get_shader_compile_status(shader) {
                logs.push((label, self.gl.get_shader_info_log(shader)));
            }
            self.gl.attach_shader(program, shader);
            Ok(shader)
        }
    }
}

impl GpuDevice for GlDevice {
    fn create_texture(&self, desc: &TextureDesc) -> Result<TextureId> {
        let target = gl_target(desc.kind);
        unsafe {
            let tex = self
                .gl
                .create_texture()
                .map_err(CandelaError::GpuObjectCreate)?;
            self.gl.bind_texture(target, Some(tex));

            let (w, h) = (desc.width as i32, desc.height.max(1) as i32);
            match desc.kind {
                TextureKind::D1 | TextureKind::D2 => {
                    self.gl.tex_image_2d(
                        target,
                        0,
                        glow::RGBA8 as i32,
                        w,
                        h,
                        0,
                        glow::RGBA,
                        glow::UNSIGNED_BYTE,
                        glow::PixelUnpackData::Slice(None),
                    );
                }
                TextureKind::D2Array => {
                    self.gl.tex_image_3d(
                        target,
                        0,
                        glow::RGBA8 as i32,
                        w,
                        h,
                        desc.layers as i32,
                        0,
                        glow::RGBA,
                        glow::UNSIGNED_BYTE,
                        glow::PixelUnpackData::Slice(None),
                    );
                }
                TextureKind::Cube => {
                    for face in 0..6 {
                        self.gl.tex_image_2d(
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                            0,
                            glow::RGBA8 as i32,
                            w,
                            h,
                            0,
                            glow::RGBA,
                            glow::UNSIGNED_BYTE,
                            glow::PixelUnpackData::Slice(None),
                        );
                    }
                }
            }

            let wrap = if desc.clamp {
                glow::CLAMP_TO_EDGE
            } else {
                glow::REPEAT
            } as i32;
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap);
            if matches!(desc.kind, TextureKind::Cube) {
                self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, wrap);
            }

            let min_filter = match (desc.mip_levels > 1, desc.linear) {
                (true, true) => glow::LINEAR_MIPMAP_LINEAR,
                (true, false) => glow::NEAREST_MIPMAP_NEAREST,
                (false, true) => glow::LINEAR,
                (false, false) => glow::NEAREST,
            } as i32;
            let mag_filter = if desc.linear { glow::LINEAR } else { glow::NEAREST } as i32;
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, min_filter);
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, mag_filter);
            self.gl.tex_parameter_i32(
                target,
                glow::TEXTURE_MAX_LEVEL,
                desc.mip_levels.max(1) as i32 - 1,
            );
            if let Some(amount) = desc.anisotropy {
                self.gl
                    .tex_parameter_f32(target, TEXTURE_MAX_ANISOTROPY, amount);
            }

            let id = self.alloc_id();
            self.textures.borrow_mut().insert(id, (tex, target));
            Ok(TextureId(id))
        }
    }

    fn upload_texture(
        &self,
        id: TextureId,
        desc: &TextureDesc,
        layer: u32,
        pixels: &[u8],
    ) -> Result<()> {
        debug_assert!(pixels.len() >= desc.layer_len());
        let Some(&(tex, target)) = self.textures.borrow().get(&id.0) else {
            return Err(CandelaError::GpuObjectCreate(format!(
                "upload to unknown texture id {id:?}"
            )));
        };
        let (w, h) = (desc.width as i32, desc.height.max(1) as i32);
        unsafe {
            self.gl.bind_texture(target, Some(tex));
            match desc.kind {
                TextureKind::D1 | TextureKind::D2 => {
                    self.gl.tex_sub_image_2d(
                        target,
                        0,
                        0,
                        0,
                        w,
                        h,
                        glow::RGBA,
                        glow::UNSIGNED_BYTE,
                        glow::PixelUnpackData::Slice(Some(pixels)),
                    );
                }
                TextureKind::D2Array => {
                    self.gl.tex_sub_image_3d(
                        target,
                        0,
                        0,
                        0,
                        layer as i32,
                        w,
                        h,
                        1,
                        glow::RGBA,
                        glow::UNSIGNED_BYTE,
                        glow::PixelUnpackData::Slice(Some(pixels)),
                    );
                }
                TextureKind::Cube => {
                    self.gl.tex_sub_image_2d(
                        glow::TEXTURE_CUBE_MAP_POSITIVE_X + layer,
                        0,
                        0,
                        0,
                        w,
                        h,
                        glow::RGBA,
                        glow::UNSIGNED_BYTE,
                        glow::PixelUnpackData::Slice(Some(pixels)),
                    );
                }
            }
        }
        Ok(())
    }

    fn generate_mipmaps(&self, id: TextureId) {
        if let Some(&(tex, target)) = self.textures.borrow().get(&id.0) {
            unsafe {
                self.gl.bind_texture(target, Some(tex));
                self.gl.generate_mipmap(target);
            }
        }
    }

    fn bind_texture(&self, unit: u32, id: TextureId) {
        if let Some(&(tex, target)) = self.textures.borrow().get(&id.0) {
            unsafe {
                self.gl.active_texture(glow::TEXTURE0 + unit);
                self.gl.bind_texture(target, Some(tex));
            }
        }
    }

    fn delete_texture(&self, id: TextureId) {
        if let Some((tex, _)) = self.textures.borrow_mut().remove(&id.0) {
            unsafe { self.gl.delete_texture(tex) }
        }
    }

    fn create_vertex_buffer(&self, bytes: &[u8]) -> Result<BufferId> {
        unsafe {
            let buffer = self
                .gl
                .create_buffer()
                .map_err(CandelaError::GpuObjectCreate)?;
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, glow::STATIC_DRAW);
            let id = self.alloc_id();
            self.buffers.borrow_mut().insert(id, buffer);
            Ok(BufferId(id))
        }
    }

    fn delete_buffer(&self, id: BufferId) {
        if let Some(buffer) = self.buffers.borrow_mut().remove(&id.0) {
            unsafe { self.gl.delete_buffer(buffer) }
        }
    }

    fn create_program(&self, desc: &ProgramDesc<'_>) -> Result<LinkedProgram> {
        unsafe {
            let program = self
                .gl
                .create_program()
                .map_err(CandelaError::GpuObjectCreate)?;

            let mut stage_logs = StageLogs::new();
            let mut shaders = vec![
                self.compile_stage(
                    program,
                    glow::VERTEX_SHADER,
                    "vertex",
                    desc.vertex,
                    &mut stage_logs,
                )?,
                self.compile_stage(
                    program,
                    glow::FRAGMENT_SHADER,
                    "fragment",
                    desc.fragment,
                    &mut stage_logs,
                )?,
            ];
            if let Some(geometry) = desc.geometry {
                shaders.push(self.compile_stage(
                    program,
                    glow::GEOMETRY_SHADER,
                    "geometry",
                    geometry,
                    &mut stage_logs,
                )?);
            }

            self.gl.link_program(program);
            // Shader objects are no longer needed once the program links.
            for shader in shaders {
                self.gl.delete_shader(shader);
            }

            let link_ok = self.gl.get_program_link_status(program);
            let link_log = if link_ok {
                String::new()
            } else {
                self.gl.get_program_info_log(program)
            };

            let id = self.alloc_id();
            self.programs.borrow_mut().insert(id, program);
            Ok(LinkedProgram {
                id: ProgramId(id),
                link_ok,
                link_log,
                stage_logs,
            })
        }
    }

    fn bind_program(&self, id: ProgramId) {
        if let Some(&program) = self.programs.borrow().get(&id.0) {
            unsafe { self.gl.use_program(Some(program)) }
        }
    }

    fn delete_program(&self, id: ProgramId) {
        if let Some(program) = self.programs.borrow_mut().remove(&id.0) {
            unsafe { self.gl.delete_program(program) }
        }
    }
}
