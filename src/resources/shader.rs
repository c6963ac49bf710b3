//! GLSL 着色器 (`Shaders/<name>.vsh` + `.fsh`，可选 `.gsh`)
//!
//! 一个着色器名字对应顶点和片元两个必备阶段，几何阶段按文件存在与否附带。
//! 各阶段文本在加载时做 `#package` 展开，上传阶段编译链接成一个程序对象。
//! 链接失败的程序保留对象并照常转入就绪，渲染方通过 [`Shader::link_ok`]
//! 决定是否跳过。

use crate::assets::{Asset, AssetIo, AssetKind, Handle, LoadContext};
use crate::errors::{CandelaError, Result};
use crate::gpu::{GpuContext, GpuDevice, GpuProgram, ProgramDesc, ProgramId};
use crate::resources::shader_pkg::expand_includes;

/// Pass-through vertex stage of the built-in fallback program.
pub const DEFAULT_VERTEX: &str = "\
#version 430

layout(location = 0) in vec3 vertex;

void main()
{
\tgl_Position = vec4(vertex, 1.0);
}
";

/// Solid-white fragment stage of the built-in fallback program.
pub const DEFAULT_FRAGMENT: &str = "\
#version 430

layout (location = 0) out vec4 fragColor;

void main()
{
\tfragColor = vec4(1.0f);
}
";

/// Stage sources and, after finalization, the linked program.
pub struct Shader {
    name: String,
    vertex: String,
    fragment: String,
    geometry: Option<String>,
    gpu: Option<GpuProgram>,
    link_ok: bool,
}

impl Shader {
    fn read_stage(ctx: &LoadContext<'_>, name: &str, ext: &str) -> Result<String> {
        let source = ctx.io().read_text(Self::KIND, &format!("{name}{ext}"))?;
        let mut stack = Vec::new();
        Ok(expand_includes(ctx.io(), &source, &mut stack))
    }

    /// Diagnostic label; the built-in fallback has no file name.
    fn label(&self) -> &str {
        if self.name.is_empty() {
            "default"
        } else {
            &self.name
        }
    }

    #[must_use]
    pub fn vertex(&self) -> &str {
        &self.vertex
    }

    #[must_use]
    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&str> {
        self.geometry.as_deref()
    }

    /// False after a failed link; the program object still exists.
    #[must_use]
    pub fn link_ok(&self) -> bool {
        self.link_ok
    }

    #[must_use]
    pub fn gpu_id(&self) -> Option<ProgramId> {
        self.gpu.as_ref().map(GpuProgram::id)
    }

    /// Makes the program current. Silent before finalization.
    pub fn bind(&self, device: &dyn GpuDevice) {
        if let Some(gpu) = &self.gpu {
            device.bind_program(gpu.id());
        }
    }
}

impl Asset for Shader {
    type Params = ();
    const KIND: AssetKind = AssetKind::Shader;

    fn new(_: &()) -> Self {
        Self {
            name: String::new(),
            vertex: String::new(),
            fragment: String::new(),
            geometry: None,
            gpu: None,
            link_ok: false,
        }
    }

    /// Both required stages must be on disk.
    fn source_exists(io: &AssetIo, name: &str, _params: &()) -> bool {
        io.exists(Self::KIND, &format!("{name}.vsh"))
            && io.exists(Self::KIND, &format!("{name}.fsh"))
    }

    fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
        self.name.clear();
        self.vertex = DEFAULT_VERTEX.to_owned();
        self.fragment = DEFAULT_FRAGMENT.to_owned();
        self.geometry = None;
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let name = ctx.name().to_owned();
        self.vertex = Self::read_stage(ctx, &name, ".vsh")?;
        self.fragment = Self::read_stage(ctx, &name, ".fsh")?;
        self.geometry = if ctx.io().exists(Self::KIND, &format!("{name}.gsh")) {
            Some(Self::read_stage(ctx, &name, ".gsh")?)
        } else {
            None
        };
        self.name = name;
        Ok(())
    }

    fn finalize(&mut self, gpu: &mut GpuContext<'_>) -> Result<()> {
        let desc = ProgramDesc {
            name: self.label(),
            vertex: &self.vertex,
            fragment: &self.fragment,
            geometry: self.geometry.as_deref(),
        };
        let linked = gpu.device.create_program(&desc)?;
        for (stage, log) in linked.stage_logs {
            log::error!("{}", CandelaError::ShaderIncomplete { stage, log });
        }
        self.link_ok = linked.link_ok;
        self.gpu = Some(gpu.own_program(linked.id));
        if linked.link_ok {
            Ok(())
        } else {
            Err(CandelaError::ProgramIncomplete {
                name: self.label().to_owned(),
                log: linked.link_log,
            })
        }
    }
}

impl Handle<Shader> {
    /// See [`Shader::bind`].
    pub fn bind(&self, device: &dyn GpuDevice) {
        self.read().bind(device);
    }

    #[must_use]
    pub fn link_ok(&self) -> bool {
        self.read().link_ok()
    }

    #[must_use]
    pub fn gpu_id(&self) -> Option<ProgramId> {
        self.read().gpu_id()
    }
}

// ============================================================================
// Tests
// ============================================================================
