//! 着色器包 (`Shaders/*.pkg`)
//!
//! 可被 GLSL 各阶段通过 `#package "name"` 引入的公共代码段。指令在加载时
//! 原地展开：指令区间（`#package` 到闭引号）换成包文本，同一行的其余部分
//! 保留。包里还可以再引包，循环引用会被切断并报错。

use crate::assets::{Asset, AssetIo, AssetKind, Handle, LoadContext};
use crate::errors::Result;
use crate::utils::text::quoted_span;

const DIRECTIVE: &str = "#package";

/// Expands every `#package "name"` in `source`. `stack` holds the package
/// names currently being expanded; re-including one of them is a cycle and
/// splices nothing, as does a package that fails to read.
pub(crate) fn expand_includes(io: &AssetIo, source: &str, stack: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(at) = rest.find(DIRECTIVE) {
        out.push_str(&rest[..at]);
        let after = &rest[at + DIRECTIVE.len()..];
        match quoted_span(after) {
            Some((name, end)) => {
                if stack.iter().any(|pending| pending == name) {
                    log::error!("shader package cycle on {name:?} (via {stack:?})");
                } else {
                    match io.read_text(AssetKind::ShaderPackage, name) {
                        Ok(text) => {
                            stack.push(name.to_owned());
                            out.push_str(&expand_includes(io, &text, stack));
                            stack.pop();
                        }
                        Err(err) => log::error!("shader package {name:?} not readable: {err}"),
                    }
                }
                rest = &after[end..];
            }
            None => {
                log::warn!("malformed {DIRECTIVE} directive, expected a quoted name");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// A reusable GLSL snippet, stored fully expanded.
#[derive(Default)]
pub struct ShaderPkg {
    text: String,
}

impl ShaderPkg {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Asset for ShaderPkg {
    type Params = ();
    const KIND: AssetKind = AssetKind::ShaderPackage;

    fn new(_: &()) -> Self {
        Self::default()
    }

    fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
        self.text.clear();
    }

    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
        let source = ctx.io().read_text(Self::KIND, ctx.name())?;
        let mut stack = vec![ctx.name().to_owned()];
        self.text = expand_includes(ctx.io(), &source, &mut stack);
        Ok(())
    }
}

impl Handle<ShaderPkg> {
    /// The expanded package text.
    #[must_use]
    pub fn text(&self) -> String {
        self.read().text().to_owned()
    }
}

// ============================================================================
// Tests
// ============================================================================
