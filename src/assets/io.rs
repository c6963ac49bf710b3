//! On-disk asset layout.
//!
//! Assets resolve relative to one install root, each kind under its
//! conventional subdirectory with a fixed extension. Names may carry their
//! own extension (texture channel lists often do), in which case the kind's
//! extension is not appended.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{CandelaError, Result};

/// Every loadable resource kind, with its directory and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Config,
    Image,
    Texture,
    Cubemap,
    Material,
    Mesh,
    Model,
    Primitive,
    Shader,
    ShaderPackage,
    Sound,
}

impl AssetKind {
    /// Subdirectory below the install root.
    #[must_use]
    pub fn subdir(self) -> &'static str {
        match self {
            Self::Config => "Configs",
            Self::Image | Self::Texture => "Textures",
            Self::Cubemap => "Textures/Cubemaps",
            Self::Material => "Materials",
            Self::Mesh | Self::Model => "Models",
            Self::Primitive => "Primitives",
            Self::Shader | Self::ShaderPackage => "Shaders",
            Self::Sound => "Sounds",
        }
    }

    /// Default extension appended when a name carries none. Shader names
    /// expand to the per-stage `.vsh`/`.fsh`/`.gsh` trio and cubemap names
    /// are face prefixes, so both resolve without a fixed extension here.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Config => ".cfg",
            Self::Image | Self::Texture => ".png",
            Self::Cubemap | Self::Shader => "",
            Self::Material => ".mat",
            Self::Mesh | Self::Model | Self::Primitive => ".obj",
            Self::ShaderPackage => ".pkg",
            Self::Sound => ".wav",
        }
    }

    /// Lowercase label for diagnostics.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Image => "image",
            Self::Texture => "texture",
            Self::Cubemap => "cubemap",
            Self::Material => "material",
            Self::Mesh => "mesh",
            Self::Model => "model",
            Self::Primitive => "primitive",
            Self::Shader => "shader",
            Self::ShaderPackage => "shader package",
            Self::Sound => "sound",
        }
    }
}

/// Root-relative file access for the asset server.
#[derive(Debug, Clone)]
pub struct AssetIo {
    root: PathBuf,
}

impl AssetIo {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path for `name` under `kind`'s subdirectory. The kind extension
    /// is appended only when the name does not already carry one.
    #[must_use]
    pub fn resolve(&self, kind: AssetKind, name: &str) -> PathBuf {
        let mut path = self.root.join(kind.subdir());
        if Path::new(name).extension().is_some() || kind.extension().is_empty() {
            path.push(name);
        } else {
            path.push(format!("{name}{}", kind.extension()));
        }
        path
    }

    #[must_use]
    pub fn exists(&self, kind: AssetKind, name: &str) -> bool {
        self.resolve(kind, name).is_file()
    }

    pub fn read_bytes(&self, kind: AssetKind, name: &str) -> Result<Vec<u8>> {
        let path = self.resolve(kind, name);
        if !path.is_file() {
            return Err(CandelaError::FileMissing(path));
        }
        Ok(fs::read(path)?)
    }

    pub fn read_text(&self, kind: AssetKind, name: &str) -> Result<String> {
        let path = self.resolve(kind, name);
        if !path.is_file() {
            return Err(CandelaError::FileMissing(path));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Writes `contents`, creating the kind subdirectory if needed. Used by
    /// config save-back.
    pub fn write_text(&self, kind: AssetKind, name: &str, contents: &str) -> Result<()> {
        let path = self.resolve(kind, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
