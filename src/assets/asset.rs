//! The trait every resource variant implements, and the context handed to
//! its load phases.
//!
//! The two-phase contract lives here: [`Asset::initialize`] is decode/parse
//! work that may run on any thread and must not touch the graphics API;
//! [`Asset::finalize`] is the upload step and only ever runs on the thread
//! driving the notifier pass. Types without GPU state (configs, images,
//! meshes, sounds) keep the default no-op finalize.

use std::sync::Arc;

use crate::errors::Result;
use crate::gpu::GpuContext;

use super::handle::Handle;
use super::io::{AssetIo, AssetKind};
use super::server::{self, ServerCore};

/// Lifecycle of one asset record.
///
/// `Initializing -> Initialized` is the decode/parse transition;
/// `Initialized -> Finalizing -> Ready` is the GL-thread upload transition.
/// Failed loads still converge to `Ready`, carrying default payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Initializing,
    Initialized,
    Finalizing,
    Ready,
}

/// A loadable resource variant.
pub trait Asset: Sized + Send + Sync + 'static {
    /// Per-request construction arguments (texture flags, config key names,
    /// material channel lists). `Default` supplies the arguments for
    /// fallback records.
    type Params: Clone + Default + Send + Sync + 'static;

    /// Directory/extension bucket for this type.
    const KIND: AssetKind;

    /// Empty payload carrying the params; filled in by `initialize` or
    /// `load_default`.
    fn new(params: &Self::Params) -> Self;

    /// Pre-submission check that the backing file exists. Kinds that repair
    /// missing data during initialize (images, cubemaps) override this to
    /// always pass.
    fn source_exists(io: &AssetIo, name: &str, params: &Self::Params) -> bool {
        let _ = params;
        io.exists(Self::KIND, name)
    }

    /// Fills the hard-coded fallback payload. Must not fail and must not
    /// depend on disk content.
    fn load_default(&mut self, ctx: &mut LoadContext<'_>);

    /// Decode/parse phase. No graphics API access.
    fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()>;

    /// Upload phase, GL thread only. Defaults to a no-op for CPU-resident
    /// kinds.
    fn finalize(&mut self, gpu: &mut GpuContext<'_>) -> Result<()> {
        let _ = gpu;
        Ok(())
    }
}

/// What an initialize step may reach: the install root and the server, for
/// nested loads (a model pulls in its mesh and material, a texture its
/// image).
pub struct LoadContext<'a> {
    core: &'a Arc<ServerCore>,
    name: &'a str,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(core: &'a Arc<ServerCore>, name: &'a str) -> Self {
        Self { core, name }
    }

    /// Canonical name of the asset being loaded ("" for defaults).
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    #[must_use]
    pub fn io(&self) -> &AssetIo {
        self.core.io()
    }

    /// Nested load through the owning server. `threaded = false` runs the
    /// nested initialize inline on the current thread, so its CPU data is
    /// usable immediately; `threaded = true` fans out to the worker pool.
    pub fn load<B: Asset>(&self, name: &str, params: B::Params, threaded: bool) -> Handle<B> {
        server::load_into(self.core, name, params, threaded)
    }
}
