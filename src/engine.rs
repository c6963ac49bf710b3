//! Engine Core Module
//!
//! This module contains [`Engine`], the thin coordinator tying the asset
//! server to the GPU device that finalizes its uploads. It carries no window
//! or render-loop logic, allowing it to be driven by different frontends
//! (a windowed GL application, an offscreen tool, tests).
//!
//! # Architecture
//!
//! - **`AssetServer`**: Centralized asset registry, worker pool and queues
//! - **`GpuDevice`**: The injected backend all finalization goes through
//!
//! The one rule the engine enforces is thread affinity: every GPU-touching
//! step of the asset pipeline runs inside [`Engine::update`], on whichever
//! thread owns the device. Worker threads only ever produce CPU payloads.
//!
//! # Example
//!
//! ```rust,ignore
//! use candela::{AssetServer, AssetServerSettings, Engine};
//!
//! let mut engine = Engine::new(Box::new(gl_device), AssetServerSettings::default());
//! let model = engine.assets.load::<candela::Model>("sponza", (), true);
//!
//! // Main loop, on the GL thread:
//! loop {
//!     engine.update();
//!     // ... draw using model once model.ready() ...
//! }
//! ```

use crate::assets::{AssetServer, AssetServerSettings};
use crate::gpu::GpuDevice;

/// The engine instance owning the asset pipeline and its GPU device.
///
/// # Components
///
/// - `assets`: Central asset storage; safe to share with any thread
/// - `device`: The GPU backend used to finalize assets and to bind them
///
/// # Lifecycle
///
/// 1. Create with [`Engine::new`], handing over the device
/// 2. Request assets through [`Engine::assets`] from any thread
/// 3. Call [`Engine::update`] once per frame on the device's thread
pub struct Engine {
    pub assets: AssetServer,
    device: Box<dyn GpuDevice>,
    frame_count: u64,
}

impl Engine {
    /// Creates an engine around `device`.
    ///
    /// The device is boxed rather than generic so frontends can pick a
    /// backend at runtime; it is deliberately not required to be `Send`,
    /// which keeps the engine pinned to the thread that created the GL
    /// context.
    #[must_use]
    pub fn new(device: Box<dyn GpuDevice>, settings: AssetServerSettings) -> Self {
        Self {
            assets: AssetServer::new(settings),
            device,
            frame_count: 0,
        }
    }

    /// The GPU backend, for binding finalized assets during rendering.
    #[must_use]
    pub fn device(&self) -> &dyn GpuDevice {
        self.device.as_ref()
    }

    /// Returns the total number of frames processed since startup.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Advances the asset pipeline by one frame.
    ///
    /// Must be called on the thread owning the GPU device. Each call
    /// finalizes every asset the workers have initialized since the last
    /// frame, destroys GPU objects whose owners were dropped, fires ready
    /// callbacks and prunes dead registry entries.
    pub fn update(&mut self) {
        self.frame_count += 1;
        self.assets.update(self.device.as_ref());
    }
}
