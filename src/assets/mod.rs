//! Asset Pipeline Module
//!
//! Everything between "a caller asks for a name" and "the GPU object is
//! resident and dependents have been told":
//!
//! - [`server`]: the [`AssetServer`] registry with name-keyed deduplication
//!   and the per-frame notifier pass
//! - `scheduler`: work-order channels and the worker-thread pool
//! - [`handle`]: reference-counted [`Handle`]s, readiness state and
//!   completion callbacks
//! - [`asset`]: the [`Asset`] trait each resource variant implements
//! - [`io`]: the on-disk layout (subdirectory + extension per kind)
//!
//! # Lifecycle
//!
//! `load` resolves the name through the registry; new records are submitted
//! as a work order whose initialize phase (decode/parse, no GPU) runs on a
//! worker or inline, and whose finalize phase (upload) is always queued for
//! the thread driving [`AssetServer::update`]. Failures substitute the
//! type's hard-coded default payload; every submitted record converges to
//! `Ready`.

pub mod asset;
pub mod handle;
pub mod io;
pub(crate) mod scheduler;
pub mod server;

pub use asset::{Asset, LoadContext, LoadState};
pub use handle::{CallbackToken, Handle};
pub use io::{AssetIo, AssetKind};
pub use server::{AssetServer, AssetServerSettings};
