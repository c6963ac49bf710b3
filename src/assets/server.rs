//! The asset server: one registry for every loaded resource.
//!
//! # Overview
//!
//! Requests are deduplicated by `(type, name)` against a weak-reference
//! table, so concurrent loads of the same asset share one record and the
//! table never keeps an unused asset alive. A request for a name whose
//! source file is missing is rerouted to the per-type shared default
//! record, after logging what was asked for.
//!
//! Initialize work runs on a small worker pool (or inline for synchronous
//! requests); finalize work always waits for [`AssetServer::update`], which
//! must run on the thread owning the GPU device. One `update` pass executes
//! pending finalize orders, destroys GPU objects released since the last
//! pass, fires completion callbacks, and prunes dead table entries.

use std::any::{Any, TypeId};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::assets::asset::{Asset, LoadContext, LoadState};
use crate::assets::handle::{AssetRecord, Handle};
use crate::assets::io::AssetIo;
use crate::assets::scheduler::{self, FinalizeOrder, WorkOrder, WorkQueues};
use crate::gpu::{GpuContext, GpuDevice, ReleaseQueue};

// ============================================================================
// Settings
// ============================================================================

/// Construction parameters for [`AssetServer`].
#[derive(Debug, Clone)]
pub struct AssetServerSettings {
    /// Install root the per-kind subdirectories hang off.
    pub root: PathBuf,
    /// Size of the initialize worker pool. Clamped to at least one.
    pub worker_threads: usize,
}

impl Default for AssetServerSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            worker_threads: 3,
        }
    }
}

// ============================================================================
// Shared core
// ============================================================================

type RecordKey = (TypeId, String);

/// State shared between the server, its workers and in-flight load closures.
pub(crate) struct ServerCore {
    io: AssetIo,
    table: Mutex<FxHashMap<RecordKey, Weak<dyn Any + Send + Sync>>>,
    queues: WorkQueues,
    releases: ReleaseQueue,
}

impl ServerCore {
    pub(crate) fn io(&self) -> &AssetIo {
        &self.io
    }
}

/// Maps requested names onto registry keys. The empty name and any name
/// starting with `default` address the per-type shared default record.
fn canonical_name(name: &str) -> &str {
    if name.starts_with("default") { "" } else { name }
}

/// Resolves a request to a handle, creating and scheduling the record if
/// this is the first request for the key.
///
/// Called both from [`AssetServer`] and from [`LoadContext::load`] when one
/// asset pulls in another during its own initialize.
pub(crate) fn load_into<A: Asset>(
    core: &Arc<ServerCore>,
    name: &str,
    params: A::Params,
    threaded: bool,
) -> Handle<A> {
    let name = canonical_name(name);
    if !name.is_empty() && !A::source_exists(&core.io, name, &params) {
        log::error!(
            "{} '{}' not found under '{}', substituting default",
            A::KIND.label(),
            name,
            core.io.root().display()
        );
        return load_into::<A>(core, "", A::Params::default(), threaded);
    }

    let key = (TypeId::of::<A>(), name.to_owned());
    let (record, created) = {
        let mut table = core.table.lock();
        let existing = table
            .get(&key)
            .and_then(std::sync::Weak::upgrade)
            .and_then(|any| any.downcast::<AssetRecord<A>>().ok());
        match existing {
            Some(record) => (record, false),
            None => {
                let payload = A::new(&params);
                let record = Arc::new(AssetRecord::new(
                    name,
                    payload,
                    params,
                    core.queues.notify_sender(),
                ));
                let any: Arc<dyn Any + Send + Sync> = record.clone();
                table.insert(key, Arc::downgrade(&any));
                (record, true)
            }
        }
    };

    if created {
        core.queues.submit(make_order(core, &record), threaded);
    } else if !threaded {
        // A synchronous request on an in-flight record blocks until the CPU
        // phase lands; the GPU phase still belongs to the next update pass.
        record.wait_initialized();
    }
    Handle::from_record(record)
}

/// Builds the two-phase order for a freshly created record.
///
/// The initialize closure decodes on whatever thread runs it and hands back
/// the finalize closure for the GPU thread. Initialize failures are logged
/// and replaced by the default payload, so every record still converges to
/// `Ready` and waiters are never stranded.
fn make_order<A: Asset>(core: &Arc<ServerCore>, record: &Arc<AssetRecord<A>>) -> WorkOrder {
    let core = core.clone();
    let record = record.clone();
    WorkOrder(Box::new(move || {
        record.set_state(LoadState::Initializing);
        let name = record.name().to_owned();
        {
            let mut ctx = LoadContext::new(&core, &name);
            let mut payload = record.payload_mut();
            let outcome = if name.is_empty() {
                payload.load_default(&mut ctx);
                Ok(())
            } else {
                payload.initialize(&mut ctx)
            };
            if let Err(err) = outcome {
                log::error!("initializing {} '{name}' failed: {err}", A::KIND.label());
                *payload = A::new(record.params());
                payload.load_default(&mut ctx);
            }
        }
        record.set_state(LoadState::Initialized);

        FinalizeOrder(Box::new(move |gpu| {
            record.set_state(LoadState::Finalizing);
            if let Err(err) = record.payload_mut().finalize(gpu) {
                log::error!(
                    "finalizing {} '{}' failed: {err}",
                    A::KIND.label(),
                    record.name()
                );
            }
            record.mark_ready();
        }))
    }))
}

// ============================================================================
// Server
// ============================================================================

/// Owns the registry and the worker pool. Cheap to share via [`Handle`]s;
/// dropped last, it winds the workers down and lets pending GPU work die
/// with the queues.
pub struct AssetServer {
    core: Arc<ServerCore>,
    workers: Vec<JoinHandle<()>>,
}

impl AssetServer {
    #[must_use]
    pub fn new(settings: AssetServerSettings) -> Self {
        let (queues, work_rx) = WorkQueues::new();
        let finalize_tx = queues.finalize_sender();
        let workers =
            scheduler::spawn_workers(settings.worker_threads.max(1), &work_rx, &finalize_tx);
        let core = Arc::new(ServerCore {
            io: AssetIo::new(settings.root),
            table: Mutex::new(FxHashMap::default()),
            queues,
            releases: ReleaseQueue::new(),
        });
        Self { core, workers }
    }

    /// File access rooted at the install directory.
    #[must_use]
    pub fn io(&self) -> &AssetIo {
        self.core.io()
    }

    /// Requests an asset. `threaded` picks between pool initialize and
    /// inline initialize; either way GPU finalize waits for [`Self::update`].
    pub fn load<A: Asset>(&self, name: &str, params: A::Params, threaded: bool) -> Handle<A> {
        load_into(&self.core, name, params, threaded)
    }

    /// Returns a handle only if the asset is already resident.
    #[must_use]
    pub fn query<A: Asset>(&self, name: &str) -> Option<Handle<A>> {
        let key = (TypeId::of::<A>(), canonical_name(name).to_owned());
        let table = self.core.table.lock();
        table
            .get(&key)
            .and_then(std::sync::Weak::upgrade)
            .and_then(|any| any.downcast::<AssetRecord<A>>().ok())
            .map(Handle::from_record)
    }

    /// Runs one notifier pass on the thread owning `device`: finalize
    /// uploads, then deferred GPU releases, then completion callbacks, then
    /// table pruning.
    pub fn update(&self, device: &dyn GpuDevice) {
        let mut gpu = GpuContext::new(device, self.core.releases.sender());
        let finalized = self.core.queues.drain_finalize(&mut gpu);
        let released = self.core.releases.drain(device);
        let notified = self.core.queues.drain_notifications();
        let pruned = self.prune_table();
        if finalized + released + notified + pruned > 0 {
            log::debug!(
                "asset pass: {finalized} finalized, {released} released, \
                 {notified} notified, {pruned} records pruned"
            );
        }
    }

    /// Number of live records in the registry.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.core
            .table
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn prune_table(&self) -> usize {
        let mut table = self.core.table.lock();
        let before = table.len();
        table.retain(|_, weak| weak.strong_count() > 0);
        before - table.len()
    }
}

impl Drop for AssetServer {
    /// Closes the work channel and joins the pool. Queued finalize orders
    /// are dropped unexecuted, which is safe: records die with their
    /// handles and GPU objects were never created for them.
    fn drop(&mut self) {
        self.core.queues.shutdown();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("asset worker panicked during shutdown");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::errors::Result;
    use crate::gpu::HeadlessDevice;

    /// Minimal file-backed asset for exercising the registry.
    struct Blob {
        text: String,
    }

    impl Asset for Blob {
        type Params = ();
        const KIND: crate::assets::AssetKind = crate::assets::AssetKind::Config;

        fn new(_: &()) -> Self {
            Self {
                text: String::new(),
            }
        }

        fn load_default(&mut self, _ctx: &mut LoadContext<'_>) {
            self.text = "fallback".to_owned();
        }

        fn initialize(&mut self, ctx: &mut LoadContext<'_>) -> Result<()> {
            self.text = ctx.io().read_text(Self::KIND, ctx.name())?;
            Ok(())
        }
    }

    fn server_over(dir: &std::path::Path) -> AssetServer {
        AssetServer::new(AssetServerSettings {
            root: dir.to_path_buf(),
            worker_threads: 1,
        })
    }

    fn pump_until_ready(server: &AssetServer, device: &HeadlessDevice, handle: &Handle<Blob>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.ready() {
            server.update(device);
            assert!(Instant::now() < deadline, "asset never became ready");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn repeated_requests_share_one_record() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Configs")).unwrap();
        std::fs::write(dir.path().join("Configs/a.cfg"), "alpha").unwrap();

        let server = server_over(dir.path());
        let first = server.load::<Blob>("a", (), false);
        let second = server.load::<Blob>("a", (), false);
        assert!(first.ptr_eq(&second));
        assert_eq!(server.resident_count(), 1);
    }

    #[test]
    fn synchronous_create_reads_the_file_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Configs")).unwrap();
        std::fs::write(dir.path().join("Configs/a.cfg"), "alpha").unwrap();

        let server = server_over(dir.path());
        let handle = server.load::<Blob>("a", (), false);
        assert_eq!(handle.read().text, "alpha");
        assert!(!handle.ready(), "readiness still waits for the update pass");

        let device = HeadlessDevice::new();
        server.update(&device);
        assert!(handle.ready());
    }

    #[test]
    fn missing_source_routes_to_the_shared_default() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_over(dir.path());

        let missing = server.load::<Blob>("nope", (), false);
        let named_default = server.load::<Blob>("default_blob", (), false);
        assert!(missing.ptr_eq(&named_default));
        assert_eq!(missing.name(), "");
        assert_eq!(missing.read().text, "fallback");
    }

    #[test]
    fn threaded_load_becomes_ready_through_update() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Configs")).unwrap();
        std::fs::write(dir.path().join("Configs/a.cfg"), "alpha").unwrap();

        let server = server_over(dir.path());
        let device = HeadlessDevice::new();
        let handle = server.load::<Blob>("a", (), true);
        pump_until_ready(&server, &device, &handle);
        assert_eq!(handle.read().text, "alpha");
        assert_eq!(handle.state(), LoadState::Ready);
    }

    #[test]
    fn dropped_handles_are_pruned_and_reloaded_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Configs")).unwrap();
        std::fs::write(dir.path().join("Configs/a.cfg"), "alpha").unwrap();

        let server = server_over(dir.path());
        let device = HeadlessDevice::new();
        let handle = server.load::<Blob>("a", (), false);
        server.update(&device);
        drop(handle);
        server.update(&device);
        assert!(server.query::<Blob>("a").is_none());
        assert_eq!(server.resident_count(), 0);

        // A later request starts a fresh load rather than resurrecting.
        let again = server.load::<Blob>("a", (), false);
        assert_eq!(again.read().text, "alpha");
    }

    #[test]
    fn empty_name_is_the_default_record() {
        let dir = tempfile::tempdir().unwrap();
        let server = server_over(dir.path());
        let handle = server.load::<Blob>("", (), false);
        assert_eq!(handle.read().text, "fallback");
    }
}
