//! Asset records, handles and completion callbacks.
//!
//! An [`AssetRecord`] is the shared instance behind every [`Handle`] clone:
//! the canonical name, the lifecycle state with its condition variable, the
//! payload behind a reader/writer lock, and the registered completion
//! callbacks. The registry holds only weak references, so the last handle
//! drop destroys the record and, through the payload's RAII wrappers, queues
//! its GPU objects for release.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use slotmap::SlotMap;

use super::asset::{Asset, LoadState};
use super::scheduler::Notification;

slotmap::new_key_type! {
    /// Generational key for one callback registration.
    pub struct CallbackKey;
}

/// Opaque proof of a callback registration, used to remove it.
///
/// Dropping the token does NOT remove the callback; call
/// [`Handle::remove_callback`].
#[derive(Debug)]
pub struct CallbackToken {
    key: CallbackKey,
    alive: Arc<AtomicBool>,
}

struct CallbackEntry {
    alive: Arc<AtomicBool>,
    run: Box<dyn FnOnce() + Send>,
}

/// Shared state of one asset instance.
pub(crate) struct AssetRecord<A: Asset> {
    name: String,
    params: A::Params,
    state: Mutex<LoadState>,
    ready: AtomicBool,
    ready_cv: Condvar,
    payload: RwLock<A>,
    callbacks: Mutex<SlotMap<CallbackKey, CallbackEntry>>,
    notify_tx: flume::Sender<Notification>,
}

impl<A: Asset> AssetRecord<A> {
    pub(crate) fn new(
        name: &str,
        payload: A,
        params: A::Params,
        notify_tx: flume::Sender<Notification>,
    ) -> Self {
        Self {
            name: name.to_string(),
            params,
            state: Mutex::new(LoadState::Unloaded),
            ready: AtomicBool::new(false),
            ready_cv: Condvar::new(),
            payload: RwLock::new(payload),
            callbacks: Mutex::new(SlotMap::with_key()),
            notify_tx,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn params(&self) -> &A::Params {
        &self.params
    }

    pub(crate) fn state(&self) -> LoadState {
        *self.state.lock()
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&self, state: LoadState) {
        *self.state.lock() = state;
        self.ready_cv.notify_all();
    }

    pub(crate) fn payload(&self) -> RwLockReadGuard<'_, A> {
        self.payload.read()
    }

    pub(crate) fn payload_mut(&self) -> RwLockWriteGuard<'_, A> {
        self.payload.write()
    }

    /// Blocks until the record reaches `Ready`. Must not be called from the
    /// thread that drives the notifier unless the record is already ready,
    /// since that thread performs the finalize being waited on.
    pub(crate) fn wait_ready(&self) {
        if self.is_ready() {
            return;
        }
        let mut state = self.state.lock();
        while *state != LoadState::Ready {
            self.ready_cv.wait(&mut state);
        }
    }

    /// Blocks until the CPU phase is done and the payload holds usable data.
    /// Safe from any thread: initialize never runs on the waiter's behalf.
    pub(crate) fn wait_initialized(&self) {
        if self.is_ready() {
            return;
        }
        let mut state = self.state.lock();
        while matches!(*state, LoadState::Unloaded | LoadState::Initializing) {
            self.ready_cv.wait(&mut state);
        }
    }

    /// Flips the record to `Ready`, wakes synchronous waiters, and moves
    /// every registered callback into the notification queue. Runs on the
    /// notifier thread at the end of the finalize order.
    pub(crate) fn mark_ready(&self) {
        {
            let mut state = self.state.lock();
            *state = LoadState::Ready;
        }
        self.ready.store(true, Ordering::Release);
        self.ready_cv.notify_all();

        let drained: Vec<CallbackEntry> = {
            let mut callbacks = self.callbacks.lock();
            callbacks.drain().map(|(_, entry)| entry).collect()
        };
        for entry in drained {
            let _ = self.notify_tx.send(Notification {
                alive: entry.alive,
                run: entry.run,
            });
        }
    }

    /// Registers a completion callback. Before readiness the callback is
    /// parked on the record and dispatched by the pass that finalizes it;
    /// after readiness it is queued directly and fires on the NEXT pass.
    pub(crate) fn add_callback(&self, run: Box<dyn FnOnce() + Send>) -> CallbackToken {
        let alive = Arc::new(AtomicBool::new(true));
        // Lock order matters: taking the callback lock first means a
        // concurrent mark_ready either drains this entry or has already
        // drained, never both.
        let mut callbacks = self.callbacks.lock();
        if self.is_ready() {
            drop(callbacks);
            let _ = self.notify_tx.send(Notification {
                alive: alive.clone(),
                run,
            });
            return CallbackToken {
                key: CallbackKey::default(),
                alive,
            };
        }
        let key = callbacks.insert(CallbackEntry {
            alive: alive.clone(),
            run,
        });
        CallbackToken { key, alive }
    }

    /// Unregisters. The alive flag also silences a callback that was already
    /// moved into the notification queue but has not fired yet.
    pub(crate) fn remove_callback(&self, token: CallbackToken) {
        token.alive.store(false, Ordering::Release);
        self.callbacks.lock().remove(token.key);
    }
}

/// Reference-counted accessor to one asset instance.
///
/// Clones share the instance; the last drop destroys it and releases any
/// GPU objects it owns through the release queue.
pub struct Handle<A: Asset> {
    record: Arc<AssetRecord<A>>,
}

impl<A: Asset> Handle<A> {
    pub(crate) fn from_record(record: Arc<AssetRecord<A>>) -> Self {
        Self { record }
    }

    pub(crate) fn record(&self) -> &Arc<AssetRecord<A>> {
        &self.record
    }

    /// Canonical name ("" for the type's default instance).
    #[must_use]
    pub fn name(&self) -> &str {
        self.record.name()
    }

    /// True once finalize has completed and callbacks have been queued.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.record.is_ready()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.record.state()
    }

    /// Blocks until the asset is `Ready`. See [`AssetServer::load`] for the
    /// synchronous-path rules.
    ///
    /// [`AssetServer::load`]: super::server::AssetServer::load
    pub fn wait(&self) {
        self.record.wait_ready();
    }

    /// Shared access to the payload.
    pub fn read(&self) -> RwLockReadGuard<'_, A> {
        self.record.payload()
    }

    /// Exclusive access to the payload (config edits and the like).
    pub fn write(&self) -> RwLockWriteGuard<'_, A> {
        self.record.payload_mut()
    }

    /// Registers `run` to fire once the asset is ready: on the pass that
    /// finalizes it, or on the next pass if it is ready already. Fires at
    /// most once per registration.
    pub fn on_ready(&self, run: impl FnOnce() + Send + 'static) -> CallbackToken {
        self.record.add_callback(Box::new(run))
    }

    /// Removes a registration; the callback is guaranteed never to fire
    /// afterwards.
    pub fn remove_callback(&self, token: CallbackToken) {
        self.record.remove_callback(token);
    }

    /// Whether two handles point at the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }
}

impl<A: Asset> Clone for Handle<A> {
    fn clone(&self) -> Self {
        Self {
            record: Arc::clone(&self.record),
        }
    }
}

impl<A: Asset> std::fmt::Debug for Handle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &A::KIND.label())
            .field("name", &self.record.name())
            .field("state", &self.record.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::asset::LoadContext;
    use crate::assets::io::AssetKind;
    use crate::errors::Result;

    struct Probe;

    impl Asset for Probe {
        type Params = ();
        const KIND: AssetKind = AssetKind::Config;

        fn new(_: &Self::Params) -> Self {
            Probe
        }

        fn load_default(&mut self, _: &mut LoadContext<'_>) {}

        fn initialize(&mut self, _: &mut LoadContext<'_>) -> Result<()> {
            Ok(())
        }
    }

    fn record() -> (Arc<AssetRecord<Probe>>, flume::Receiver<Notification>) {
        let (tx, rx) = flume::unbounded();
        (Arc::new(AssetRecord::new("probe", Probe, (), tx)), rx)
    }

    #[test]
    fn callbacks_park_until_ready_then_queue() {
        let (record, rx) = record();
        let _token = record.add_callback(Box::new(|| {}));
        assert_eq!(rx.len(), 0, "parked, not queued");

        record.mark_ready();
        assert_eq!(rx.len(), 1, "queued by mark_ready");
        assert!(record.is_ready());
        assert_eq!(record.state(), LoadState::Ready);
    }

    #[test]
    fn post_ready_registration_queues_immediately() {
        let (record, rx) = record();
        record.mark_ready();
        let _token = record.add_callback(Box::new(|| {}));
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn removed_registration_is_dead() {
        let (record, rx) = record();
        let token = record.add_callback(Box::new(|| {}));
        record.remove_callback(token);
        record.mark_ready();
        assert_eq!(rx.len(), 0, "removed before drain, nothing queued");

        // Removal after queueing flips the shared alive flag instead.
        let token = record.add_callback(Box::new(|| {}));
        let alive = token.alive.clone();
        record.remove_callback(token);
        assert!(!alive.load(Ordering::Acquire));
    }

    #[test]
    fn wait_returns_immediately_when_ready() {
        let (record, _rx) = record();
        record.mark_ready();
        record.wait_ready();
    }

    #[test]
    fn waiters_wake_on_mark_ready() {
        let (record, _rx) = record();
        let waiter = {
            let record = Arc::clone(&record);
            std::thread::spawn(move || record.wait_ready())
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        record.mark_ready();
        waiter.join().unwrap();
    }
}
