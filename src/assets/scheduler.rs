//! Work-order plumbing: the worker pool and the queues between load phases.
//!
//! A submitted load becomes a [`WorkOrder`] (the initialize closure). Its
//! result is a [`FinalizeOrder`] (the upload closure) queued for the thread
//! that drives the notifier pass; initialize may run on a worker thread or
//! inline on the submitter, but finalize is never run inline. Completion
//! callbacks travel as [`Notification`]s and are dispatched after the
//! finalize drain of a pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use flume::{Receiver, Sender};
use parking_lot::Mutex;

use crate::gpu::GpuContext;

/// Deferred initialize phase. Running it produces the finalize phase.
pub(crate) struct WorkOrder(pub Box<dyn FnOnce() -> FinalizeOrder + Send>);

/// Deferred upload phase, executed by the notifier pass.
pub(crate) struct FinalizeOrder(pub Box<dyn FnOnce(&mut GpuContext<'_>) + Send>);

/// A completion callback on its way to dispatch. `alive` is shared with the
/// registration token so removal can still silence a queued callback.
pub(crate) struct Notification {
    pub alive: Arc<AtomicBool>,
    pub run: Box<dyn FnOnce() + Send>,
}

/// Channel set connecting submitters, workers and the notifier pass.
pub(crate) struct WorkQueues {
    work_tx: Mutex<Option<Sender<WorkOrder>>>,
    finalize_tx: Sender<FinalizeOrder>,
    finalize_rx: Receiver<FinalizeOrder>,
    notify_tx: Sender<Notification>,
    notify_rx: Receiver<Notification>,
}

impl WorkQueues {
    /// Builds the queue set plus the receiving end handed to the workers.
    pub(crate) fn new() -> (Self, Receiver<WorkOrder>) {
        let (work_tx, work_rx) = flume::unbounded();
        let (finalize_tx, finalize_rx) = flume::unbounded();
        let (notify_tx, notify_rx) = flume::unbounded();
        (
            Self {
                work_tx: Mutex::new(Some(work_tx)),
                finalize_tx,
                finalize_rx,
                notify_tx,
                notify_rx,
            },
            work_rx,
        )
    }

    pub(crate) fn finalize_sender(&self) -> Sender<FinalizeOrder> {
        self.finalize_tx.clone()
    }

    pub(crate) fn notify_sender(&self) -> Sender<Notification> {
        self.notify_tx.clone()
    }

    /// Routes a work order. Threaded submissions go to the pool; synchronous
    /// ones (and anything submitted after shutdown) run initialize inline.
    /// Either way the produced finalize order is queued, never run here.
    pub(crate) fn submit(&self, order: WorkOrder, threaded: bool) {
        if threaded {
            let sent = {
                let work_tx = self.work_tx.lock();
                match work_tx.as_ref() {
                    Some(tx) => tx.send(order).map_err(|e| e.into_inner()),
                    None => Err(order),
                }
            };
            match sent {
                Ok(()) => return,
                Err(order) => {
                    log::warn!("worker pool unavailable, initializing inline");
                    let finalize = (order.0)();
                    let _ = self.finalize_tx.send(finalize);
                    return;
                }
            }
        }
        let finalize = (order.0)();
        let _ = self.finalize_tx.send(finalize);
    }

    /// Executes every queued finalize order in FIFO order. GL thread only.
    pub(crate) fn drain_finalize(&self, gpu: &mut GpuContext<'_>) -> usize {
        let mut finalized = 0;
        for order in self.finalize_rx.try_iter() {
            (order.0)(gpu);
            finalized += 1;
        }
        finalized
    }

    /// Fires every queued live notification. Returns how many actually ran.
    pub(crate) fn drain_notifications(&self) -> usize {
        let mut fired = 0;
        for notification in self.notify_rx.try_iter() {
            if notification.alive.load(Ordering::Acquire) {
                (notification.run)();
                fired += 1;
            }
        }
        fired
    }

    /// Closes the work channel so workers drain and exit. Later threaded
    /// submissions fall back to inline initialize.
    pub(crate) fn shutdown(&self) {
        self.work_tx.lock().take();
    }
}

/// Spawns the initialize worker pool. Workers exit when the work channel
/// closes and has been drained.
pub(crate) fn spawn_workers(
    count: usize,
    work_rx: &Receiver<WorkOrder>,
    finalize_tx: &Sender<FinalizeOrder>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|index| {
            let work_rx = work_rx.clone();
            let finalize_tx = finalize_tx.clone();
            std::thread::Builder::new()
                .name(format!("asset-worker-{index}"))
                .spawn(move || {
                    log::trace!("asset worker {index} up");
                    while let Ok(order) = work_rx.recv() {
                        let finalize = (order.0)();
                        if finalize_tx.send(finalize).is_err() {
                            break;
                        }
                    }
                    log::trace!("asset worker {index} down");
                })
                .expect("spawning asset worker")
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::{GpuContext, HeadlessDevice, ReleaseQueue};

    fn noop_finalize() -> FinalizeOrder {
        FinalizeOrder(Box::new(|_| {}))
    }

    #[test]
    fn synchronous_submit_runs_initialize_inline_and_queues_finalize() {
        let (queues, _work_rx) = WorkQueues::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        queues.submit(
            WorkOrder(Box::new(move || {
                flag.store(true, Ordering::Release);
                noop_finalize()
            })),
            false,
        );
        assert!(ran.load(Ordering::Acquire), "initialize ran on submit");

        let device = HeadlessDevice::new();
        let releases = ReleaseQueue::new();
        let mut gpu = GpuContext::new(&device, releases.sender());
        assert_eq!(queues.drain_finalize(&mut gpu), 1, "finalize was queued");
    }

    #[test]
    fn threaded_submit_flows_through_a_worker() {
        let (queues, work_rx) = WorkQueues::new();
        let workers = spawn_workers(1, &work_rx, &queues.finalize_sender());
        drop(work_rx);

        queues.submit(WorkOrder(Box::new(noop_finalize)), true);

        // The worker forwards the finalize order; wait for it to land.
        let order = queues
            .finalize_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("worker should forward the finalize order");
        drop(order);

        queues.shutdown();
        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn shutdown_degrades_threaded_submit_to_inline() {
        let (queues, work_rx) = WorkQueues::new();
        drop(work_rx);
        queues.shutdown();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        queues.submit(
            WorkOrder(Box::new(move || {
                flag.store(true, Ordering::Release);
                noop_finalize()
            })),
            true,
        );
        assert!(ran.load(Ordering::Acquire));
    }

    #[test]
    fn dead_notifications_do_not_fire() {
        let (queues, _work_rx) = WorkQueues::new();
        let alive = Arc::new(AtomicBool::new(true));
        let dead = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicBool::new(false));

        let flag = fired.clone();
        queues
            .notify_sender()
            .send(Notification {
                alive: dead,
                run: Box::new(move || flag.store(true, Ordering::Release)),
            })
            .unwrap();
        let flag = fired.clone();
        queues
            .notify_sender()
            .send(Notification {
                alive,
                run: Box::new(move || flag.store(true, Ordering::Release)),
            })
            .unwrap();

        assert_eq!(queues.drain_notifications(), 1, "only the live one fires");
        assert!(fired.load(Ordering::Acquire));
    }
}
