//! Stream lifecycle manager implementation
//!
//! Two locks with distinct jobs:
//! - `state` (synchronous, short): lease count, running flag, idle timer.
//!   Never held across an engine call or an await.
//! - `transition` (async): serializes engine `start`/`stop`/`shutdown` so an
//!   idle stop and a fresh start can never interleave.
//!
//! Engine calls may block on the device and run on the blocking pool.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::error::LifecycleError;
use super::lease::Lease;
use super::state::{CaptureState, ManagerStats};
use crate::broadcast::FrameBroadcaster;
use crate::engine::{CaptureEngine, EngineError};

/// Pending idle-stop task
struct IdleTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct LifecycleState {
    /// Live leases
    n_streams: usize,
    /// Engine has been started and not stopped since
    running: bool,
    shut_down: bool,
    idle_timer: Option<IdleTimer>,
    /// Bumped every time a timer is armed; a firing timer must still match
    timer_generation: u64,
    next_lease_id: u64,
}

impl LifecycleState {
    fn cancel_idle_timer(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.handle.abort();
            tracing::debug!(generation = timer.generation, "Idle timer cancelled");
        }
    }
}

pub(super) struct ManagerInner {
    engine: Arc<dyn CaptureEngine>,
    broadcaster: Arc<FrameBroadcaster>,
    idle_timeout: Duration,
    state: Mutex<LifecycleState>,
    transition: tokio::sync::Mutex<()>,
}

impl ManagerInner {
    /// Called from `Lease::drop`
    pub(super) fn release(self: &Arc<Self>, lease_id: u64) {
        let stop_now = {
            let mut state = self.state.lock();
            debug_assert!(state.n_streams > 0, "lease released twice");
            state.n_streams = state.n_streams.saturating_sub(1);

            tracing::info!(
                lease_id = lease_id,
                n_streams = state.n_streams,
                "Stream released"
            );

            if state.n_streams > 0 || !state.running || state.shut_down {
                return;
            }
            !self.arm_idle_timer(&mut state)
        };

        if stop_now {
            self.stop_without_runtime();
        }
    }

    /// Spawn the one-shot idle timer; false if no runtime is available
    fn arm_idle_timer(self: &Arc<Self>, state: &mut LifecycleState) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return false;
        };

        state.cancel_idle_timer();
        state.timer_generation += 1;
        let generation = state.timer_generation;

        let weak: Weak<Self> = Arc::downgrade(self);
        let timeout = self.idle_timeout;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_idle(generation).await;
            }
        });

        state.idle_timer = Some(IdleTimer { generation, handle });
        tracing::debug!(
            generation = generation,
            timeout_ms = timeout.as_millis() as u64,
            "Idle timer armed"
        );
        true
    }

    async fn on_idle(&self, generation: u64) {
        let _transition = self.transition.lock().await;

        {
            let mut state = self.state.lock();
            let current = state
                .idle_timer
                .as_ref()
                .is_some_and(|timer| timer.generation == generation);
            if !current {
                return;
            }
            state.idle_timer = None;

            if state.n_streams > 0 || !state.running || state.shut_down {
                return;
            }
            state.running = false;
        }

        tracing::info!("Camera is idle");
        if let Err(e) = self.call_engine(|engine| engine.stop(), EngineError::Stop).await {
            tracing::error!(error = %e, "Failed to stop camera");
        }
    }

    /// Run a blocking engine call on the blocking pool
    async fn call_engine<F>(
        &self,
        op: F,
        on_panic: fn(String) -> EngineError,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(&dyn CaptureEngine) -> Result<(), EngineError> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || op(engine.as_ref()))
            .await
            .unwrap_or_else(|e| Err(on_panic(format!("engine call panicked: {}", e))))
    }

    /// Last lease dropped outside a runtime: stop right away if nothing else
    /// is mid-transition
    fn stop_without_runtime(&self) {
        let Ok(_transition) = self.transition.try_lock() else {
            tracing::warn!("Camera transition in progress, skipping stop without runtime");
            return;
        };

        {
            let mut state = self.state.lock();
            if state.n_streams > 0 || !state.running {
                return;
            }
            state.running = false;
        }

        tracing::warn!("No runtime for idle timer, stopping camera immediately");
        if let Err(e) = self.engine.stop() {
            tracing::error!(error = %e, "Failed to stop camera");
        }
    }

    /// Start the engine unless it is already producing frames
    ///
    /// Also restarts an engine that reported a fatal error. Runs as its own
    /// task so a cancelled request cannot abandon a transition halfway.
    async fn ensure_running(self: Arc<Self>) -> Result<(), LifecycleError> {
        let _transition = self.transition.lock().await;

        let was_failed = self.broadcaster.is_failed();
        let restart = {
            let state = self.state.lock();
            if state.shut_down {
                return Err(LifecycleError::Closed);
            }
            if state.running && !was_failed {
                return Ok(());
            }
            state.running
        };

        if restart {
            tracing::warn!("Restarting failed camera");
            if let Err(e) = self.call_engine(|engine| engine.stop(), EngineError::Stop).await {
                tracing::warn!(error = %e, "Failed to stop camera before restart");
            }
        }

        // Cleared before `start` so a fatal event raised while starting sticks
        self.broadcaster.recover();

        if let Err(e) = self.call_engine(|engine| engine.start(), EngineError::Start).await {
            self.state.lock().running = false;
            if was_failed {
                self.broadcaster.fail(e.to_string());
            }
            tracing::error!(error = %e, "Failed to start camera");
            return Err(LifecycleError::Start(e));
        }

        tracing::info!("Camera started");

        let mut state = self.state.lock();
        state.running = true;
        // Every lease may have been dropped while the engine was starting
        if state.n_streams == 0 {
            self.arm_idle_timer(&mut state);
        }
        Ok(())
    }
}

/// Reference-counts consumers and drives the capture engine
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct StreamManager {
    inner: Arc<ManagerInner>,
}

impl StreamManager {
    /// Create a manager for an idle engine
    pub fn new(
        engine: Arc<dyn CaptureEngine>,
        broadcaster: Arc<FrameBroadcaster>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                engine,
                broadcaster,
                idle_timeout,
                state: Mutex::new(LifecycleState {
                    n_streams: 0,
                    running: false,
                    shut_down: false,
                    idle_timer: None,
                    timer_generation: 0,
                    next_lease_id: 0,
                }),
                transition: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Broadcaster the engine publishes into
    pub fn broadcaster(&self) -> &Arc<FrameBroadcaster> {
        &self.inner.broadcaster
    }

    /// Configured idle timeout
    pub fn idle_timeout(&self) -> Duration {
        self.inner.idle_timeout
    }

    /// Claim the camera for one consumer
    ///
    /// Cancels a pending idle stop and starts the engine if it is not
    /// running. If the start fails the claim is rolled back and the error
    /// returned; no frame would ever arrive for it.
    pub async fn acquire(&self) -> Result<Lease, LifecycleError> {
        let (lease, needs_start) = {
            let mut state = self.inner.state.lock();
            if state.shut_down {
                return Err(LifecycleError::Closed);
            }

            state.n_streams += 1;
            state.cancel_idle_timer();
            state.next_lease_id += 1;

            tracing::info!(
                lease_id = state.next_lease_id,
                n_streams = state.n_streams,
                "Stream acquired"
            );

            let lease = Lease::new(Arc::clone(&self.inner), state.next_lease_id);
            (lease, !state.running || self.inner.broadcaster.is_failed())
        };

        // The lease already exists, so a failed or cancelled start releases it
        if needs_start {
            tokio::spawn(Arc::clone(&self.inner).ensure_running())
                .await
                .map_err(|e| LifecycleError::Start(EngineError::Start(e.to_string())))??;
        }

        Ok(lease)
    }

    /// Tear the engine down for good
    ///
    /// Cancels a pending idle timer, calls the engine's `shutdown` whatever
    /// the lease count, and closes the broadcaster so every waiting consumer
    /// returns. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), LifecycleError> {
        {
            let mut state = self.inner.state.lock();
            if state.shut_down {
                return Ok(());
            }
            state.shut_down = true;
            state.cancel_idle_timer();

            tracing::info!(n_streams = state.n_streams, "Shutting down stream manager");
        }

        let _transition = self.inner.transition.lock().await;
        self.inner.state.lock().running = false;

        let result = self
            .inner
            .call_engine(|engine| engine.shutdown(), EngineError::Shutdown)
            .await;
        self.inner.broadcaster.close();

        result.map_err(|e| {
            tracing::error!(error = %e, "Failed to shut down camera");
            LifecycleError::Shutdown(e)
        })
    }

    /// Number of live leases
    pub fn n_streams(&self) -> usize {
        self.inner.state.lock().n_streams
    }

    pub fn capture_state(&self) -> CaptureState {
        if self.inner.state.lock().running {
            CaptureState::Active
        } else {
            CaptureState::Idle
        }
    }

    pub fn has_pending_idle_timer(&self) -> bool {
        self.inner.state.lock().idle_timer.is_some()
    }

    /// Current lifecycle and broadcast counters
    pub fn stats(&self) -> ManagerStats {
        let (n_streams, running, idle_timer_pending) = {
            let state = self.inner.state.lock();
            (state.n_streams, state.running, state.idle_timer.is_some())
        };

        ManagerStats {
            n_streams,
            capture_state: if running {
                CaptureState::Active
            } else {
                CaptureState::Idle
            },
            idle_timer_pending,
            broadcast: self.inner.broadcaster.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    use bytes::Bytes;
    use tokio_test::{assert_pending, assert_ready_err, assert_ready_ok, task};

    use super::*;
    use crate::broadcast::BroadcastError;
    use crate::config::Config;
    use crate::engine::testing::RecordingEngine;
    use crate::engine::{EngineEvent, FrameSink};

    fn manager_with(timeout: Duration) -> (StreamManager, Arc<RecordingEngine>) {
        let engine = Arc::new(RecordingEngine::default());
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let manager = StreamManager::new(engine.clone(), broadcaster, timeout);
        (manager, engine)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_acquire_starts_engine() {
        let (manager, engine) = manager_with(Duration::from_secs(30));
        assert_eq!(manager.capture_state(), CaptureState::Idle);

        let lease = manager.acquire().await.unwrap();

        assert_eq!(engine.starts(), 1);
        assert_eq!(manager.n_streams(), 1);
        assert_eq!(manager.capture_state(), CaptureState::Active);
        assert!(!manager.has_pending_idle_timer());

        drop(lease);
        assert_eq!(manager.n_streams(), 0);
        assert!(manager.has_pending_idle_timer());
        assert_eq!(manager.capture_state(), CaptureState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_acquire_release_leaves_one_timer() {
        let (manager, engine) = manager_with(Duration::from_secs(30));

        for _ in 0..10 {
            let lease = manager.acquire().await.unwrap();
            drop(lease);
        }

        assert_eq!(manager.n_streams(), 0);
        assert!(manager.has_pending_idle_timer());
        assert_eq!(engine.starts(), 1);
        assert_eq!(engine.stops(), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(engine.stops(), 1);
        assert!(!manager.has_pending_idle_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_before_timeout_cancels_stop() {
        let (manager, engine) = manager_with(Duration::from_secs(2));

        drop(manager.acquire().await.unwrap());
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let lease = manager.acquire().await.unwrap();
        assert!(!manager.has_pending_idle_timer());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.stops(), 0);
        assert_eq!(engine.starts(), 1);
        assert_eq!(manager.capture_state(), CaptureState::Active);

        drop(lease);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_then_idle_stop() {
        let config = Config::from_toml_str("[pipeline]\nidle_timeout = 2.0").unwrap();
        let (manager, engine) = manager_with(config.pipeline.idle_timeout_duration());
        let broadcaster = Arc::clone(manager.broadcaster());

        let lease = manager.acquire().await.unwrap();

        let mut last = None;
        for expected in 0..5u64 {
            let mut next = task::spawn(broadcaster.await_next(last));
            assert_pending!(next.poll());

            broadcaster.publish(Bytes::from(vec![expected as u8; 8]), Instant::now());
            let frame = assert_ready_ok!(next.poll());

            assert_eq!(frame.sequence, expected);
            assert_eq!(frame.gap_since(last), 0);
            last = Some(frame.sequence);
        }

        drop(lease);

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(engine.stops(), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(engine.stops(), 1);
        assert_eq!(manager.capture_state(), CaptureState::Idle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_streams_start_and_stop_once() {
        let (manager, engine) = manager_with(Duration::from_secs(2));

        let (first, second) = tokio::join!(manager.acquire(), manager.acquire());
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(engine.starts(), 1);
        assert_eq!(manager.n_streams(), 2);

        drop(first);
        assert!(!manager.has_pending_idle_timer());
        drop(second);
        assert!(manager.has_pending_idle_timer());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(engine.stops(), 1);
        assert_eq!(engine.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_idle_stop() {
        let (manager, engine) = manager_with(Duration::from_secs(1));

        drop(manager.acquire().await.unwrap());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(manager.capture_state(), CaptureState::Idle);

        let _lease = manager.acquire().await.unwrap();
        assert_eq!(engine.starts(), 2);
        assert_eq!(engine.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_rolls_back() {
        let (manager, engine) = manager_with(Duration::from_secs(1));
        engine.fail_start.store(true, Ordering::SeqCst);

        let result = manager.acquire().await;
        assert!(matches!(result, Err(LifecycleError::Start(_))));
        assert_eq!(manager.n_streams(), 0);
        assert!(!manager.has_pending_idle_timer());
        assert_eq!(manager.capture_state(), CaptureState::Idle);

        engine.fail_start.store(false, Ordering::SeqCst);
        let _lease = manager.acquire().await.unwrap();
        assert_eq!(engine.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_failure_is_not_fatal() {
        let (manager, engine) = manager_with(Duration::from_secs(1));
        engine.fail_stop.store(true, Ordering::SeqCst);

        drop(manager.acquire().await.unwrap());
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(engine.stops(), 1);
        assert_eq!(manager.capture_state(), CaptureState::Idle);

        let _lease = manager.acquire().await.unwrap();
        assert_eq!(engine.starts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_consumer_releases_lease() {
        let (manager, _engine) = manager_with(Duration::from_secs(5));

        let consumer = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let _lease = manager.acquire().await.unwrap();
                manager.broadcaster().await_next(None).await
            })
        };

        while manager.broadcaster().stats().waiting_consumers == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(manager.n_streams(), 1);

        consumer.abort();
        assert!(consumer.await.unwrap_err().is_cancelled());

        assert_eq!(manager.n_streams(), 0);
        assert!(manager.has_pending_idle_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_failure_restarts_on_next_acquire() {
        let (manager, engine) = manager_with(Duration::from_secs(5));
        let broadcaster = Arc::clone(manager.broadcaster());

        let first = manager.acquire().await.unwrap();
        broadcaster.fail("sensor timeout");

        let err = broadcaster.await_next(None).await.unwrap_err();
        assert!(matches!(err, BroadcastError::EngineFailed(_)));

        let _second = manager.acquire().await.unwrap();
        assert_eq!(engine.starts(), 2);
        assert_eq!(engine.stops(), 1);
        assert!(!broadcaster.is_failed());

        drop(first);
    }

    /// Reports a fatal error from inside every `start` after the first
    struct FatalOnRestartEngine {
        sink: FrameSink,
        starts: AtomicUsize,
    }

    impl CaptureEngine for FatalOnRestartEngine {
        fn start(&self) -> Result<(), EngineError> {
            if self.starts.fetch_add(1, Ordering::SeqCst) > 0 {
                self.sink
                    .report(EngineEvent::Fatal("sensor timeout on restart".into()));
            }
            Ok(())
        }

        fn stop(&self) -> Result<(), EngineError> {
            Ok(())
        }

        fn shutdown(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_during_restart_is_kept() {
        let broadcaster = Arc::new(FrameBroadcaster::new());
        let engine = Arc::new(FatalOnRestartEngine {
            sink: FrameSink::new(Arc::clone(&broadcaster)),
            starts: AtomicUsize::new(0),
        });
        let manager = StreamManager::new(
            engine.clone(),
            Arc::clone(&broadcaster),
            Duration::from_secs(5),
        );

        let _first = manager.acquire().await.unwrap();
        broadcaster.fail("sensor timeout");

        let _second = manager.acquire().await.unwrap();
        assert_eq!(engine.starts.load(Ordering::SeqCst), 2);
        assert!(broadcaster.is_failed());

        let mut waiter = task::spawn(broadcaster.await_next(None));
        assert_eq!(
            assert_ready_err!(waiter.poll()),
            BroadcastError::EngineFailed("sensor timeout on restart".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_restart_keeps_failure() {
        let (manager, engine) = manager_with(Duration::from_secs(5));
        let broadcaster = Arc::clone(manager.broadcaster());

        let _first = manager.acquire().await.unwrap();
        broadcaster.fail("sensor timeout");
        engine.fail_start.store(true, Ordering::SeqCst);

        assert!(matches!(
            manager.acquire().await,
            Err(LifecycleError::Start(_))
        ));
        assert!(broadcaster.is_failed());

        let mut waiter = task::spawn(broadcaster.await_next(None));
        assert_ready_err!(waiter.poll());
    }

    /// Blocks inside `start` until released
    struct GatedEngine {
        entered: AtomicBool,
        start_thread: parking_lot::Mutex<Option<std::thread::ThreadId>>,
        gate: parking_lot::Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl GatedEngine {
        fn new() -> (Arc<Self>, std::sync::mpsc::Sender<()>) {
            let (tx, rx) = std::sync::mpsc::channel();
            let engine = Arc::new(Self {
                entered: AtomicBool::new(false),
                start_thread: parking_lot::Mutex::new(None),
                gate: parking_lot::Mutex::new(rx),
            });
            (engine, tx)
        }
    }

    impl CaptureEngine for GatedEngine {
        fn start(&self) -> Result<(), EngineError> {
            *self.start_thread.lock() = Some(std::thread::current().id());
            self.entered.store(true, Ordering::SeqCst);
            let _ = self.gate.lock().recv();
            Ok(())
        }

        fn stop(&self) -> Result<(), EngineError> {
            Ok(())
        }

        fn shutdown(&self) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_engine_calls_leave_runtime_thread() {
        let (engine, gate) = GatedEngine::new();
        drop(gate);
        let manager = StreamManager::new(
            engine.clone(),
            Arc::new(FrameBroadcaster::new()),
            Duration::from_secs(30),
        );

        let _lease = manager.acquire().await.unwrap();

        let start_thread = engine.start_thread.lock().unwrap();
        assert_ne!(start_thread, std::thread::current().id());
    }

    #[tokio::test]
    async fn test_cancelled_acquire_completes_start_and_arms_timer() {
        let (engine, gate) = GatedEngine::new();
        let manager = StreamManager::new(
            engine.clone(),
            Arc::new(FrameBroadcaster::new()),
            Duration::from_secs(30),
        );

        let request = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire().await.map(drop) })
        };
        while !engine.entered.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        request.abort();
        assert!(request.await.unwrap_err().is_cancelled());
        assert_eq!(manager.n_streams(), 0);

        gate.send(()).unwrap();
        for _ in 0..1000 {
            if manager.has_pending_idle_timer() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert_eq!(manager.capture_state(), CaptureState::Active);
        assert!(manager.has_pending_idle_timer());
    }

    #[test]
    fn test_release_outside_runtime_stops_immediately() {
        let (manager, engine) = manager_with(Duration::from_secs(5));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let lease = runtime.block_on(manager.acquire()).unwrap();
        assert_eq!(manager.capture_state(), CaptureState::Active);

        drop(lease);
        assert_eq!(engine.stops(), 1);
        assert_eq!(manager.capture_state(), CaptureState::Idle);
        assert!(!manager.has_pending_idle_timer());
    }

    #[test]
    fn test_release_outside_runtime_skips_stop_during_transition() {
        let (manager, engine) = manager_with(Duration::from_secs(5));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let lease = runtime.block_on(manager.acquire()).unwrap();

        let transition = manager.inner.transition.try_lock().unwrap();
        drop(lease);
        drop(transition);

        assert_eq!(engine.stops(), 0);
        assert_eq!(manager.n_streams(), 0);
        assert_eq!(manager.capture_state(), CaptureState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown() {
        let (manager, engine) = manager_with(Duration::from_secs(5));
        let broadcaster = Arc::clone(manager.broadcaster());

        let lease = manager.acquire().await.unwrap();
        let mut waiter = task::spawn(broadcaster.await_next(None));
        assert_pending!(waiter.poll());

        manager.shutdown().await.unwrap();
        assert_eq!(engine.shutdowns(), 1);
        assert_eq!(manager.capture_state(), CaptureState::Idle);
        assert!(waiter.is_woken());
        assert_eq!(assert_ready_err!(waiter.poll()), BroadcastError::Closed);

        assert!(matches!(manager.acquire().await, Err(LifecycleError::Closed)));

        // Releasing after shutdown arms nothing
        drop(lease);
        assert!(!manager.has_pending_idle_timer());

        manager.shutdown().await.unwrap();
        assert_eq!(engine.shutdowns(), 1);
        assert_eq!(engine.stops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_idle_timer() {
        let (manager, engine) = manager_with(Duration::from_secs(5));

        drop(manager.acquire().await.unwrap());
        assert!(manager.has_pending_idle_timer());

        manager.shutdown().await.unwrap();
        assert!(!manager.has_pending_idle_timer());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.stops(), 0);
        assert_eq!(engine.shutdowns(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats() {
        let (manager, _engine) = manager_with(Duration::from_secs(5));
        let _lease = manager.acquire().await.unwrap();
        manager.broadcaster().publish(Bytes::from_static(b"jpeg"), Instant::now());
        manager.broadcaster().record_dropped(2);

        let stats = manager.stats();
        assert_eq!(stats.n_streams, 1);
        assert_eq!(stats.capture_state, CaptureState::Active);
        assert!(!stats.idle_timer_pending);
        assert_eq!(stats.broadcast.frames_published, 1);
        assert_eq!(stats.broadcast.frames_dropped, 2);
        assert_eq!(stats.broadcast.last_sequence, Some(0));
    }
}
