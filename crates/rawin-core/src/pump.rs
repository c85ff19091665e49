//! Dedicated message pump thread owning one message-only window.
//!
//! Work is marshalled onto the pump thread through [`PumpHost::invoke`]:
//! commands go into an unbounded queue and a single coalesced wake
//! notification tells the pump to drain it. Each command resolves its own
//! [`Completion`].

use crate::error::{panic_message, PlatformError, PlatformResult, PumpFault, ReceiverError, ReceiverResult};
use crate::gateway::{self, Handled, Message, MessageHandler, WindowId, WindowToken};
use crate::platform::{MessageWindowHost, PumpStatus};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{fence, AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Consecutive retrieval errors after which the pump gives up.
const MAX_CONSECUTIVE_FAILURES: u32 = 8;

type Action = Box<dyn FnOnce(WindowId) -> PlatformResult<()> + Send>;

struct Command {
    action: Action,
    done: Sender<ReceiverResult<()>>,
}

impl Command {
    /// Run on the pump thread. Returns the panic reason if the action panicked.
    fn run(self, window: WindowId) -> Option<String> {
        let action = self.action;
        let (outcome, panicked) = match catch_unwind(AssertUnwindSafe(move || action(window))) {
            Ok(result) => (result.map_err(ReceiverError::from), None),
            Err(payload) => {
                let reason = panic_message(&*payload);
                (Err(ReceiverError::CommandPanicked(reason.clone())), Some(reason))
            }
        };
        let _ = self.done.send(outcome);
        panicked
    }

    fn reject(self) {
        let _ = self.done.send(Err(ReceiverError::Disposed));
    }
}

/// Pending result of an [`PumpHost::invoke`] call.
#[derive(Debug)]
pub struct Completion {
    rx: Receiver<ReceiverResult<()>>,
}

impl Completion {
    /// Block until the command has run or been rejected.
    pub fn wait(self) -> ReceiverResult<()> {
        self.rx.recv().unwrap_or(Err(ReceiverError::CommandDropped))
    }

    /// Block for at most `timeout`. `None` means the command is still pending.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ReceiverResult<()>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(ReceiverError::CommandDropped)),
        }
    }

    /// Non-blocking check.
    pub fn try_result(&self) -> Option<ReceiverResult<()>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(ReceiverError::CommandDropped)),
        }
    }
}

struct PumpThread {
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

struct PumpShared<P: MessageWindowHost> {
    platform: Arc<P>,
    token: WindowToken,
    handler: Option<Arc<dyn MessageHandler>>,
    dispose_timeout: Duration,
    window: OnceLock<WindowId>,
    pump_thread: OnceLock<ThreadId>,
    commands_tx: Sender<Command>,
    commands_rx: Receiver<Command>,
    wake_pending: AtomicBool,
    quitting: AtomicBool,
    stopped: AtomicBool,
    disposed: AtomicBool,
    last_fault: Mutex<Option<PumpFault>>,
    thread: Mutex<Option<PumpThread>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: MessageWindowHost> PumpShared<P> {
    fn record_fault(&self, fault: PumpFault) {
        *lock(&self.last_fault) = Some(fault);
    }

    fn wake(&self) {
        fence(Ordering::SeqCst);
        if self.wake_pending.swap(true, Ordering::SeqCst) {
            return;
        }
        // Without a window yet, the pump drains right after creating it.
        let Some(window) = self.window.get() else {
            return;
        };
        if let Err(err) = self.platform.post_message(*window, Message::Wake) {
            self.wake_pending.store(false, Ordering::SeqCst);
            warn!(error = %err, "Failed to post wake to pump window");
        }
    }

    fn drain_commands(&self, window: WindowId) {
        self.wake_pending.store(false, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        while let Ok(command) = self.commands_rx.try_recv() {
            if let Some(reason) = command.run(window) {
                error!(reason = %reason, "Pump command panicked");
                self.record_fault(PumpFault::CommandPanicked(reason));
            }
        }
    }

    fn reject_pending(&self) {
        let mut rejected = 0usize;
        while let Ok(command) = self.commands_rx.try_recv() {
            command.reject();
            rejected += 1;
        }
        if rejected > 0 {
            debug!(rejected, "Rejected commands left after pump shutdown");
        }
    }

    fn run(self: Arc<Self>, ready: Sender<Result<WindowId, PumpFault>>, exited: Sender<()>) {
        let _ = self.pump_thread.set(thread::current().id());

        let created = self
            .platform
            .register_class()
            .and_then(|()| self.platform.create_message_window(self.token));

        match created {
            Ok(window) => {
                let _ = self.window.set(window);
                let _ = ready.send(Ok(window));
                info!(?window, token = ?self.token, "Message pump started");

                fence(Ordering::SeqCst);
                self.drain_commands(window);
                self.pump_loop();

                self.platform.destroy_window(window);
                info!(?window, "Message pump stopped");
            }
            Err(err) => {
                error!(error = %err, "Failed to create message window");
                let fault = PumpFault::WindowCreation(err);
                self.record_fault(fault.clone());
                let _ = ready.send(Err(fault));
            }
        }

        self.stopped.store(true, Ordering::SeqCst);
        self.reject_pending();
        gateway::unregister(self.token);
        let _ = exited.send(());
    }

    fn pump_loop(&self) {
        let mut failures = 0u32;
        loop {
            match self.platform.pump_message() {
                Ok(PumpStatus::Continue) => failures = 0,
                Ok(PumpStatus::Quit) => break,
                Err(err) => {
                    failures += 1;
                    warn!(error = %err, failures, "Message retrieval failed");
                    self.record_fault(PumpFault::Message(err));
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        error!("Message retrieval keeps failing; stopping pump");
                        break;
                    }
                }
            }
        }
        self.quitting.store(true, Ordering::SeqCst);
    }

    fn dispatch(&self, window: WindowId, message: &Message) -> Handled {
        let handled = match &self.handler {
            Some(handler) => handler.handle(window, message),
            None => Handled::No,
        };
        match message {
            Message::Wake => {
                self.drain_commands(window);
                Handled::Yes
            }
            Message::Destroy => {
                // Destroyed from outside the loop; make the loop end too.
                if !self.quitting.load(Ordering::SeqCst) {
                    self.platform.post_quit();
                }
                Handled::No
            }
            _ => handled,
        }
    }
}

impl<P: MessageWindowHost> MessageHandler for PumpShared<P> {
    fn handle(&self, window: WindowId, message: &Message) -> Handled {
        match catch_unwind(AssertUnwindSafe(|| self.dispatch(window, message))) {
            Ok(handled) => handled,
            Err(payload) => {
                let reason = panic_message(&*payload);
                error!(reason = %reason, ?message, "Message handler panicked");
                self.record_fault(PumpFault::HandlerPanicked(reason));
                Handled::No
            }
        }
    }
}

/// Owns the pump thread and its message-only window.
pub struct PumpHost<P: MessageWindowHost> {
    shared: Arc<PumpShared<P>>,
}

impl<P: MessageWindowHost> PumpHost<P> {
    pub fn new(platform: Arc<P>, dispose_timeout: Duration) -> Self {
        Self::build(platform, dispose_timeout, None)
    }

    /// Create a host whose window also forwards every message to `handler`
    /// before the host's own handling.
    pub fn with_handler(
        platform: Arc<P>,
        dispose_timeout: Duration,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self::build(platform, dispose_timeout, Some(handler))
    }

    fn build(
        platform: Arc<P>,
        dispose_timeout: Duration,
        handler: Option<Arc<dyn MessageHandler>>,
    ) -> Self {
        let (commands_tx, commands_rx) = unbounded();
        Self {
            shared: Arc::new(PumpShared {
                platform,
                token: WindowToken::next(),
                handler,
                dispose_timeout,
                window: OnceLock::new(),
                pump_thread: OnceLock::new(),
                commands_tx,
                commands_rx,
                wake_pending: AtomicBool::new(false),
                quitting: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                last_fault: Mutex::new(None),
                thread: Mutex::new(None),
            }),
        }
    }

    /// Spawn the pump thread and wait until its window exists.
    ///
    /// Calling it again after a successful start is a no-op.
    pub fn start(&self) -> ReceiverResult<()> {
        let mut slot = lock(&self.shared.thread);
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(ReceiverError::Disposed);
        }
        if slot.is_some() {
            return match self.shared.window.get() {
                Some(_) => Ok(()),
                None => Err(self.unavailable()),
            };
        }

        gateway::register_arc(self.shared.token, &self.shared);

        let (ready_tx, ready_rx) = bounded(1);
        let (exited_tx, exited_rx) = bounded(1);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("rawin-pump-{}", self.shared.token.into_raw()))
            .spawn(move || shared.run(ready_tx, exited_tx))
            .map_err(|err| {
                gateway::unregister(self.shared.token);
                PlatformError::Spawn(err.to_string())
            })?;
        *slot = Some(PumpThread {
            handle,
            exited: exited_rx,
        });
        drop(slot);

        match ready_rx.recv() {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(fault)) => Err(ReceiverError::WindowUnavailable(fault)),
            Err(_) => Err(self.unavailable()),
        }
    }

    fn unavailable(&self) -> ReceiverError {
        match self.last_fault() {
            Some(fault) => ReceiverError::WindowUnavailable(fault),
            None => ReceiverError::PumpStopped,
        }
    }

    /// Queue `action` to run on the pump thread with the window id.
    ///
    /// Commands queued before [`start`](Self::start) run once the window
    /// exists. Commands still pending when the pump stops resolve with
    /// [`ReceiverError::Disposed`].
    pub fn invoke<F>(&self, action: F) -> ReceiverResult<Completion>
    where
        F: FnOnce(WindowId) -> PlatformResult<()> + Send + 'static,
    {
        if self.shared.disposed.load(Ordering::SeqCst) {
            return Err(ReceiverError::Disposed);
        }
        let (done, rx) = bounded(1);
        let command = Command {
            action: Box::new(action),
            done,
        };
        self.shared
            .commands_tx
            .send(command)
            .map_err(|_| ReceiverError::Disposed)?;
        self.shared.wake();

        // Lost the race with shutdown: nobody is left to drain the queue.
        if self.shared.stopped.load(Ordering::SeqCst) {
            self.shared.reject_pending();
        }
        Ok(Completion { rx })
    }

    /// Stop the pump and wait for its thread, for at most the dispose timeout.
    ///
    /// Returns `false` if the host was already disposed. A thread that does not
    /// exit in time is abandoned.
    pub fn dispose(&self) -> bool {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let Some(pump) = lock(&self.shared.thread).take() else {
            self.shared.stopped.store(true, Ordering::SeqCst);
            self.shared.reject_pending();
            debug!("Disposed pump host that was never started");
            return true;
        };

        if let Some(window) = self.shared.window.get() {
            if let Err(err) = self.shared.platform.post_message(*window, Message::Quit) {
                warn!(error = %err, "Failed to post quit to pump window");
            }
        }

        if pump.handle.thread().id() == thread::current().id() {
            debug!("Dispose requested from the pump thread; not waiting for exit");
            return true;
        }

        match pump.exited.recv_timeout(self.shared.dispose_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if pump.handle.join().is_err() {
                    warn!("Pump thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = self.shared.dispose_timeout.as_millis() as u64,
                    "Pump thread did not exit in time; abandoning it"
                );
            }
        }
        true
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Whether the pump loop is still running.
    pub fn is_running(&self) -> bool {
        self.shared.window.get().is_some() && !self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn window(&self) -> Option<WindowId> {
        self.shared.window.get().copied()
    }

    pub fn token(&self) -> WindowToken {
        self.shared.token
    }

    /// Whether the caller is running on this host's pump thread.
    pub fn is_pump_thread(&self) -> bool {
        self.shared.pump_thread.get() == Some(&thread::current().id())
    }

    /// Most recent failure absorbed on the pump thread.
    pub fn last_fault(&self) -> Option<PumpFault> {
        lock(&self.shared.last_fault).clone()
    }

    pub fn platform(&self) -> &Arc<P> {
        &self.shared.platform
    }
}

impl<P: MessageWindowHost> Drop for PumpHost<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}
