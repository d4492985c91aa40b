//! Two-phase handling of termination signals.
//!
//! The first signal cancels the root token so batch drivers stop admitting
//! work and in-flight items wind down at their next suspension point. Writes
//! run inside critical sections that a signal cannot interrupt; once the last
//! open section closes, a pending signal terminates the process with its
//! native semantics.

use crate::{TermSignal, Terminate};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use steadfast_error::{GuardError, GuardErrorKind};
use steadfast_rate_limit::GuardSettings;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Default)]
struct CancellationState {
    pending_signal: Option<TermSignal>,
    depth: usize,
    entered_at: Option<Instant>,
}

/// Defers termination until in-progress writes complete.
///
/// # Example
///
/// ```rust,ignore
/// let guard = CancellationGuard::install(config.guard)?;
/// let cancel = guard.token().child_token();
///
/// // ... run work observing `cancel` ...
/// let written = guard.protect(store.save(&slug, &record)).await?;
///
/// guard.honor_pending();
/// ```
#[derive(Debug)]
pub struct CancellationGuard {
    token: CancellationToken,
    state: Mutex<CancellationState>,
    terminator: Arc<dyn Terminate>,
    max_critical_wait: Duration,
}

impl CancellationGuard {
    /// Subscribe to SIGINT and SIGTERM and return the shared guard.
    ///
    /// The listener task is the only component that cancels the root token.
    ///
    /// # Errors
    ///
    /// Returns a `GuardError` if called outside a Tokio runtime or if the OS
    /// refuses the signal subscription.
    #[instrument(skip(settings))]
    pub fn install(settings: GuardSettings) -> Result<Arc<Self>, GuardError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| GuardError::new(GuardErrorKind::NoRuntime))?;
        let guard = Self::detached(settings, Arc::new(crate::ProcessTerminator));
        let listener = SignalListener::subscribe()?;
        handle.spawn(listener.run(Arc::downgrade(&guard)));
        debug!(
            max_critical_wait_ms = settings.max_critical_wait_ms,
            "Installed cancellation guard"
        );
        Ok(guard)
    }

    /// Build a guard without subscribing to OS signals.
    ///
    /// Signals are then fed in through [`CancellationGuard::deliver`].
    pub fn detached(settings: GuardSettings, terminator: Arc<dyn Terminate>) -> Arc<Self> {
        Arc::new(Self {
            token: CancellationToken::new(),
            state: Mutex::new(CancellationState::default()),
            terminator,
            max_critical_wait: settings.max_critical_wait(),
        })
    }

    /// Root cancellation token. Batch drivers should use child tokens.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once a termination signal has been received.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The first signal received, if any.
    pub fn pending_signal(&self) -> Option<TermSignal> {
        self.lock().pending_signal
    }

    /// True while at least one write is in progress.
    pub fn inside_critical_section(&self) -> bool {
        self.lock().depth > 0
    }

    fn lock(&self) -> MutexGuard<'_, CancellationState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Report a received signal.
    ///
    /// - First signal: recorded and the root token cancelled
    /// - Repeated signal outside a write: terminate with the first signal
    /// - Repeated signal during a write: deferred, unless the write has been
    ///   open longer than `max_critical_wait`
    pub fn deliver(&self, signal: TermSignal) {
        let mut state = self.lock();
        let Some(original) = state.pending_signal else {
            state.pending_signal = Some(signal);
            drop(state);
            info!(signal = %signal, "Received termination request, finishing in-flight work");
            self.token.cancel();
            return;
        };

        let stuck = match state.entered_at {
            None => true,
            Some(entered) => entered.elapsed() > self.max_critical_wait,
        };
        let depth = state.depth;
        drop(state);

        if stuck {
            warn!(signal = %signal, original = %original, depth, "Repeated termination request");
            self.terminator.terminate(original);
        } else {
            warn!(
                signal = %signal,
                depth,
                "Repeated termination request deferred until the current write completes"
            );
        }
    }

    /// Run a write inside a critical section.
    ///
    /// The section closes when `write` finishes, fails or panics. If it was
    /// the last open section and a signal is pending, the process terminates
    /// before this returns.
    pub async fn protect<F, T>(&self, write: F) -> T
    where
        F: Future<Output = T>,
    {
        let _section = self.enter();
        write.await
    }

    /// Open a critical section by hand.
    pub fn enter(&self) -> CriticalSection<'_> {
        let mut state = self.lock();
        if state.depth == 0 {
            state.entered_at = Some(Instant::now());
        }
        state.depth += 1;
        CriticalSection { guard: self }
    }

    fn leave(&self) {
        let mut state = self.lock();
        state.depth = state.depth.saturating_sub(1);
        if state.depth > 0 {
            return;
        }
        state.entered_at = None;
        let pending = state.pending_signal;
        drop(state);

        if let Some(signal) = pending {
            info!(signal = %signal, "Write complete, honoring termination request");
            self.terminator.terminate(signal);
        }
    }

    /// Terminate now if a signal is pending.
    ///
    /// Called by the command layer once a batch has drained and its summary
    /// has been logged.
    pub fn honor_pending(&self) {
        if let Some(signal) = self.pending_signal() {
            self.terminator.terminate(signal);
        }
    }
}

/// An open critical section. Closes on drop.
#[derive(Debug)]
#[must_use = "the section closes as soon as this is dropped"]
pub struct CriticalSection<'a> {
    guard: &'a CancellationGuard,
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        self.guard.leave();
    }
}

#[cfg(unix)]
struct SignalListener {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    fn subscribe() -> Result<Self, GuardError> {
        use tokio::signal::unix::{SignalKind, signal};

        let listen = |kind: SignalKind, name: TermSignal| {
            signal(kind).map_err(|e| {
                GuardError::new(GuardErrorKind::SignalInstall {
                    signal: name.to_string(),
                    reason: e.to_string(),
                })
            })
        };
        Ok(Self {
            interrupt: listen(SignalKind::interrupt(), TermSignal::Interrupt)?,
            terminate: listen(SignalKind::terminate(), TermSignal::Terminate)?,
        })
    }

    async fn run(mut self, guard: Weak<CancellationGuard>) {
        loop {
            let signal = tokio::select! {
                Some(()) = self.interrupt.recv() => TermSignal::Interrupt,
                Some(()) = self.terminate.recv() => TermSignal::Terminate,
                else => break,
            };
            match guard.upgrade() {
                Some(guard) => guard.deliver(signal),
                None => break,
            }
        }
        debug!("Signal listener stopped");
    }
}

#[cfg(not(unix))]
struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    fn subscribe() -> Result<Self, GuardError> {
        Ok(Self)
    }

    async fn run(self, guard: Weak<CancellationGuard>) {
        while tokio::signal::ctrl_c().await.is_ok() {
            match guard.upgrade() {
                Some(guard) => guard.deliver(TermSignal::Interrupt),
                None => break,
            }
        }
        debug!("Signal listener stopped");
    }
}
