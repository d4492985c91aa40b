//! Process termination with native signal semantics.

use tracing::error;

/// Termination requests the guard listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum TermSignal {
    /// SIGINT, usually Ctrl-C
    #[strum(serialize = "SIGINT")]
    Interrupt,
    /// SIGTERM, usually a supervisor
    #[strum(serialize = "SIGTERM")]
    Terminate,
}

impl TermSignal {
    /// Native signal number.
    pub fn signo(&self) -> i32 {
        match self {
            TermSignal::Interrupt => libc::SIGINT,
            TermSignal::Terminate => libc::SIGTERM,
        }
    }

    /// Shell convention for a process killed by this signal.
    pub fn exit_code(&self) -> i32 {
        128 + self.signo()
    }
}

/// Ends the process on behalf of a pending signal.
pub trait Terminate: Send + Sync + std::fmt::Debug {
    /// Terminate with the semantics of `signal`. Production implementations do not return.
    fn terminate(&self, signal: TermSignal);
}

/// Restores the default disposition and re-raises the signal.
///
/// Supervisors and shell job control then observe the process as killed by
/// the original signal rather than as a generic failure. If the signal is
/// somehow survived, exits with `128 + signo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTerminator;

impl Terminate for ProcessTerminator {
    fn terminate(&self, signal: TermSignal) {
        error!(signal = %signal, "Terminating");
        raise_default(signal.signo());
        std::process::exit(signal.exit_code());
    }
}

#[allow(unsafe_code)]
fn raise_default(signo: libc::c_int) {
    // SAFETY: resetting to SIG_DFL installs no Rust code as a handler, and
    // raise only delivers the signal to the calling thread.
    unsafe {
        libc::signal(signo, libc::SIG_DFL);
        libc::raise(signo);
    }
}
