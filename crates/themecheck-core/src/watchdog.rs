//! Time limits for check invocations.
//!
//! A check runs on the analysis thread and cannot be preempted. The
//! [`Watchdog`] thread trips a [`CancelToken`] once an invocation exceeds its
//! budget; the dispatcher turns a tripped token into a timeout when the
//! check returns. A check that does not return within a grace period after
//! that is considered hung and the [`HangPolicy`] runs on the watchdog
//! thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::error::BugReport;

/// Shared flag telling a check (or the analyzer) to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an untripped token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once the token has been tripped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Token polled by the analyzer between files.
pub type AnalysisCancel = CancelToken;

/// What to do with a check that ignores its deadline.
#[derive(Clone)]
pub struct HangPolicy(Arc<dyn Fn(&BugReport) + Send + Sync>);

impl HangPolicy {
    /// Wraps a closure.
    pub fn new(f: impl Fn(&BugReport) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Prints the bug report to stderr and exits with status 2.
    #[must_use]
    pub fn abort() -> Self {
        Self::new(|report| {
            eprintln!("{}", report.render());
            std::process::exit(2);
        })
    }

    fn run(&self, report: &BugReport) {
        (self.0)(report);
    }
}

impl Default for HangPolicy {
    fn default() -> Self {
        Self::abort()
    }
}

impl std::fmt::Debug for HangPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HangPolicy(..)")
    }
}

/// The invocation being timed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Name of the check.
    pub check: &'static str,
    /// Event name.
    pub event: String,
    /// File being analyzed.
    pub file: Option<PathBuf>,
}

#[derive(Debug)]
struct Armed {
    invocation: Invocation,
    deadline: Instant,
    tripped: bool,
}

#[derive(Debug, Default)]
struct State {
    armed: Option<Armed>,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Enforces a ceiling on every armed invocation.
#[derive(Debug)]
pub struct Watchdog {
    shared: Arc<Shared>,
    token: CancelToken,
    grace: Duration,
    policy: HangPolicy,
    thread: Option<JoinHandle<()>>,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(HangPolicy::default())
    }
}

impl Watchdog {
    /// Grace period between tripping the token and running the hang policy.
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

    /// Creates a watchdog. Its thread starts on first use.
    #[must_use]
    pub fn new(policy: HangPolicy) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            token: CancelToken::new(),
            grace: Self::DEFAULT_GRACE,
            policy,
            thread: None,
        }
    }

    /// Sets the grace period.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Token tripped when the armed invocation runs out of time.
    #[must_use]
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Starts timing `invocation`.
    pub fn arm(&mut self, timeout: Duration, invocation: Invocation) {
        self.ensure_thread();
        self.token.reset();
        let mut state = self.shared.lock();
        state.armed = Some(Armed {
            invocation,
            deadline: Instant::now() + timeout,
            tripped: false,
        });
        drop(state);
        self.shared.wake.notify_all();
    }

    /// Stops timing. Returns true if the deadline passed.
    pub fn disarm(&mut self) -> bool {
        let mut state = self.shared.lock();
        state.armed = None;
        drop(state);
        self.shared.wake.notify_all();
        self.token.is_cancelled()
    }

    fn ensure_thread(&mut self) {
        if self.thread.is_some() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let token = self.token.clone();
        let grace = self.grace;
        let policy = self.policy.clone();
        let spawned = std::thread::Builder::new()
            .name("themecheck-watchdog".into())
            .spawn(move || watch(&shared, &token, grace, &policy));
        match spawned {
            Ok(handle) => self.thread = Some(handle),
            Err(e) => error!("failed to start watchdog thread: {e}"),
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn watch(shared: &Shared, token: &CancelToken, grace: Duration, policy: &HangPolicy) {
    let mut state = shared.lock();
    loop {
        if state.shutdown {
            return;
        }
        let now = Instant::now();
        let Some(armed) = state.armed.as_mut() else {
            state = shared.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
            continue;
        };
        if now < armed.deadline {
            let wait = armed.deadline - now;
            state = shared
                .wake
                .wait_timeout(state, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            continue;
        }
        if !armed.tripped {
            debug!(check = armed.invocation.check, event = %armed.invocation.event, "deadline passed");
            token.cancel();
            armed.tripped = true;
            armed.deadline = now + grace;
            continue;
        }
        let invocation = armed.invocation.clone();
        state.armed = None;
        drop(state);
        let report = BugReport {
            check: Some(invocation.check.to_string()),
            event: Some(invocation.event),
            file: invocation.file,
            message: format!("check did not return within the grace period of {grace:?} after its deadline"),
            backtrace: Some("unavailable: the check is still running on the analysis thread".into()),
            ..BugReport::default()
        };
        policy.run(&report);
        state = shared.lock();
    }
}
