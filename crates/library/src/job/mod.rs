//! Single-flight background scanning.
//!
//! A [`ScanJobController`] owns at most one running reconciliation pass. The
//! pass runs on its own Tokio task and is the only writer of the job's
//! [`ScanStatus`]; everyone else reads snapshots. Starting a pass while one
//! is running is a no-op, and whatever way a pass ends (success, fatal error,
//! cancellation or a panic) the job returns to idle with a final message.

mod status;

pub use self::status::{ScanStarted, ScanStatus};

use self::status::Outcome;
use crate::Context;
use crate::reconcile::error::ErrorKind as ReconcileErrorKind;
use crate::reconcile::{ReconcileEvent, ScanMode, reconcile_events};
use futures::{FutureExt, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::UtcDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toonshelf_catalog::Repository;

#[derive(Default)]
struct JobState {
    status: ScanStatus,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    ctx: Context,
    catalog: Repository,
    state: Mutex<JobState>,
    /// Parent of every pass's token; once cancelled no new pass may start.
    shutdown: CancellationToken,
}
impl Shared {
    fn lock(&self) -> MutexGuard<'_, JobState> {
        // The state is plain data and every write leaves it consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut ScanStatus)) {
        f(&mut self.lock().status);
    }
}

/// Runs reconciliation passes in the background, one at a time.
///
/// Cloning is cheap; clones control the same job.
///
/// # Examples
///
/// ```no_run
/// use toonshelf_catalog::{Database, Repository};
/// use toonshelf_library::{Context, ScanJobController, ScanMode};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::connect("catalog.db").await?;
/// let jobs = ScanJobController::new(Context::new("/srv/comics"), Repository::from(&db));
/// if jobs.start(ScanMode::Regular).started {
///     jobs.join().await;
/// }
/// println!("{}", jobs.status().message);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ScanJobController {
    shared: Arc<Shared>,
}
impl ScanJobController {
    pub fn new(ctx: Context, catalog: Repository) -> Self {
        Self {
            shared: Arc::new(Shared {
                ctx,
                catalog,
                state: Mutex::new(JobState::default()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Start a pass unless one is already running.
    ///
    /// Returns immediately. Must be called from within a Tokio runtime.
    pub fn start(&self, mode: ScanMode) -> ScanStarted {
        let mut state = self.shared.lock();
        if state.status.running {
            return ScanStarted { started: false, mode: state.status.mode.unwrap_or(mode) };
        }
        if self.shared.shutdown.is_cancelled() {
            tracing::debug!(%mode, "Not starting a scan after shutdown");
            return ScanStarted { started: false, mode };
        }

        state.status = ScanStatus::starting(mode, now());
        let cancel = self.shared.shutdown.child_token();
        // The new task blocks on the lock we still hold, so it cannot finish
        // before its handle is stored.
        state.handle = Some(tokio::spawn(run(Arc::clone(&self.shared), mode, cancel.clone())));
        state.cancel = Some(cancel);
        tracing::info!(%mode, "Scan started");
        ScanStarted { started: true, mode }
    }

    /// Snapshot of the current or most recent pass.
    pub fn status(&self) -> ScanStatus {
        self.shared.lock().status.clone()
    }

    /// Cancel the running pass, if any, and wait for it to wind down.
    pub async fn stop(&self) {
        let (cancel, handle) = {
            let mut state = self.shared.lock();
            (state.cancel.take(), state.handle.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        wait(handle).await;
    }

    /// Wait for the running pass, if any, to finish.
    ///
    /// Only one caller waits on a given pass; a concurrent second call
    /// returns immediately.
    pub async fn join(&self) {
        let handle = self.shared.lock().handle.take();
        wait(handle).await;
    }

    /// Cancel the running pass and refuse to start any more.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.join().await;
    }
}

async fn wait(handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else {
        return;
    };
    if let Err(err) = handle.await {
        tracing::error!(error = %err, "Scan task did not finish cleanly");
    }
}

fn now() -> i64 {
    UtcDateTime::now().unix_timestamp()
}

async fn run(shared: Arc<Shared>, mode: ScanMode, cancel: CancellationToken) {
    let outcome = AssertUnwindSafe(drive(&shared, mode, &cancel))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Outcome::Failed(panic_message(panic.as_ref())));
    tracing::info!(%mode, message = %outcome.message(), "Scan finished");
    shared.update(|status| status.finish(&outcome, now()));
}

/// Feed reconciliation events into the shared status and decide how the
/// pass ended.
async fn drive(shared: &Shared, mode: ScanMode, cancel: &CancellationToken) -> Outcome {
    let events = reconcile_events(&shared.ctx, &shared.catalog, mode, cancel);
    futures::pin_mut!(events);
    let mut outcome = Outcome::Failed("scan ended without completing".to_string());
    while let Some(event) = events.next().await {
        match event {
            Ok(ReconcileEvent::DiscoveryComplete(total)) => shared.update(|status| status.total = total),
            Ok(ReconcileEvent::TitleStarted { name }) => {
                shared.update(|status| status.message = format!("Indexing title: {name}"));
            },
            Ok(ReconcileEvent::TitleReconciled(_)) => shared.update(ScanStatus::title_done),
            Ok(ReconcileEvent::Cancelled) => outcome = Outcome::Cancelled,
            Ok(ReconcileEvent::Complete(_)) => outcome = Outcome::Complete,
            Ok(ReconcileEvent::Started { .. } | ReconcileEvent::TitleUnavailable { .. }) => {},
            Err(err) => {
                shared.update(|status| status.errors += 1);
                match &*err {
                    ReconcileErrorKind::RootNotFound(root) => {
                        tracing::error!(root = %root.display(), "Library root not found");
                        outcome = Outcome::NotFound;
                    },
                    kind if kind.is_fatal() => {
                        tracing::error!(error = ?err, "Scan cannot continue");
                        outcome = Outcome::Failed(kind.to_string());
                    },
                    _ => {},
                }
            },
        }
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "scan task panicked".to_string()
}
