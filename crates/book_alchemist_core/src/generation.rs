//! crates/book_alchemist_core/src/generation.rs
//!
//! The generation controller: owns the chat session of the current run, drives
//! interactive and automatic generation, and appends pages to the active project.
//!
//! Every turn within a session is strictly sequential. Results are only applied
//! while the run's project is still the active one; once the user navigates
//! away, late replies are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{ApiConfig, Project, WizardStep};
use crate::pages::{blocks_manual_fetch, ends_auto_loop, split_pages};
use crate::ports::{ChatSession, ChatSessionFactory, PortError, ProjectStore, Sleeper};
use crate::prompt::{build_seed, FIRST_TURN};
use crate::retry::{RetryDecision, RetryPolicy};

/// Shown when the first turn of an interactive run fails.
pub const FIRST_TURN_FAILED: &str = "Ein Fehler ist bei der Kommunikation mit der schöpferischen Energie aufgetreten. Bitte versuche es erneut.";

/// Shown when an automatic run stops early; the pages so far are kept.
pub const RUN_INTERRUPTED: &str = "Die Verbindung zur Quelle wurde unterbrochen. Das bisher erschaffene Werk wurde gespeichert. Du kannst es nun lesen.";

/// Shown when a manual fetch of the next page fails.
pub const FETCH_INTERRUPTED: &str = "Die Verbindung zur Quelle wurde unterbrochen. Bitte versuche es erneut.";

//=========================================================================================
// Status, Settings and Outcomes
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    Seeding,
    AwaitingFirstPage,
    InteractiveWait,
    AutoLooping,
    Completed,
    Errored,
}

/// What the surrounding application renders while generation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationStatus {
    pub phase: GenerationPhase,
    /// Pages accumulated by the automatic loop so far; 0 outside of it.
    pub progress: usize,
    pub error: Option<String>,
    pub fetching: bool,
}

impl Default for GenerationStatus {
    fn default() -> Self {
        Self {
            phase: GenerationPhase::Idle,
            progress: 0,
            error: None,
            fetching: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSettings {
    /// Pause between successful turns of the automatic loop.
    pub pacing_delay: Duration,
    /// Safety cutoff for the automatic loop.
    pub max_pages: usize,
    pub retry: RetryPolicy,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            pacing_delay: Duration::from_millis(1500),
            max_pages: 350,
            retry: RetryPolicy::default(),
        }
    }
}

/// Why an automatic run ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Sentinel,
    EmptyBatch,
    PageCap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Interactive start succeeded; the reader can show this many pages.
    Ready { pages: usize },
    /// Automatic run finished without error.
    Completed { pages: usize, reason: StopReason },
    /// Automatic run stopped on an error; the pages it produced are kept.
    Interrupted { pages: usize, message: String },
    /// Interactive start failed; nothing was kept.
    Failed { message: String },
    /// A manual fetch appended this many pages.
    Appended { pages: usize },
    /// A guard turned the call into a no-op.
    Skipped,
    /// The project stopped being active; late results were discarded.
    Abandoned,
}

/// Reasons a run is refused before it starts.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("No project is active")]
    NoActiveProject,
    #[error("No API configuration is set up")]
    MissingApiConfig,
    #[error("A generation run is already active")]
    AlreadyRunning,
    #[error(transparent)]
    Port(#[from] PortError),
}

enum RunError {
    Port(PortError),
    Abandoned,
}

impl From<PortError> for RunError {
    fn from(error: PortError) -> Self {
        RunError::Port(error)
    }
}

/// Sets a flag for as long as it lives; the flag is cleared on every exit path.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct ActiveSession {
    project_id: Uuid,
    session: Box<dyn ChatSession>,
}

//=========================================================================================
// The Controller
//=========================================================================================

pub struct GenerationController {
    store: Arc<dyn ProjectStore>,
    sessions: Arc<dyn ChatSessionFactory>,
    sleeper: Arc<dyn Sleeper>,
    settings: GenerationSettings,
    session: Mutex<Option<ActiveSession>>,
    running: AtomicBool,
    fetching: AtomicBool,
    status: watch::Sender<GenerationStatus>,
}

impl GenerationController {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        sessions: Arc<dyn ChatSessionFactory>,
        sleeper: Arc<dyn Sleeper>,
        settings: GenerationSettings,
    ) -> Self {
        let (status, _) = watch::channel(GenerationStatus::default());
        Self {
            store,
            sessions,
            sleeper,
            settings,
            session: Mutex::new(None),
            running: AtomicBool::new(false),
            fetching: AtomicBool::new(false),
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<GenerationStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> GenerationStatus {
        self.status.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether a session is available for manual continuation.
    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Drops the current session, e.g. when the user leaves the reader.
    pub async fn discard_session(&self) {
        if self.session.lock().await.take().is_some() {
            debug!("Chat session discarded.");
        }
        self.publish(|status| *status = GenerationStatus::default());
    }

    //=====================================================================================
    // Interactive Mode
    //=====================================================================================

    /// Seeds a new session, requests the cover page and stops there.
    pub async fn start_interactive(&self) -> Result<GenerationOutcome, GenerationError> {
        let _running = FlagGuard::acquire(&self.running).ok_or(GenerationError::AlreadyRunning)?;
        let (project, config) = self.preconditions().await?;
        let project_id = project.id;
        self.begin_run(project_id).await?;
        info!(%project_id, provider = %config.provider, "Interactive generation started.");

        match self.run_interactive(&project, &config).await {
            Ok((session, pages)) => {
                *self.session.lock().await = Some(ActiveSession { project_id, session });
                self.publish(|status| {
                    status.phase = GenerationPhase::InteractiveWait;
                    status.error = None;
                });
                info!(%project_id, pages, "First pages received.");
                Ok(GenerationOutcome::Ready { pages })
            }
            Err(RunError::Abandoned) => Ok(self.abandon(project_id)),
            Err(RunError::Port(e)) => {
                error!(%project_id, error = %e, "Interactive generation failed.");
                self.move_to_step(project_id, WizardStep::SUMMARY_WITH_ERROR).await;
                self.publish(|status| {
                    status.phase = GenerationPhase::Errored;
                    status.error = Some(FIRST_TURN_FAILED.to_string());
                });
                Ok(GenerationOutcome::Failed {
                    message: FIRST_TURN_FAILED.to_string(),
                })
            }
        }
    }

    async fn run_interactive(
        &self,
        project: &Project,
        config: &ApiConfig,
    ) -> Result<(Box<dyn ChatSession>, usize), RunError> {
        let mut session = self.sessions.open(config, build_seed(&project.data))?;
        self.publish(|status| status.phase = GenerationPhase::AwaitingFirstPage);

        let reply = session.send_message(FIRST_TURN).await?;
        let pages = split_pages(&reply);
        self.apply_batch(project.id, &pages).await?;
        self.checked_step(project.id, WizardStep::MOMENT_OF_CREATION).await?;
        Ok((session, pages.len()))
    }

    //=====================================================================================
    // Automatic Mode
    //=====================================================================================

    /// Seeds a new session and keeps requesting pages until the book reports
    /// completion, a turn comes back empty, or the page cap is hit.
    ///
    /// A failure mid-run keeps every page gathered so far and still lands on the
    /// post-generation screen.
    pub async fn start_automatic(&self) -> Result<GenerationOutcome, GenerationError> {
        let _running = FlagGuard::acquire(&self.running).ok_or(GenerationError::AlreadyRunning)?;
        let (project, config) = self.preconditions().await?;
        let project_id = project.id;
        self.begin_run(project_id).await?;
        info!(%project_id, provider = %config.provider, "Automatic generation started.");

        let mut session = match self.sessions.open(&config, build_seed(&project.data)) {
            Ok(session) => session,
            Err(e) => return Ok(self.interrupt(project_id, 0, e).await),
        };

        let mut total = 0;
        let result = self.run_automatic(project_id, session.as_mut(), &mut total).await;

        let outcome = match result {
            Ok(reason) => {
                *self.session.lock().await = Some(ActiveSession { project_id, session });
                self.move_to_step(project_id, WizardStep::MOMENT_OF_CREATION).await;
                self.publish(|status| {
                    status.phase = GenerationPhase::Completed;
                    status.progress = 0;
                });
                info!(%project_id, pages = total, ?reason, "Automatic generation finished.");
                GenerationOutcome::Completed { pages: total, reason }
            }
            Err(RunError::Abandoned) => self.abandon(project_id),
            Err(RunError::Port(e)) => {
                *self.session.lock().await = Some(ActiveSession { project_id, session });
                self.interrupt(project_id, total, e).await
            }
        };
        Ok(outcome)
    }

    async fn run_automatic(
        &self,
        project_id: Uuid,
        session: &mut dyn ChatSession,
        total: &mut usize,
    ) -> Result<StopReason, RunError> {
        self.publish(|status| status.phase = GenerationPhase::AwaitingFirstPage);
        let reply = session.send_message(FIRST_TURN).await?;
        let mut batch = split_pages(&reply);
        self.publish(|status| status.phase = GenerationPhase::AutoLooping);

        loop {
            let Some(last) = batch.last() else {
                return Ok(StopReason::EmptyBatch);
            };
            let finished = ends_auto_loop(last);

            self.apply_batch(project_id, &batch).await?;
            *total += batch.len();
            let progress = *total;
            self.publish(|status| status.progress = progress);
            debug!(%project_id, received = batch.len(), total = progress, "Batch appended.");

            if finished {
                return Ok(StopReason::Sentinel);
            }
            if *total >= self.settings.max_pages {
                warn!(%project_id, total = progress, "Page cap reached, stopping.");
                return Ok(StopReason::PageCap);
            }

            self.sleeper.sleep(self.settings.pacing_delay).await;
            let reply = self.send_with_retry(session).await?;
            batch = split_pages(&reply);
        }
    }

    /// Requests the next page, backing off on rate limits.
    async fn send_with_retry(&self, session: &mut dyn ChatSession) -> Result<String, PortError> {
        let mut attempt = 1;
        loop {
            match session.continue_story().await {
                Ok(reply) => return Ok(reply),
                Err(e) => match self.settings.retry.decide(attempt, &e) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(attempt, ?delay, error = %e, "Rate limit hit, retrying.");
                        self.sleeper.sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::Propagate => return Err(e),
                },
            }
        }
    }

    //=====================================================================================
    // Manual Continuation
    //=====================================================================================

    /// Requests one more page for the reader.
    ///
    /// No-op while another fetch or a run is in flight, when there is no session,
    /// or when the last stored page already reads like the end of the book.
    pub async fn fetch_next_page(&self) -> GenerationOutcome {
        if self.is_running() {
            return GenerationOutcome::Skipped;
        }
        let Some(_fetching) = FlagGuard::acquire(&self.fetching) else {
            return GenerationOutcome::Skipped;
        };

        let outcome = self.fetch_inner().await;
        self.publish(|status| status.fetching = false);
        outcome
    }

    async fn fetch_inner(&self) -> GenerationOutcome {
        let mut slot = self.session.lock().await;
        let Some(active) = slot.as_mut() else {
            return GenerationOutcome::Skipped;
        };
        let project_id = active.project_id;

        let project = match self.store.active_project().await {
            Ok(Some(project)) if project.id == project_id => project,
            Ok(_) => return GenerationOutcome::Skipped,
            Err(e) => return self.fetch_failed(project_id, e),
        };
        if project.last_page().is_some_and(blocks_manual_fetch) {
            debug!(%project_id, "Book already complete, not fetching.");
            return GenerationOutcome::Skipped;
        }

        self.publish(|status| {
            status.fetching = true;
            status.error = None;
        });

        let reply = match active.session.continue_story().await {
            Ok(reply) => reply,
            Err(e) => return self.fetch_failed(project_id, e),
        };
        let pages = split_pages(&reply);
        match self.apply_batch(project_id, &pages).await {
            Ok(()) => GenerationOutcome::Appended { pages: pages.len() },
            Err(RunError::Abandoned) => {
                info!(%project_id, "Project no longer active, fetched page discarded.");
                GenerationOutcome::Abandoned
            }
            Err(RunError::Port(e)) => self.fetch_failed(project_id, e),
        }
    }

    fn fetch_failed(&self, project_id: Uuid, e: PortError) -> GenerationOutcome {
        error!(%project_id, error = %e, "Fetching the next page failed.");
        self.publish(|status| status.error = Some(FETCH_INTERRUPTED.to_string()));
        GenerationOutcome::Failed {
            message: FETCH_INTERRUPTED.to_string(),
        }
    }

    //=====================================================================================
    // Shared Helpers
    //=====================================================================================

    async fn preconditions(&self) -> Result<(Project, ApiConfig), GenerationError> {
        let project = self
            .store
            .active_project()
            .await?
            .ok_or(GenerationError::NoActiveProject)?;
        let config = self
            .store
            .api_config()
            .await?
            .ok_or(GenerationError::MissingApiConfig)?;
        Ok((project, config))
    }

    /// Forgets the previous session and clears the project's pages.
    ///
    /// On failure the status drops back to `Idle` carrying the error.
    async fn begin_run(&self, project_id: Uuid) -> Result<(), PortError> {
        *self.session.lock().await = None;
        self.publish(|status| {
            *status = GenerationStatus {
                phase: GenerationPhase::Seeding,
                ..GenerationStatus::default()
            }
        });
        let prepared = match self.store.reset_pages(project_id).await {
            Ok(()) => self.store.set_step(project_id, WizardStep::MANIFESTING).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &prepared {
            error!(%project_id, error = %e, "Could not prepare the project for a new run.");
            self.publish(|status| {
                *status = GenerationStatus {
                    error: Some(e.to_string()),
                    ..GenerationStatus::default()
                }
            });
        }
        prepared
    }

    /// Appends one batch, provided the project is still the active one.
    async fn apply_batch(&self, project_id: Uuid, pages: &[String]) -> Result<(), RunError> {
        if !self.store.is_active(project_id).await? {
            return Err(RunError::Abandoned);
        }
        if !pages.is_empty() {
            self.store.append_pages(project_id, pages).await?;
        }
        Ok(())
    }

    async fn checked_step(&self, project_id: Uuid, step: u8) -> Result<(), RunError> {
        if !self.store.is_active(project_id).await? {
            return Err(RunError::Abandoned);
        }
        self.store.set_step(project_id, step).await?;
        Ok(())
    }

    /// Best-effort step change on the way out of a run.
    async fn move_to_step(&self, project_id: Uuid, step: u8) {
        match self.checked_step(project_id, step).await {
            Ok(()) | Err(RunError::Abandoned) => {}
            Err(RunError::Port(e)) => warn!(%project_id, step, error = %e, "Could not update the wizard step."),
        }
    }

    async fn interrupt(&self, project_id: Uuid, pages: usize, e: PortError) -> GenerationOutcome {
        error!(%project_id, pages, error = %e, "Automatic generation interrupted.");
        self.move_to_step(project_id, WizardStep::MOMENT_OF_CREATION).await;
        self.publish(|status| {
            status.phase = GenerationPhase::Errored;
            status.progress = 0;
            status.error = Some(RUN_INTERRUPTED.to_string());
        });
        GenerationOutcome::Interrupted {
            pages,
            message: RUN_INTERRUPTED.to_string(),
        }
    }

    fn abandon(&self, project_id: Uuid) -> GenerationOutcome {
        info!(%project_id, "Project no longer active, run abandoned.");
        self.publish(|status| *status = GenerationStatus::default());
        GenerationOutcome::Abandoned
    }

    fn publish(&self, update: impl FnOnce(&mut GenerationStatus)) {
        self.status.send_modify(update);
    }
}
