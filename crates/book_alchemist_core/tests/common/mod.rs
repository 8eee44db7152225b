//! Test doubles for the generation controller.

#![allow(dead_code)]

use async_trait::async_trait;
use book_alchemist_core::{
    AiProvider, ApiConfig, ChatSession, ChatSessionFactory, ConversationSeed, GenerationController,
    GenerationSettings, PortError, PortResult, Project, ProjectStore, Sleeper,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Scripted chat session
//=========================================================================================

pub type Step = Box<dyn FnOnce() -> PortResult<String> + Send>;

pub fn reply(text: &str) -> Step {
    let text = text.to_string();
    Box::new(move || Ok(text))
}

pub fn fail(error: PortError) -> Step {
    Box::new(move || Err(error))
}

pub fn rate_limited() -> Step {
    fail(PortError::RateLimited {
        provider: "Gemini".into(),
        message: "RESOURCE_EXHAUSTED".into(),
    })
}

pub fn transport_error() -> Step {
    fail(PortError::Transport("connection reset".into()))
}

/// Shared between the factory and every session it opens.
#[derive(Clone, Default)]
pub struct Script {
    steps: Arc<Mutex<VecDeque<Step>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl Script {
    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub fn extend(&self, steps: impl IntoIterator<Item = Step>) {
        self.steps.lock().unwrap().extend(steps);
    }

    /// Every message sent so far, across sessions.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn requests(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

struct ScriptedSession {
    script: Script,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send_message(&mut self, message: &str) -> PortResult<String> {
        self.script.sent.lock().unwrap().push(message.to_string());
        // Stay pending for one poll so overlapping calls can be observed.
        tokio::task::yield_now().await;
        let step = self.script.steps.lock().unwrap().pop_front();
        match step {
            Some(step) => step(),
            None => Ok(String::new()),
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedFactory {
    pub script: Script,
    opened: Arc<Mutex<Vec<ConversationSeed>>>,
}

impl ScriptedFactory {
    pub fn opened(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

impl ChatSessionFactory for ScriptedFactory {
    fn open(&self, _config: &ApiConfig, seed: ConversationSeed) -> PortResult<Box<dyn ChatSession>> {
        self.opened.lock().unwrap().push(seed);
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
        }))
    }
}

//=========================================================================================
// In-memory store
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Reset,
    Append(Vec<String>),
    Step(u8),
}

#[derive(Default)]
struct StoreState {
    projects: Vec<Project>,
    active: Option<Uuid>,
    config: Option<ApiConfig>,
    events: Vec<StoreEvent>,
    failing_writes: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    /// A store with one active project and a configured backend.
    pub fn with_active_project() -> (Self, Uuid) {
        let store = Self::default();
        let project = Project::new();
        let id = project.id;
        {
            let mut state = store.state.lock().unwrap();
            state.projects.push(project);
            state.active = Some(id);
            state.config = Some(ApiConfig {
                provider: AiProvider::Gemini,
                key: "test-key".into(),
            });
        }
        (store, id)
    }

    pub fn pages(&self, id: Uuid) -> Vec<String> {
        self.project(id).pages
    }

    pub fn project(&self, id: Uuid) -> Project {
        let state = self.state.lock().unwrap();
        state.projects.iter().find(|p| p.id == id).cloned().unwrap()
    }

    pub fn set_pages(&self, id: Uuid, pages: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let project = state.projects.iter_mut().find(|p| p.id == id).unwrap();
        project.pages = pages.iter().map(|p| p.to_string()).collect();
    }

    pub fn deactivate(&self) {
        self.state.lock().unwrap().active = None;
    }

    pub fn clear_config(&self) {
        self.state.lock().unwrap().config = None;
    }

    /// Every later page or step write fails with a storage error.
    pub fn fail_writes(&self) {
        self.state.lock().unwrap().failing_writes = true;
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.state.lock().unwrap().events.clone()
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn active_project(&self) -> PortResult<Option<Project>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .active
            .and_then(|id| state.projects.iter().find(|p| p.id == id).cloned()))
    }

    async fn api_config(&self) -> PortResult<Option<ApiConfig>> {
        Ok(self.state.lock().unwrap().config.clone())
    }

    async fn reset_pages(&self, project_id: Uuid) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_writes {
            return Err(PortError::Storage("disk full".into()));
        }
        state.events.push(StoreEvent::Reset);
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| PortError::NotFound(project_id.to_string()))?;
        project.pages = Vec::new();
        Ok(())
    }

    async fn append_pages(&self, project_id: Uuid, pages: &[String]) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_writes {
            return Err(PortError::Storage("disk full".into()));
        }
        state.events.push(StoreEvent::Append(pages.to_vec()));
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| PortError::NotFound(project_id.to_string()))?;
        project.pages = project.pages.iter().chain(pages).cloned().collect();
        Ok(())
    }

    async fn set_step(&self, project_id: Uuid, step: u8) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_writes {
            return Err(PortError::Storage("disk full".into()));
        }
        state.events.push(StoreEvent::Step(step));
        let project = state
            .projects
            .iter_mut()
            .find(|p| p.id == project_id)
            .ok_or_else(|| PortError::NotFound(project_id.to_string()))?;
        project.current_step = step;
        Ok(())
    }
}

//=========================================================================================
// Recording sleeper
//=========================================================================================

#[derive(Clone, Default)]
pub struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

//=========================================================================================
// Harness
//=========================================================================================

pub struct Harness {
    pub controller: GenerationController,
    pub store: MemoryStore,
    pub factory: ScriptedFactory,
    pub sleeper: RecordingSleeper,
    pub project_id: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(GenerationSettings::default())
    }

    pub fn with_settings(settings: GenerationSettings) -> Self {
        let (store, project_id) = MemoryStore::with_active_project();
        let factory = ScriptedFactory::default();
        let sleeper = RecordingSleeper::default();
        let controller = GenerationController::new(
            Arc::new(store.clone()),
            Arc::new(factory.clone()),
            Arc::new(sleeper.clone()),
            settings,
        );
        Self {
            controller,
            store,
            factory,
            sleeper,
            project_id,
        }
    }

    pub fn script(&self, steps: impl IntoIterator<Item = Step>) {
        self.factory.script.extend(steps);
    }

    pub fn requests(&self) -> usize {
        self.factory.script.requests()
    }

    pub fn pages(&self) -> Vec<String> {
        self.store.pages(self.project_id)
    }
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
