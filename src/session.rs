//! Project session: the single-writer owner of conversation history, step
//! sequence, and the authoritative project tree.
//!
//! One session exists per process. All mutation happens under one lock, which
//! also serializes the prompt → parse → merge → sync workflow: a follow-up
//! submitted while a request is running simply queues behind it. The core
//! parser/planner return immutable values; status transitions are applied
//! here as an overlay, never inside the core.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::artifact::{extract, plan, Step, StepStatus};
use crate::llm::{ChatMessage, TemplateKind, TextGenerator};
use crate::sandbox::SyncController;
use crate::tree::{build_from_markup, merge, ProjectTree};

/// Read-only view of the session for display layers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct SessionState {
    /// Append-only, causally ordered by submission
    conversation: Vec<ChatMessage>,
    /// Growing across turns; never deleted
    steps: Vec<Step>,
    /// Authoritative file-content truth
    tree: ProjectTree,
    /// Set once the initial generation finished; gates the first mount
    files_loaded: bool,
    intro: Option<String>,
    outro: Option<String>,
    error: Option<String>,
    template: Option<TemplateKind>,
    started_at: Option<DateTime<Utc>>,
}

pub struct ProjectSession {
    generator: Arc<dyn TextGenerator>,
    controller: Arc<SyncController>,
    state: Mutex<SessionState>,
}

impl ProjectSession {
    pub fn new(generator: Arc<dyn TextGenerator>, controller: Arc<SyncController>) -> Self {
        Self {
            generator,
            controller,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Start (or regenerate) the project from a prompt.
    ///
    /// Fetches the starter template, seeds the tree and conversation with it,
    /// sends the whole thing to the model, and folds the response into steps
    /// and files before handing the tree to the sync controller.
    pub async fn create(&self, prompt: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        state.error = None;
        state.started_at = Some(Utc::now());

        let batch_start = state.steps.len();
        state.steps.push(analysis_step());

        let template = match self.generator.fetch_template(prompt).await {
            Ok(template) => template,
            Err(e) => return Self::fail(&mut state, batch_start, e.to_string()),
        };
        state.template = Some(template.kind);
        tracing::info!("Template selected: {:?}", template.kind);

        // Starter files exist before any model-authored ones.
        let starter = build_from_markup(&template.starter);
        state.tree = merge(&state.tree, &starter);

        for p in &template.prompts {
            state.conversation.push(ChatMessage::user(p.clone()));
        }
        state.conversation.push(ChatMessage::user(prompt));

        let content = match self.generator.generate(&state.conversation, None).await {
            Ok(content) => content,
            Err(e) => return Self::fail(&mut state, batch_start, e.to_string()),
        };
        state.conversation.push(ChatMessage::assistant(content.clone()));
        state.steps[batch_start].status = StepStatus::Completed;

        Self::apply_response(&mut state, &content);
        state.files_loaded = true;

        self.sync_current(&mut state, batch_start).await
    }

    /// Submit a follow-up prompt against the existing conversation.
    pub async fn follow_up(&self, prompt: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if state.conversation.is_empty() {
            anyhow::bail!("No active project; create one first");
        }
        state.error = None;

        state.conversation.push(ChatMessage::user(prompt));
        let batch_start = state.steps.len();

        let content = match self.generator.generate(&state.conversation, None).await {
            Ok(content) => content,
            Err(e) => return Self::fail(&mut state, batch_start, e.to_string()),
        };
        state.conversation.push(ChatMessage::assistant(content.clone()));

        let extraction = extract(&content);
        if !extraction.artifact_found {
            // Conversational reply: surface the text, nothing to build.
            if extraction.intro.is_some() {
                state.intro = extraction.intro;
            }
            return Ok(());
        }

        state.steps.push(follow_up_step());
        Self::apply_response(&mut state, &content);

        self.sync_current(&mut state, batch_start).await
    }

    /// Apply a status transition to one step (execution/display layers drive
    /// these; the core only ever assigns initial statuses).
    pub async fn set_step_status(
        &self,
        index: usize,
        status: StepStatus,
        error: Option<String>,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let step = state
            .steps
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("No step at index {}", index))?;
        step.status = status;
        step.error = error;
        Ok(())
    }

    /// Display snapshot: steps, messages, error, template.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            steps: state.steps.clone(),
            intro: state.intro.clone(),
            outro: state.outro.clone(),
            error: state.error.clone(),
            template: state.template,
            started_at: state.started_at,
        }
    }

    /// Current authoritative tree.
    pub async fn tree(&self) -> ProjectTree {
        self.state.lock().await.tree.clone()
    }

    /// File content lookup by path.
    pub async fn file_content(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .tree
            .file_content(path)
            .map(str::to_string)
    }

    /// Preview address of the running project, if ready.
    pub fn preview_address(&self) -> Option<String> {
        self.controller.preview_address()
    }

    /// Parse one model response into the session: record intro/outro, append
    /// the planned step batch, and merge the file batch into the tree.
    fn apply_response(state: &mut SessionState, content: &str) {
        let extraction = extract(content);
        if extraction.intro.is_some() {
            state.intro = extraction.intro.clone();
        }
        if extraction.outro.is_some() {
            state.outro = extraction.outro.clone();
        }
        if !extraction.artifact_found {
            return;
        }

        state.steps.extend(plan(&extraction));

        let batch = build_from_markup(content);
        state.tree = merge(&state.tree, &batch);
        tracing::info!(
            "Merged response batch; tree now holds {} files",
            state.tree.file_count()
        );
    }

    /// Hand the current tree to the sync controller. Mount failures are
    /// recorded on the step batch and as the session error, but the session
    /// itself survives for a manual retry.
    async fn sync_current(
        &self,
        state: &mut SessionState,
        batch_start: usize,
    ) -> anyhow::Result<()> {
        if !state.files_loaded || state.tree.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.controller.sync(state.tree.clone()).await {
            let message = format!("Failed to mount files into sandbox: {}", e);
            return Self::fail(state, batch_start, message);
        }
        Ok(())
    }

    /// Record a failure: mark the current step batch, set the session-level
    /// error string, and propagate.
    fn fail(state: &mut SessionState, batch_start: usize, message: String) -> anyhow::Result<()> {
        tracing::error!("{}", message);
        for step in state.steps.iter_mut().skip(batch_start) {
            step.status = StepStatus::Error;
            step.error = Some(message.clone());
        }
        state.error = Some(message.clone());
        Err(anyhow::anyhow!(message))
    }
}

fn analysis_step() -> Step {
    Step::marker(
        "Analyzing Requirements",
        "Processing your request...",
        StepStatus::Processing,
    )
}

fn follow_up_step() -> Step {
    Step::marker(
        "Follow-up Response",
        "Processing your follow-up request...",
        StepStatus::Completed,
    )
}
