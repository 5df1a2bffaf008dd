//! The surface a canvas UI drives: AI review of the live diagram and the collaboration session.

use log::{info, warn};

use tessera_core::{Settings, SharedModel};
use tessera_suggest::{
    analyze, execute, validate, ChangePreview, ExecutionReport, LlmClient, LlmEngine,
    MutationCommand, ParsedResponse, TextPreview,
};
use tessera_sync::{CollaborationSync, ConnectionStatus, HttpTransport, MergeReport, SyncConfig, SyncTransport};

use crate::EditorError;

/// Where the AI review currently stands.
///
/// Any error returns the flow to `Idle`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AnalysisFlow {
    #[default]
    Idle,
    Analyzing,
    Previewing(ParsedResponse),
    Applying,
}

impl AnalysisFlow {
    pub fn pending(&self) -> Option<&ParsedResponse> {
        match self {
            AnalysisFlow::Previewing(parsed) => Some(parsed),
            _ => None,
        }
    }
}

pub struct Editor<C, T, P = TextPreview> {
    model: SharedModel,
    client: C,
    sync: CollaborationSync<T>,
    preview: P,
    flow: AnalysisFlow,
}

impl<C: LlmClient, T: SyncTransport> Editor<C, T, TextPreview> {
    pub fn new(model: SharedModel, client: C, transport: T, sync_config: SyncConfig) -> Self {
        Self {
            sync: CollaborationSync::new(model.clone(), transport, sync_config),
            model,
            client,
            preview: TextPreview::default(),
            flow: AnalysisFlow::Idle,
        }
    }
}

impl Editor<LlmEngine, HttpTransport, TextPreview> {
    /// Wire up the real AI engine and HTTP sync from stored settings. Collaboration starts
    /// immediately when a session token and an endpoint are configured.
    pub fn from_settings(model: SharedModel, settings: &Settings) -> Result<Self, EditorError> {
        let config = SyncConfig::from(&settings.sync);
        let transport = HttpTransport::new(settings.sync.endpoint.clone(), config.request_timeout)?;
        let editor = Self::new(model, LlmEngine::new(settings.ai.clone()), transport, config);

        if let Some(token) = settings.sync.session_token.as_deref().filter(|t| !t.trim().is_empty()) {
            if settings.sync.endpoint.is_empty() {
                warn!("session token set but no sync endpoint; collaboration stays off");
            } else {
                let user_id = settings.sync.user_id.as_deref().unwrap_or("local");
                editor.start_collaboration(token, user_id)?;
            }
        }
        Ok(editor)
    }
}

impl<C: LlmClient, T: SyncTransport, P: ChangePreview> Editor<C, T, P> {
    pub fn with_preview<Q: ChangePreview>(self, preview: Q) -> Editor<C, T, Q> {
        Editor {
            model: self.model,
            client: self.client,
            sync: self.sync,
            preview,
            flow: self.flow,
        }
    }

    pub fn model(&self) -> &SharedModel {
        &self.model
    }

    pub fn preview(&self) -> &P {
        &self.preview
    }

    pub fn flow(&self) -> &AnalysisFlow {
        &self.flow
    }

    /// Ask the AI to review the current diagram and stage its proposals for preview.
    ///
    /// The model is read from a snapshot, so edits and sync ticks carry on while the request is
    /// out. Nothing is applied.
    pub async fn analyze_diagram(&mut self, context: &str) -> Result<ParsedResponse, EditorError> {
        self.preview.clear();
        self.flow = AnalysisFlow::Analyzing;

        let snapshot = self.model.with(|m| m.snapshot());
        match analyze(&self.client, &snapshot, context).await {
            Ok(parsed) => {
                self.preview.show(&parsed.changes);
                self.flow = AnalysisFlow::Previewing(parsed.clone());
                Ok(parsed)
            }
            Err(err) => {
                warn!(error = err.to_string(); "analysis failed");
                self.flow = AnalysisFlow::Idle;
                Err(err.into())
            }
        }
    }

    /// Apply the staged proposals.
    pub async fn apply_pending(&mut self) -> Result<ExecutionReport, EditorError> {
        let changes = match &self.flow {
            AnalysisFlow::Previewing(parsed) => parsed.changes.clone(),
            _ => return Err(EditorError::NothingPending),
        };
        Ok(self.apply_changes(&changes).await)
    }

    /// Apply the given commands.
    ///
    /// They are checked again against the diagram as it is now, since collaborators may have
    /// edited it since the preview was built.
    pub async fn apply_changes(&mut self, changes: &[MutationCommand]) -> ExecutionReport {
        self.flow = AnalysisFlow::Applying;
        let still_valid = self.model.with(|m| validate(changes, m));
        if still_valid.len() < changes.len() {
            info!(
                proposed = changes.len(),
                still_valid = still_valid.len();
                "some changes no longer apply"
            );
        }
        let report = execute(&still_valid, &self.model).await;
        self.preview.clear();
        self.flow = AnalysisFlow::Idle;
        report
    }

    pub fn discard_pending(&mut self) {
        self.preview.clear();
        self.flow = AnalysisFlow::Idle;
    }

    pub fn start_collaboration(&self, session_token: &str, user_id: &str) -> Result<(), EditorError> {
        Ok(self.sync.start(session_token, user_id)?)
    }

    pub fn stop_collaboration(&self) {
        self.sync.stop();
    }

    pub async fn sync_now(&self) -> Result<MergeReport, EditorError> {
        Ok(self.sync.sync_now().await?)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.sync.status()
    }
}
