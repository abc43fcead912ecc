use crate::config::Config;
use crate::models::Document;
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;

use assessment_client::{AssessmentService, HttpAssessmentClient};
use upload_gate::UploadGate;
use workspace::Workspace;

pub struct AppState {
    pub config: Config,
    pub service: Arc<dyn AssessmentService>,
    pub upload_gate: UploadGate,
    workspace: RwLock<Option<Arc<Workspace>>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.assessment.request_timeout_secs);
        let client = HttpAssessmentClient::new(&config.assessment.base_url, timeout)?;

        tracing::info!(
            "Assessment service at {} (timeout {}s, identity {})",
            config.assessment.base_url,
            config.assessment.request_timeout_secs,
            config.assessment.identity
        );

        Ok(Self::with_service(config, Arc::new(client)))
    }

    /// State backed by an arbitrary assessment service implementation.
    pub fn with_service(config: Config, service: Arc<dyn AssessmentService>) -> Self {
        let upload_gate = UploadGate::new(config.upload.clone(), service.clone());
        Self {
            config,
            service,
            upload_gate,
            workspace: RwLock::new(None),
        }
    }

    pub async fn workspace(&self) -> Option<Arc<Workspace>> {
        self.workspace.read().await.clone()
    }

    /// Opens a workspace for a freshly accepted document, discarding the
    /// previous one.
    pub async fn open_workspace(&self, document: Document) -> Arc<Workspace> {
        let workspace = Arc::new(Workspace::new(&self.config, self.service.clone(), document));
        let previous = self.workspace.write().await.replace(workspace.clone());
        if let Some(previous) = previous {
            tracing::info!("Replacing workspace for {}", previous.document.name);
        }
        workspace
    }

    /// Start over. Returns false when there was nothing to discard.
    pub async fn close_workspace(&self) -> bool {
        let previous = self.workspace.write().await.take();
        match previous {
            Some(previous) => {
                tracing::info!("Discarded workspace for {}", previous.document.name);
                true
            }
            None => false,
        }
    }
}

pub mod assessment_client;
pub mod chat_session;
pub mod evaluation;
pub mod flashcard_session;
pub mod quiz_session;
pub mod upload_gate;
pub mod workspace;
