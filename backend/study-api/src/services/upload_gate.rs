use chrono::Utc;
use std::{path::Path, sync::Arc};

use crate::config::UploadSettings;
use crate::error::UploadError;
use crate::metrics::{track_assessment_call, UPLOADS_TOTAL};
use crate::models::Document;
use crate::services::assessment_client::AssessmentService;

const OCTET_STREAM: &str = "application/octet-stream";

/// Infers a document media type from the file extension.
pub fn media_type_for(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        _ => None,
    }
}

/// A file as received from the presentation layer.
#[derive(Debug, Clone)]
pub struct IncomingDocument {
    pub file_name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Checks type and size before anything reaches the network, then hands the
/// file to the ingestion collaborator.
#[derive(Clone)]
pub struct UploadGate {
    settings: UploadSettings,
    service: Arc<dyn AssessmentService>,
}

impl UploadGate {
    pub fn new(settings: UploadSettings, service: Arc<dyn AssessmentService>) -> Self {
        Self { settings, service }
    }

    /// Returns the effective media type of an acceptable file.
    pub fn validate(
        &self,
        file_name: &str,
        media_type: Option<&str>,
        size: u64,
    ) -> Result<String, UploadError> {
        // Drop parameters such as "; charset=utf-8"
        let declared = media_type.and_then(|raw| raw.split(';').next()).map(str::trim);
        let media_type = match declared {
            Some(declared) if !declared.is_empty() && declared != OCTET_STREAM => {
                declared.to_string()
            }
            _ => media_type_for(file_name)
                .map(str::to_string)
                .unwrap_or_else(|| OCTET_STREAM.to_string()),
        };

        if !self
            .settings
            .allowed_media_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&media_type))
        {
            return Err(UploadError::UnsupportedType { media_type });
        }

        if size > self.settings.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.settings.max_bytes,
            });
        }

        Ok(media_type)
    }

    pub async fn accept(
        &self,
        identity: &str,
        incoming: IncomingDocument,
    ) -> Result<Document, UploadError> {
        let size = incoming.bytes.len() as u64;
        let media_type =
            match self.validate(&incoming.file_name, incoming.media_type.as_deref(), size) {
                Ok(media_type) => media_type,
                Err(e) => {
                    tracing::info!("Upload of {} rejected locally: {}", incoming.file_name, e);
                    UPLOADS_TOTAL.with_label_values(&["invalid"]).inc();
                    return Err(e);
                }
            };

        tracing::info!(
            "Uploading {} ({} bytes, {}) for {}",
            incoming.file_name,
            size,
            media_type,
            identity
        );

        let result = track_assessment_call(
            "upload_document",
            self.service.upload_document(
                identity,
                incoming.bytes,
                &incoming.file_name,
                &media_type,
            ),
        )
        .await;

        match result {
            Ok(true) => {
                UPLOADS_TOTAL.with_label_values(&["accepted"]).inc();
                Ok(Document {
                    name: incoming.file_name,
                    byte_size: size,
                    media_type,
                    uploaded_at: Utc::now(),
                })
            }
            Ok(false) => {
                UPLOADS_TOTAL.with_label_values(&["rejected"]).inc();
                Err(UploadError::Rejected)
            }
            Err(e) => {
                tracing::error!("Ingestion of {} failed: {}", incoming.file_name, e);
                UPLOADS_TOTAL.with_label_values(&["failed"]).inc();
                Err(e.into())
            }
        }
    }
}
