use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use relay_core::events::{ContentEncoding, FileEvent, FileUpload};
use relay_core::records::ContextRecord;

use super::EventHandler;
use crate::bus::ResponsePublisher;
use crate::error::{ExtractionError, FileIngestError};
use crate::extract::{Extraction, TextExtractor};
use crate::store::ContextStore;

/// How processing of one file upload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Invalid,
    /// Aborted before the context record was written
    Failed,
    /// Context record written; `marked` reports the status key write
    Stored { chunks: usize, marked: bool },
}

/// File ingestion pipeline: stage the upload on disk, extract text, append it
/// to the agent's context, then set the expiring completion marker.
pub struct FilePipeline {
    extractor: Arc<dyn TextExtractor>,
    context: Arc<dyn ContextStore>,
    status: ResponsePublisher,
}

impl FilePipeline {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        context: Arc<dyn ContextStore>,
        status: ResponsePublisher,
    ) -> Self {
        Self {
            extractor,
            context,
            status,
        }
    }

    pub async fn process(&self, payload: &str) -> FileOutcome {
        let upload = match FileEvent::parse(payload) {
            Ok(upload) => upload,
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "dropping invalid file event");
                return FileOutcome::Invalid;
            }
        };

        match self.ingest(&upload).await {
            Ok(chunks) => {
                let marked = match self
                    .status
                    .mark_file_processed(&upload.agent_id, &upload.file_name)
                    .await
                {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::error!(
                            agent_id = %upload.agent_id,
                            file_name = %upload.file_name,
                            error = %err,
                            "failed to set file status key"
                        );
                        false
                    }
                };
                tracing::info!(
                    agent_id = %upload.agent_id,
                    file_name = %upload.file_name,
                    chunks,
                    "file ingested"
                );
                FileOutcome::Stored { chunks, marked }
            }
            Err(err) => {
                tracing::error!(
                    agent_id = %upload.agent_id,
                    file_name = %upload.file_name,
                    error = %err,
                    "file ingestion failed"
                );
                FileOutcome::Failed
            }
        }
    }

    /// Decodes, extracts and stores one upload. Returns the chunk count.
    async fn ingest(&self, upload: &FileUpload) -> Result<usize, FileIngestError> {
        let bytes = decode_content(upload)?;

        let extractor = self.extractor.clone();
        let file_type = upload.file_type.clone();
        let suffix = upload
            .kind()
            .map(|kind| format!(".{}", kind.extension()))
            .unwrap_or_default();

        // The staged file lives only inside this closure and is removed when
        // it returns or unwinds.
        let extraction = tokio::task::spawn_blocking(
            move || -> Result<Extraction, std::io::Error> {
                let mut staged = tempfile::Builder::new()
                    .prefix("relay-upload-")
                    .suffix(&suffix)
                    .tempfile()?;
                staged.write_all(&bytes)?;
                staged.flush()?;
                Ok(extractor.extract(staged.path(), &file_type))
            },
        )
        .await
        .unwrap_or_else(|join_err| {
            Ok(Extraction::Failed(ExtractionError::Aborted(
                join_err.to_string(),
            )))
        })?;

        match &extraction {
            Extraction::Text(_) => {}
            Extraction::Unsupported(tag) => tracing::warn!(
                agent_id = %upload.agent_id,
                file_name = %upload.file_name,
                file_type = %tag,
                "unsupported file type; storing empty content"
            ),
            Extraction::Failed(err) => tracing::warn!(
                agent_id = %upload.agent_id,
                file_name = %upload.file_name,
                error = %err,
                "text extraction failed; storing empty content"
            ),
        }
        let chunks = extraction.into_chunks();

        let record = ContextRecord {
            agent_id: upload.agent_id.clone(),
            file_name: upload.file_name.clone(),
            content: chunks.join("\n"),
            uploaded_at: Utc::now(),
        };
        self.context.append_context(&record).await?;

        Ok(chunks.len())
    }
}

fn decode_content(upload: &FileUpload) -> Result<Vec<u8>, FileIngestError> {
    match upload.encoding {
        ContentEncoding::Utf8 => Ok(upload.content.as_bytes().to_vec()),
        ContentEncoding::Base64 => Ok(STANDARD.decode(upload.content.trim())?),
    }
}

#[async_trait]
impl EventHandler for FilePipeline {
    async fn handle(&self, payload: &str) {
        let outcome = self.process(payload).await;
        tracing::debug!(?outcome, "file event processed");
    }
}
