//! One connection's question/answer handling and transcript.

use crate::generator::AnswerGenerator;
use crate::prompt::GenerationRequest;
use crate::relay::protocol::parse_inbound;
use crate::transcript::{Transcript, TranscriptEntry};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct RelaySession {
    id: String,
    generator: Arc<AnswerGenerator>,
    context: Arc<str>,
    transcript: Transcript,
}

impl RelaySession {
    pub fn new(generator: Arc<AnswerGenerator>, context: Arc<str>) -> Self {
        Self {
            id: format!("conn-{}", uuid::Uuid::new_v4()),
            generator,
            context,
            transcript: Transcript::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Handle one text frame. Returns the reply to send, or `None` when the frame carried
    /// neither question nor image (no generator call, no transcript entry).
    pub async fn handle_text(&mut self, raw: &str) -> Option<String> {
        let question = parse_inbound(raw);
        if question.is_empty() {
            log::debug!("[{}] empty message skipped", self.id);
            return None;
        }
        log::info!(
            "[{}] received question: {} (image: {})",
            self.id,
            question.text,
            if question.has_image() { "yes" } else { "no" }
        );
        self.transcript
            .push(TranscriptEntry::interviewer(question.text.clone()));

        let req = GenerationRequest {
            question: &question.text,
            context: &self.context,
            image: question.image.as_deref(),
        };
        let answer = match self.generator.generate(&req).await {
            Ok(answer) => answer,
            Err(e) => {
                log::warn!("[{}] {}", self.id, e);
                e.to_string()
            }
        };

        self.transcript
            .push(TranscriptEntry::interviewee(answer.clone()));
        Some(answer)
    }

    /// End of connection: save the transcript if it has entries. Never fails; errors are logged.
    /// The file write runs on the blocking pool.
    pub async fn finalize(self, dir: &Path) -> Option<PathBuf> {
        let RelaySession { id, transcript, .. } = self;
        let dir = dir.to_path_buf();
        let saved = tokio::task::spawn_blocking(move || transcript.save(&dir, Local::now())).await;
        match saved {
            Ok(Ok(Some(path))) => {
                log::info!("[{}] transcript saved to {}", id, path.display());
                Some(path)
            }
            Ok(Ok(None)) => {
                log::debug!("[{}] no conversation, transcript not saved", id);
                None
            }
            Ok(Err(e)) => {
                log::error!("[{}] error saving transcript: {:#}", id, e);
                None
            }
            Err(e) => {
                log::error!("[{}] transcript task failed: {}", id, e);
                None
            }
        }
    }
}
