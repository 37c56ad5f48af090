//! Fill sequencing: profile validation, detection, the service call, and
//! write-back. Stateless; every fill is one independent request/response
//! cycle and every failure is terminal for the attempt.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::client::FillClient;
use crate::error::Result;
use crate::fields::{AnswerMap, FieldDescriptor, FillRequest};
use crate::page::Page;
use crate::profile::Profile;

/// How long filled fields stay highlighted in the reference UI.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(1500);

/// The page-side half of a fill: detection and write-back.
///
/// This is the boundary the original extension crosses by injecting script
/// into the target tab; modeling it as a trait keeps the orchestrator
/// independent of how the target context executes the calls.
#[async_trait]
pub trait FormTarget {
    async fn detect_fields(&self) -> Result<Vec<FieldDescriptor>>;
    async fn write_answers(&self, answers: &AnswerMap) -> Result<Vec<String>>;
    async fn highlight(&self, ids: &[String], clear_after: Duration) -> Result<()>;
}

#[async_trait]
impl FormTarget for Page {
    async fn detect_fields(&self) -> Result<Vec<FieldDescriptor>> {
        self.detect_form_fields().await
    }

    async fn write_answers(&self, answers: &AnswerMap) -> Result<Vec<String>> {
        Page::write_answers(self, answers).await
    }

    async fn highlight(&self, ids: &[String], clear_after: Duration) -> Result<()> {
        self.highlight_fields(ids, clear_after).await
    }
}

/// Outcome of one fill attempt. Every variant is terminal; the user
/// re-triggers the fill to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// The profile had no usable rows; no network request was made.
    EmptyProfile,
    /// The page had no fillable controls; no network request was made.
    NoFields,
    /// The service answered successfully but chose to answer nothing.
    NoAnswers { detected: usize },
    /// Answers were written to the page.
    Filled { detected: usize, written: usize },
}

impl FillOutcome {
    /// User-facing status line for this outcome.
    pub fn status_message(&self) -> String {
        match self {
            FillOutcome::EmptyProfile => {
                "Fill in at least one profile field first.".to_string()
            }
            FillOutcome::NoFields => "No form fields found on this page.".to_string(),
            FillOutcome::NoAnswers { .. } => {
                "No answers generated. Try adding more profile detail.".to_string()
            }
            FillOutcome::Filled { written, detected } => {
                format!("Filled {written} of {detected} fields.")
            }
        }
    }
}

/// Run one fill cycle against `target`.
///
/// Order matters: an empty profile and an empty page are both rejected
/// locally, before any network traffic. A service failure propagates as an
/// error without touching the page. A successful response is applied field
/// by field; ids the page no longer has are skipped by the target.
pub async fn fill(
    target: &(impl FormTarget + Sync),
    client: &FillClient,
    profile: &Profile,
) -> Result<FillOutcome> {
    if profile.is_empty() {
        return Ok(FillOutcome::EmptyProfile);
    }

    let form_fields = target.detect_fields().await?;
    if form_fields.is_empty() {
        return Ok(FillOutcome::NoFields);
    }
    debug!(detected = form_fields.len(), "detected form fields");

    let request = FillRequest {
        profile: profile.to_map(),
        form_fields,
    };
    let answers = client.fill(&request).await?;

    let detected = request.form_fields.len();
    if answers.is_empty() {
        return Ok(FillOutcome::NoAnswers { detected });
    }

    let written = target.write_answers(&answers).await?;
    target.highlight(&written, HIGHLIGHT_DURATION).await?;
    info!(written = written.len(), detected, "fill complete");

    Ok(FillOutcome::Filled {
        detected,
        written: written.len(),
    })
}
