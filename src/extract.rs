//! The extraction driver: meeting text + CRM context → proposals.
//!
//! One run composes a prompt, asks the [`Generator`] for a JSON object, and
//! parses the reply tolerantly. A reply counts only if it is an object with
//! an `actions` list that reads as an [`ExtractionResult`]; anything else,
//! including a transport error, is retried under the configured
//! [`RetryPolicy`]. When every attempt fails the caller gets
//! [`ExtractionResult::empty`], never an error.

use std::sync::Arc;

use crm_filler_core::context::CrmContext;
use crm_filler_core::models::ExtractionResult;
use crm_filler_core::output::{into_extraction, is_valid_extraction, parse_model_output};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::llm::Generator;
use crate::prompt::{build_prompt, SYSTEM_INSTRUCTION};
use crate::retry::RetryPolicy;

/// Characters of raw model output included in debug logs.
const PREVIEW_CHARS: usize = 200;

pub struct Extractor {
    generator: Arc<dyn Generator>,
    policy: RetryPolicy,
}

impl Extractor {
    pub fn new(generator: Arc<dyn Generator>, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one extraction. Always returns a well-formed result.
    pub async fn extract(&self, meeting_text: &str, context: &CrmContext) -> ExtractionResult {
        let run_id = Uuid::new_v4();
        let span = info_span!("extraction", %run_id, model = self.generator.model_name());
        self.extract_inner(meeting_text, context).instrument(span).await
    }

    async fn extract_inner(&self, meeting_text: &str, context: &CrmContext) -> ExtractionResult {
        let prompt = match build_prompt(meeting_text, context) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "could not compose prompt");
                return ExtractionResult::empty();
            }
        };

        let generator = &self.generator;
        let prompt = prompt.as_str();
        let accepted = self
            .policy
            .run(
                |_| async move {
                    let raw = generator.generate(SYSTEM_INSTRUCTION, prompt).await?;
                    debug!(chars = raw.len(), preview = %preview(&raw), "model output");
                    Ok(parse_model_output(&raw))
                },
                is_valid_extraction,
            )
            .await;

        match accepted.and_then(into_extraction) {
            Some(result) => {
                info!(
                    contacts = result.contacts.len(),
                    companies = result.companies.len(),
                    deals = result.deals.len(),
                    actions = result.actions.len(),
                    "extraction accepted"
                );
                result
            }
            None => {
                warn!(
                    attempts = self.policy.max_attempts,
                    "no valid output, returning empty result"
                );
                ExtractionResult::empty()
            }
        }
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}
