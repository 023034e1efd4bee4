//! The two boundary operations, shared by the CLI and the HTTP server.
//!
//! [`CrmService::run_extraction`] reads the store and asks the model for
//! proposals; it never writes. [`CrmService::run_apply`] loads, reconciles,
//! and saves under one async mutex, so two applies can never mint the same
//! id or overwrite each other's changes.

use std::sync::Arc;

use crm_filler_core::context::{build_context, UNKNOWN_HINT};
use crm_filler_core::models::{CrmSnapshot, ExtractionResult, IdMapping};
use crm_filler_core::reconcile::{reconcile, ReconcileWarning};
use crm_filler_core::store::{load_snapshot, save_snapshot, RecordStore};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::CrmError;
use crate::extract::Extractor;
use crate::json_store::JsonFileStore;
use crate::llm::{create_generator, Generator};
use crate::retry::RetryPolicy;

/// Result of [`CrmService::run_apply`].
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub mapping: IdMapping,
    pub warnings: Vec<ReconcileWarning>,
    pub crm_state: CrmSnapshot,
}

pub struct CrmService {
    store: Arc<dyn RecordStore>,
    extractor: Extractor,
    write_lock: Mutex<()>,
}

impl CrmService {
    pub fn new(store: Arc<dyn RecordStore>, extractor: Extractor) -> Self {
        Self {
            store,
            extractor,
            write_lock: Mutex::new(()),
        }
    }

    /// JSON-file store and configured generator.
    pub fn from_config(config: &Config) -> Result<Self, CrmError> {
        let generator =
            create_generator(&config.llm).map_err(|e| CrmError::Config(format!("{:#}", e)))?;
        Ok(Self::with_generator(config, generator))
    }

    /// JSON-file store from `config` with a caller-supplied generator.
    pub fn with_generator(config: &Config, generator: Arc<dyn Generator>) -> Self {
        let store = Arc::new(JsonFileStore::new(&config.store));
        let policy = RetryPolicy::new(
            config.extraction.max_attempts,
            config.extraction.retry_delay(),
        );
        Self::new(store, Extractor::new(generator, policy))
    }

    /// Current contents of all four collections.
    pub async fn state(&self) -> Result<CrmSnapshot, CrmError> {
        load_snapshot(self.store.as_ref())
            .await
            .map_err(CrmError::Store)
    }

    /// Propose changes for one meeting. Blank or missing hints become `"Unknown"`.
    pub async fn run_extraction(
        &self,
        meeting_text: &str,
        company_hint: Option<&str>,
        contact_hint: Option<&str>,
    ) -> Result<ExtractionResult, CrmError> {
        let meeting_text = meeting_text.trim();
        if meeting_text.is_empty() {
            return Err(CrmError::invalid("meeting_text must not be empty"));
        }
        let company_hint = hint(company_hint);
        let contact_hint = hint(contact_hint);

        let snapshot = {
            let _guard = self.write_lock.lock().await;
            self.state().await?
        };
        let context = build_context(company_hint, contact_hint, &snapshot);
        info!(
            company_hint,
            contact_hint,
            matched_company = context.company.as_ref().map(|c| c.company_id.as_str()),
            contacts = context.contacts.len(),
            deals = context.deals.len(),
            meetings = context.meetings.len(),
            "context built"
        );

        Ok(self.extractor.extract(meeting_text, &context).await)
    }

    /// Merge an extraction into the store and persist it.
    pub async fn run_apply(&self, extraction: &ExtractionResult) -> Result<ApplyOutcome, CrmError> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = self.state().await?;
        let result = reconcile(extraction, &mut snapshot);
        for warning in &result.warnings {
            warn!(%warning, "reconciliation skipped a proposal");
        }

        save_snapshot(self.store.as_ref(), &mut snapshot)
            .await
            .map_err(CrmError::Store)?;

        info!(
            mapped = result.mapping.len(),
            warnings = result.warnings.len(),
            "apply complete"
        );

        Ok(ApplyOutcome {
            mapping: result.mapping,
            warnings: result.warnings,
            crm_state: snapshot,
        })
    }
}

fn hint(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN_HINT,
    }
}
