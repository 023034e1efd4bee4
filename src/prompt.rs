//! Prompt composition for meeting extraction.

use anyhow::Result;
use crm_filler_core::context::CrmContext;

/// System instruction sent with every extraction request.
pub const SYSTEM_INSTRUCTION: &str = "You are an enterprise CRM assistant. \
Return ONLY a valid JSON object. No explanation. No markdown.";

/// Shape of the object the model must return.
pub const OUTPUT_SCHEMA: &str = r#"{
  "contacts": [{"temp_id": "c1", "existing_id": null, "name": "string", "job_title": "string",
    "email": "string", "phone": "string", "decision_power": "yes/no/maybe/Unknown"}],

  "companies": [{"temp_id": "co1", "existing_id": null, "name": "string", "industry": "string",
    "size": "string", "location": "string"}],

  "deals": [{"temp_id": "d1", "existing_id": null, "name": "string", "value": "number or Unknown",
    "currency": "string", "stage": "string", "timeline": "string", "next_steps": "string",
    "competitors": ["string"]}],

  "actions": [{"entity": "contact/company/deal", "operation": "create/update",
    "target_temp_id": "c1/co1/d1", "reason": "string"}]
}"#;

/// Build the user prompt: existing CRM state as pretty JSON, the meeting
/// text verbatim, and the output schema.
///
/// A missing company renders as `null`.
pub fn build_prompt(meeting_text: &str, context: &CrmContext) -> Result<String> {
    let contacts = serde_json::to_string_pretty(&context.contacts)?;
    let company = serde_json::to_string_pretty(&context.company)?;
    let deals = serde_json::to_string_pretty(&context.deals)?;
    let meetings = serde_json::to_string_pretty(&context.meetings)?;

    Ok(format!(
        "You are an intelligent CRM extraction assistant.\n\
         Return ONLY valid JSON. No explanations.\n\
         Use existing_id when a proposal refers to a record listed below; otherwise null.\n\
         \n\
         EXISTING CONTACTS:\n{contacts}\n\
         \n\
         EXISTING COMPANY:\n{company}\n\
         \n\
         PREVIOUS DEALS:\n{deals}\n\
         \n\
         PREVIOUS MEETINGS:\n{meetings}\n\
         \n\
         NEW MEETING:\n{meeting_text}\n\
         \n\
         JSON SCHEMA:\n{OUTPUT_SCHEMA}\n"
    ))
}
