//! Reading apply payloads.
//!
//! `apply` accepts two shapes:
//!
//! - an extraction result (`contacts` / `companies` / `deals` / `actions`), as
//!   returned by `extract`;
//! - the web table form `{ "contact": [...], "company": [...], "deal": [...] }`,
//!   where every row is a new record. Rows get sequential temp ids (`co1`,
//!   `c1`, `d1`, ...), missing fields become `""`, and each row gets a
//!   `create` action.

use crm_filler_core::de::split_competitors;
use crm_filler_core::models::{
    Action, DealValue, DecisionPower, EntityKind, ExtractionResult, Operation, ProposedCompany,
    ProposedContact, ProposedDeal,
};
use serde_json::{Map, Value};

use crate::error::CrmError;

const EXTRACTION_KEYS: [&str; 4] = ["contacts", "companies", "deals", "actions"];
const TABLE_KEYS: [&str; 3] = ["contact", "company", "deal"];

pub const IMPORT_REASON: &str = "Imported from frontend";

/// Turn an apply payload into an extraction result.
pub fn read_apply_payload(payload: Value) -> Result<ExtractionResult, CrmError> {
    let obj = match payload {
        Value::Object(obj) if !obj.is_empty() => obj,
        Value::Object(_) => return Err(CrmError::invalid("gpt_json must not be empty")),
        _ => return Err(CrmError::invalid("gpt_json must be a JSON object")),
    };

    if EXTRACTION_KEYS.iter().any(|k| obj.contains_key(*k)) {
        return serde_json::from_value(Value::Object(obj))
            .map_err(|e| CrmError::invalid(format!("invalid extraction result: {}", e)));
    }
    if TABLE_KEYS.iter().any(|k| obj.contains_key(*k)) {
        return Ok(from_table(&obj));
    }
    Err(CrmError::invalid(
        "gpt_json must be an extraction result or a contact/company/deal table",
    ))
}

/// Convert the table form. Rows are taken as new records.
pub fn from_table(table: &Map<String, Value>) -> ExtractionResult {
    let mut out = ExtractionResult::empty();

    for (i, row) in rows(table, "company").enumerate() {
        out.companies.push(ProposedCompany {
            temp_id: format!("co{}", i + 1),
            existing_id: None,
            name: text(row, "name"),
            industry: text(row, "industry"),
            size: text(row, "size"),
            location: text(row, "location"),
        });
    }

    for (i, row) in rows(table, "contact").enumerate() {
        out.contacts.push(ProposedContact {
            temp_id: format!("c{}", i + 1),
            existing_id: None,
            name: text(row, "name"),
            job_title: text(row, "job_title"),
            email: text(row, "email"),
            phone: text(row, "phone"),
            decision_power: row
                .get("decision_power")
                .and_then(|v| serde_json::from_value::<DecisionPower>(v.clone()).ok())
                .unwrap_or_default(),
        });
    }

    for (i, row) in rows(table, "deal").enumerate() {
        out.deals.push(ProposedDeal {
            temp_id: format!("d{}", i + 1),
            existing_id: None,
            name: text(row, "name"),
            value: match row.get("value") {
                None => DealValue::Text(String::new()),
                Some(v) => serde_json::from_value(v.clone()).unwrap_or_default(),
            },
            currency: text(row, "currency"),
            stage: text(row, "stage"),
            timeline: text(row, "timeline"),
            next_steps: text(row, "next_steps"),
            competitors: competitors(row.get("competitors")),
        });
    }

    let creates = out
        .contacts
        .iter()
        .map(|c| (EntityKind::Contact, &c.temp_id))
        .chain(out.companies.iter().map(|c| (EntityKind::Company, &c.temp_id)))
        .chain(out.deals.iter().map(|d| (EntityKind::Deal, &d.temp_id)))
        .map(|(entity, temp_id)| Action {
            entity,
            operation: Operation::Create,
            target_temp_id: temp_id.clone(),
            reason: IMPORT_REASON.to_string(),
        })
        .collect();
    out.actions = creates;

    out
}

fn rows<'a>(table: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Value> {
    table
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn text(row: &Value, key: &str) -> String {
    match row.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn competitors(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => split_competitors(s),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
