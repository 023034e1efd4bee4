//! Merging extraction proposals into persistent records.
//!
//! Proposals are processed companies first, then contacts, then deals, each
//! in input order:
//!
//! - no `existing_id` → a new record is appended under a freshly minted id;
//! - `existing_id` found → that record's mutable fields are overwritten;
//! - `existing_id` not found → nothing changes, no mapping entry is emitted,
//!   and a [`ReconcileWarning::DanglingUpdate`] is reported instead.
//!
//! New contacts point at the primary company's resolved id and new deals
//! carry the primary company's name (see [`ExtractionResult::primary_company`]).
//! Meetings are never touched.

use serde::Serialize;
use serde_json::Map;

use crate::ids::next_id;
use crate::models::{
    Collection, Company, Contact, CrmSnapshot, Deal, EntityKind, ExtractionResult, IdMapping,
    ProposedCompany, ProposedContact, ProposedDeal,
};

/// Something reconciliation skipped that the caller should hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileWarning {
    /// An update referenced an id that is not in the store.
    DanglingUpdate {
        entity: EntityKind,
        temp_id: String,
        existing_id: String,
    },
}

impl std::fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileWarning::DanglingUpdate {
                entity,
                temp_id,
                existing_id,
            } => write!(
                f,
                "{:?} {} updates unknown id {}; skipped",
                entity, temp_id, existing_id
            ),
        }
    }
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub mapping: IdMapping,
    pub warnings: Vec<ReconcileWarning>,
}

/// Apply `extraction` to `snapshot` in place.
///
/// Only `companies`, `contacts`, and `deals` are modified.
pub fn reconcile(extraction: &ExtractionResult, snapshot: &mut CrmSnapshot) -> Reconciliation {
    let mut out = Reconciliation::default();

    for proposal in &extraction.companies {
        apply_company(proposal, &mut snapshot.companies, &mut out);
    }

    let primary_temp = extraction.primary_company().map(|c| c.temp_id.as_str());
    let primary_id = primary_temp
        .and_then(|temp| out.mapping.get(temp))
        .map(str::to_string);
    for proposal in &extraction.contacts {
        apply_contact(proposal, primary_id.as_deref(), &mut snapshot.contacts, &mut out);
    }

    let primary_name = extraction.primary_company().map(|c| c.name.as_str());
    for proposal in &extraction.deals {
        apply_deal(proposal, primary_name, &mut snapshot.deals, &mut out);
    }

    out
}

fn dangling(out: &mut Reconciliation, entity: EntityKind, temp_id: &str, existing_id: &str) {
    out.warnings.push(ReconcileWarning::DanglingUpdate {
        entity,
        temp_id: temp_id.to_string(),
        existing_id: existing_id.to_string(),
    });
}

fn apply_company(p: &ProposedCompany, companies: &mut Vec<Company>, out: &mut Reconciliation) {
    match p.existing_id.as_deref() {
        None => {
            let id = next_id(Collection::Companies.id_prefix(), companies);
            companies.push(Company {
                company_id: id.clone(),
                name: p.name.clone(),
                industry: p.industry.clone(),
                size: p.size.clone(),
                location: p.location.clone(),
                extra: Map::new(),
            });
            out.mapping.insert(&p.temp_id, id);
        }
        Some(existing) => match companies.iter_mut().find(|c| c.company_id == existing) {
            Some(c) => {
                c.name = p.name.clone();
                c.industry = p.industry.clone();
                c.size = p.size.clone();
                c.location = p.location.clone();
                out.mapping.insert(&p.temp_id, existing);
            }
            None => dangling(out, EntityKind::Company, &p.temp_id, existing),
        },
    }
}

fn apply_contact(
    p: &ProposedContact,
    primary_company_id: Option<&str>,
    contacts: &mut Vec<Contact>,
    out: &mut Reconciliation,
) {
    match p.existing_id.as_deref() {
        None => {
            let id = next_id(Collection::Contacts.id_prefix(), contacts);
            contacts.push(Contact {
                contact_id: id.clone(),
                name: p.name.clone(),
                job_title: p.job_title.clone(),
                email: p.email.clone(),
                phone: p.phone.clone(),
                decision_power: p.decision_power,
                company_id: primary_company_id.map(str::to_string),
                extra: Map::new(),
            });
            out.mapping.insert(&p.temp_id, id);
        }
        Some(existing) => match contacts.iter_mut().find(|c| c.contact_id == existing) {
            Some(c) => {
                c.name = p.name.clone();
                c.job_title = p.job_title.clone();
                c.email = p.email.clone();
                c.phone = p.phone.clone();
                c.decision_power = p.decision_power;
                out.mapping.insert(&p.temp_id, existing);
            }
            None => dangling(out, EntityKind::Contact, &p.temp_id, existing),
        },
    }
}

fn apply_deal(
    p: &ProposedDeal,
    primary_company_name: Option<&str>,
    deals: &mut Vec<Deal>,
    out: &mut Reconciliation,
) {
    match p.existing_id.as_deref() {
        None => {
            let id = next_id(Collection::Deals.id_prefix(), deals);
            deals.push(Deal {
                deal_id: id.clone(),
                company_name: primary_company_name.map(str::to_string),
                deal_name: p.name.clone(),
                value: p.value.clone(),
                currency: p.currency.clone(),
                stage: p.stage.clone(),
                timeline: p.timeline.clone(),
                next_steps: p.next_steps.clone(),
                competitors: p.competitors.clone(),
                extra: Map::new(),
            });
            out.mapping.insert(&p.temp_id, id);
        }
        Some(existing) => match deals.iter_mut().find(|d| d.deal_id == existing) {
            Some(d) => {
                d.deal_name = p.name.clone();
                d.value = p.value.clone();
                d.currency = p.currency.clone();
                d.stage = p.stage.clone();
                d.timeline = p.timeline.clone();
                d.next_steps = p.next_steps.clone();
                d.competitors = p.competitors.clone();
                out.mapping.insert(&p.temp_id, existing);
            }
            None => dangling(out, EntityKind::Deal, &p.temp_id, existing),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DealValue, DecisionPower};
    use serde_json::{json, Number};

    fn seeded() -> CrmSnapshot {
        serde_json::from_value(json!({
            "companies": [{"company_id": "CO-2001", "name": "Mercury Consultants",
                           "industry": "Consulting", "size": "200", "location": "Pune",
                           "crm_owner": "asha"}],
            "contacts": [{"contact_id": "C-2001", "name": "Ravi", "job_title": "CIO",
                          "email": "ravi@mercury.example", "phone": "", "decision_power": "yes",
                          "company_id": "CO-2001"}],
            "deals": [{"deal_id": "D-2001", "company_name": "Mercury Consultants",
                       "deal_name": "IT budget", "value": 100000, "currency": "INR",
                       "stage": "Discovery", "timeline": "Q3", "next_steps": "",
                       "competitors": []}],
            "meetings": [{"meeting_id": "M-2001", "company_name": "Mercury Consultants",
                          "content": "kickoff"}]
        }))
        .unwrap()
    }

    fn extraction(value: serde_json::Value) -> ExtractionResult {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_creates_link_to_new_company() {
        let mut snap = seeded();
        let result = reconcile(
            &extraction(json!({
                "companies": [{"temp_id": "co1", "existing_id": null, "name": "Venus Logistics",
                               "industry": "Logistics", "size": "50", "location": "Chennai"}],
                "contacts": [{"temp_id": "c1", "existing_id": null, "name": "Anita",
                              "job_title": "CFO", "email": "", "phone": "",
                              "decision_power": "Unknown"}],
                "deals": [{"temp_id": "d1", "existing_id": null, "name": "Cloud migration",
                           "value": "Unknown", "currency": "INR", "stage": "Lead",
                           "timeline": "", "next_steps": "", "competitors": ["Acme"]}],
                "actions": []
            })),
            &mut snap,
        );

        assert_eq!(
            serde_json::to_value(&result.mapping).unwrap(),
            json!({"co1": "CO-2002", "c1": "C-2002", "d1": "D-2002"})
        );
        let order: Vec<&str> = result.mapping.iter().map(|(t, _)| t).collect();
        assert_eq!(order, vec!["co1", "c1", "d1"]);
        assert!(result.warnings.is_empty());

        let contact = snap.contacts.last().unwrap();
        assert_eq!(contact.company_id.as_deref(), Some("CO-2002"));
        assert_eq!(contact.decision_power, DecisionPower::Unknown);

        let deal = snap.deals.last().unwrap();
        assert_eq!(deal.company_name.as_deref(), Some("Venus Logistics"));
        assert_eq!(deal.deal_name, "Cloud migration");
        assert_eq!(deal.competitors, vec!["Acme"]);
        assert_eq!(snap.meetings.len(), 1);
    }

    #[test]
    fn test_update_overwrites_in_place() {
        let mut snap = seeded();
        let batch = extraction(json!({
            "companies": [{"temp_id": "co1", "existing_id": "CO-2001",
                           "name": "Mercury Consultants", "industry": "IT Services",
                           "size": "250", "location": "Mumbai"}],
            "contacts": [{"temp_id": "c1", "existing_id": "C-2001", "name": "Ravi Kumar",
                          "job_title": "CIO", "email": "ravi@mercury.example", "phone": "123",
                          "decision_power": "maybe"}],
            "deals": [{"temp_id": "d1", "existing_id": "D-2001", "name": "IT budget FY25",
                       "value": 140000, "currency": "INR", "stage": "Proposal",
                       "timeline": "Monday", "next_steps": "revised doc",
                       "competitors": ["Globex"]}],
            "actions": []
        }));
        let result = reconcile(&batch, &mut snap);

        assert_eq!(
            serde_json::to_value(&result.mapping).unwrap(),
            json!({"co1": "CO-2001", "c1": "C-2001", "d1": "D-2001"})
        );
        assert_eq!(snap.companies.len(), 1);
        let company = &snap.companies[0];
        assert_eq!(company.location, "Mumbai");
        assert_eq!(company.extra["crm_owner"], "asha");

        let contact = &snap.contacts[0];
        assert_eq!(contact.name, "Ravi Kumar");
        assert_eq!(contact.decision_power, DecisionPower::Maybe);
        assert_eq!(contact.company_id.as_deref(), Some("CO-2001"));

        let deal = &snap.deals[0];
        assert_eq!(deal.value, DealValue::Amount(Number::from(140000)));
        assert_eq!(deal.company_name.as_deref(), Some("Mercury Consultants"));
    }

    #[test]
    fn test_update_is_idempotent() {
        let batch = extraction(json!({
            "companies": [{"temp_id": "co1", "existing_id": "CO-2001", "name": "Mercury",
                           "industry": "IT", "size": "1", "location": "Goa"}],
            "actions": []
        }));
        let mut once = seeded();
        reconcile(&batch, &mut once);
        let mut twice = once.clone();
        let second = reconcile(&batch, &mut twice);
        assert_eq!(once, twice);
        assert_eq!(second.mapping.get("co1"), Some("CO-2001"));
    }

    #[test]
    fn test_dangling_update_is_skipped_and_reported() {
        let mut snap = seeded();
        let before = snap.clone();
        let result = reconcile(
            &extraction(json!({
                "contacts": [{"temp_id": "c1", "existing_id": "C-9999", "name": "Ghost"}],
                "actions": []
            })),
            &mut snap,
        );
        assert!(result.mapping.is_empty());
        assert_eq!(snap, before);
        assert_eq!(
            result.warnings,
            vec![ReconcileWarning::DanglingUpdate {
                entity: EntityKind::Contact,
                temp_id: "c1".to_string(),
                existing_id: "C-9999".to_string(),
            }]
        );
    }

    #[test]
    fn test_contacts_link_to_matched_primary_company() {
        let mut snap = seeded();
        let result = reconcile(
            &extraction(json!({
                "companies": [
                    {"temp_id": "co1", "existing_id": "CO-2001", "name": "Mercury Consultants"},
                    {"temp_id": "co2", "existing_id": null, "name": "Venus Logistics"}
                ],
                "contacts": [{"temp_id": "c1", "existing_id": null, "name": "Sonal"}],
                "deals": [{"temp_id": "d1", "existing_id": null, "name": "Audit tools"}],
                "actions": []
            })),
            &mut snap,
        );
        assert_eq!(result.mapping.get("co2"), Some("CO-2002"));
        assert_eq!(snap.contacts[1].company_id.as_deref(), Some("CO-2001"));
        assert_eq!(
            snap.deals[1].company_name.as_deref(),
            Some("Mercury Consultants")
        );
    }

    #[test]
    fn test_dangling_primary_company_leaves_contact_unlinked() {
        let mut snap = seeded();
        reconcile(
            &extraction(json!({
                "companies": [{"temp_id": "co1", "existing_id": "CO-4040", "name": "Nowhere"}],
                "contacts": [{"temp_id": "c1", "existing_id": null, "name": "Karan"}],
                "deals": [{"temp_id": "d1", "existing_id": null, "name": "Risk note"}],
                "actions": []
            })),
            &mut snap,
        );
        assert_eq!(snap.contacts[1].company_id, None);
        // The deal still takes the first company's proposed name.
        assert_eq!(snap.deals[1].company_name.as_deref(), Some("Nowhere"));
    }

    #[test]
    fn test_deal_without_companies_has_no_company_name() {
        let mut snap = seeded();
        let result = reconcile(
            &extraction(json!({
                "deals": [{"temp_id": "d1", "existing_id": null, "name": "Orphan"}],
                "actions": []
            })),
            &mut snap,
        );
        assert_eq!(result.mapping.get("d1"), Some("D-2002"));
        assert_eq!(snap.deals[1].company_name, None);
    }

    #[test]
    fn test_several_creates_mint_sequential_ids() {
        let mut snap = CrmSnapshot::default();
        let result = reconcile(
            &extraction(json!({
                "companies": [
                    {"temp_id": "co1", "name": "A"},
                    {"temp_id": "co2", "name": "B"}
                ],
                "actions": []
            })),
            &mut snap,
        );
        assert_eq!(result.mapping.get("co1"), Some("CO-2001"));
        assert_eq!(result.mapping.get("co2"), Some("CO-2002"));
    }
}
