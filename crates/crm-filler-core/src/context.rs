//! Existing-state lookup for a meeting.
//!
//! Before the model sees a meeting, the store is searched for what we
//! already know: the company named in the meeting, up to three related
//! contacts, and the three most recent deals and meetings for that company.

use serde::Serialize;

use crate::fuzzy::{best_match, find_contacts};
use crate::models::{Company, Contact, CrmSnapshot, Deal, Meeting};

/// How many past deals and meetings are included.
pub const RECENT_LIMIT: usize = 3;

/// Hint used when the caller does not name a company or contact.
pub const UNKNOWN_HINT: &str = "Unknown";

/// The "existing state" bundle handed to the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrmContext {
    pub company: Option<Company>,
    pub contacts: Vec<Contact>,
    pub deals: Vec<Deal>,
    pub meetings: Vec<Meeting>,
}

/// Build the context for a meeting from a store snapshot.
///
/// Deals and meetings are only looked up when a company matched; they are
/// matched on the exact company name and kept in storage order.
pub fn build_context(company_hint: &str, contact_hint: &str, snapshot: &CrmSnapshot) -> CrmContext {
    let company = best_match(company_hint, &snapshot.companies).cloned();

    let contacts = find_contacts(
        contact_hint,
        &snapshot.contacts,
        company.as_ref().map(|c| c.company_id.as_str()),
    )
    .into_iter()
    .cloned()
    .collect();

    let (deals, meetings) = match &company {
        Some(c) => (
            last_n(&snapshot.deals, |d| d.company_name.as_deref() == Some(c.name.as_str())),
            last_n(&snapshot.meetings, |m| {
                m.company_name.as_deref() == Some(c.name.as_str())
            }),
        ),
        None => (Vec::new(), Vec::new()),
    };

    CrmContext {
        company,
        contacts,
        deals,
        meetings,
    }
}

/// The last [`RECENT_LIMIT`] items matching `pred`, in their original order.
fn last_n<T: Clone>(items: &[T], pred: impl Fn(&T) -> bool) -> Vec<T> {
    let matching: Vec<&T> = items.iter().filter(|item| pred(*item)).collect();
    let skip = matching.len().saturating_sub(RECENT_LIMIT);
    matching.into_iter().skip(skip).cloned().collect()
}
