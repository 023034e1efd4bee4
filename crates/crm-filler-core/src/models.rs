//! Core data models used throughout CRM Filler.
//!
//! Persistent records ([`Company`], [`Contact`], [`Deal`], [`Meeting`]) mirror
//! the JSON objects stored in the collection files. Each keeps any fields it
//! does not know about in `extra`, so a load/save cycle never drops data.
//!
//! Transient types ([`ProposedCompany`], [`ProposedContact`], [`ProposedDeal`],
//! [`Action`], [`ExtractionResult`]) describe one extraction run and are
//! discarded once reconciliation has resolved them.

use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use crate::de;
use crate::stored::{capture_all, to_stored_array, StoredForms};

/// One of the four persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Companies,
    Contacts,
    Deals,
    Meetings,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Companies,
        Collection::Contacts,
        Collection::Deals,
        Collection::Meetings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Companies => "companies",
            Collection::Contacts => "contacts",
            Collection::Deals => "deals",
            Collection::Meetings => "meetings",
        }
    }

    /// Name of the identifier field carried by every record in the collection.
    pub fn id_field(&self) -> &'static str {
        match self {
            Collection::Companies => "company_id",
            Collection::Contacts => "contact_id",
            Collection::Deals => "deal_id",
            Collection::Meetings => "meeting_id",
        }
    }

    /// Prefix used when minting new identifiers (`CO-2001`, `C-2001`, ...).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Collection::Companies => "CO",
            Collection::Contacts => "C",
            Collection::Deals => "D",
            Collection::Meetings => "M",
        }
    }

    pub fn default_file_name(&self) -> &'static str {
        match self {
            Collection::Companies => "existing_companies.json",
            Collection::Contacts => "existing_contacts.json",
            Collection::Deals => "previous_deals.json",
            Collection::Meetings => "previous_meetings.json",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed record that lives in one [`Collection`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    const COLLECTION: Collection;

    /// The record's persistent identifier.
    fn id(&self) -> &str;

    /// The display name used for fuzzy matching.
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default, deserialize_with = "de::text")]
    pub company_id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(default, deserialize_with = "de::text")]
    pub industry: String,
    #[serde(default, deserialize_with = "de::text")]
    pub size: String,
    #[serde(default, deserialize_with = "de::text")]
    pub location: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Company {
    const COLLECTION: Collection = Collection::Companies;

    fn id(&self) -> &str {
        &self.company_id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, deserialize_with = "de::text")]
    pub contact_id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(default, deserialize_with = "de::text")]
    pub job_title: String,
    #[serde(default, deserialize_with = "de::text")]
    pub email: String,
    #[serde(default, deserialize_with = "de::text")]
    pub phone: String,
    #[serde(default)]
    pub decision_power: DecisionPower,
    /// Back-reference to the owning company, if known.
    #[serde(default, deserialize_with = "de::opt_text")]
    pub company_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Contact {
    const COLLECTION: Collection = Collection::Contacts;

    fn id(&self) -> &str {
        &self.contact_id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    #[serde(default, deserialize_with = "de::text")]
    pub deal_id: String,
    /// Denormalized company name; not a foreign key.
    #[serde(default, deserialize_with = "de::opt_text")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub deal_name: String,
    #[serde(default)]
    pub value: DealValue,
    #[serde(default, deserialize_with = "de::text")]
    pub currency: String,
    #[serde(default, deserialize_with = "de::text")]
    pub stage: String,
    #[serde(default, deserialize_with = "de::text")]
    pub timeline: String,
    #[serde(default, deserialize_with = "de::text")]
    pub next_steps: String,
    #[serde(default, deserialize_with = "de::competitors")]
    pub competitors: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Deal {
    const COLLECTION: Collection = Collection::Deals;

    fn id(&self) -> &str {
        &self.deal_id
    }

    fn name(&self) -> &str {
        &self.deal_name
    }
}

/// A past meeting. Read-only: reconciliation never writes meetings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    #[serde(default, deserialize_with = "de::text")]
    pub meeting_id: String,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub company_name: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record for Meeting {
    const COLLECTION: Collection = Collection::Meetings;

    fn id(&self) -> &str {
        &self.meeting_id
    }

    fn name(&self) -> &str {
        self.company_name.as_deref().unwrap_or_default()
    }
}

/// Whether a contact can sign off on a deal.
///
/// Parsed case-insensitively; anything unrecognized becomes [`DecisionPower::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecisionPower {
    Yes,
    No,
    Maybe,
    #[default]
    Unknown,
}

impl DecisionPower {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "yes" => DecisionPower::Yes,
            "no" => DecisionPower::No,
            "maybe" => DecisionPower::Maybe,
            _ => DecisionPower::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionPower::Yes => "yes",
            DecisionPower::No => "no",
            DecisionPower::Maybe => "maybe",
            DecisionPower::Unknown => "Unknown",
        }
    }
}

impl Serialize for DecisionPower {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DecisionPower {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) => DecisionPower::parse(&s),
            Value::Bool(true) => DecisionPower::Yes,
            Value::Bool(false) => DecisionPower::No,
            _ => DecisionPower::Unknown,
        })
    }
}

/// A deal's monetary value: an exact JSON number, or free text such as `"Unknown"`.
#[derive(Debug, Clone, PartialEq)]
pub enum DealValue {
    Amount(Number),
    Text(String),
}

impl DealValue {
    pub fn unknown() -> Self {
        DealValue::Text("Unknown".to_string())
    }
}

impl Default for DealValue {
    fn default() -> Self {
        DealValue::unknown()
    }
}

impl Serialize for DealValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DealValue::Amount(n) => n.serialize(serializer),
            DealValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for DealValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => DealValue::Amount(n),
            Value::String(s) => DealValue::Text(s),
            Value::Null => DealValue::unknown(),
            other => DealValue::Text(other.to_string()),
        })
    }
}

// ============ Extraction types ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedCompany {
    #[serde(default, deserialize_with = "de::text")]
    pub temp_id: String,
    /// Present when the proposal updates an existing company.
    #[serde(default, deserialize_with = "de::opt_text")]
    pub existing_id: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(default, deserialize_with = "de::text")]
    pub industry: String,
    #[serde(default, deserialize_with = "de::text")]
    pub size: String,
    #[serde(default, deserialize_with = "de::text")]
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedContact {
    #[serde(default, deserialize_with = "de::text")]
    pub temp_id: String,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub existing_id: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(default, deserialize_with = "de::text")]
    pub job_title: String,
    #[serde(default, deserialize_with = "de::text")]
    pub email: String,
    #[serde(default, deserialize_with = "de::text")]
    pub phone: String,
    #[serde(default)]
    pub decision_power: DecisionPower,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedDeal {
    #[serde(default, deserialize_with = "de::text")]
    pub temp_id: String,
    #[serde(default, deserialize_with = "de::opt_text")]
    pub existing_id: Option<String>,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(default)]
    pub value: DealValue,
    #[serde(default, deserialize_with = "de::text")]
    pub currency: String,
    #[serde(default, deserialize_with = "de::text")]
    pub stage: String,
    #[serde(default, deserialize_with = "de::text")]
    pub timeline: String,
    #[serde(default, deserialize_with = "de::text")]
    pub next_steps: String,
    #[serde(default, deserialize_with = "de::competitors")]
    pub competitors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[serde(alias = "companies", alias = "Company")]
    Company,
    #[serde(alias = "contacts", alias = "Contact")]
    Contact,
    #[serde(alias = "deals", alias = "Deal")]
    Deal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[serde(alias = "Create")]
    Create,
    #[serde(alias = "Update")]
    Update,
}

/// Advisory note explaining one proposed change. Not needed to reconcile,
/// but a response without an `actions` key is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub entity: EntityKind,
    pub operation: Operation,
    #[serde(default, deserialize_with = "de::text")]
    pub target_temp_id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub reason: String,
}

/// Everything one extraction run proposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "de::lenient_list")]
    pub contacts: Vec<ProposedContact>,
    #[serde(default, deserialize_with = "de::lenient_list")]
    pub companies: Vec<ProposedCompany>,
    #[serde(default, deserialize_with = "de::lenient_list")]
    pub deals: Vec<ProposedDeal>,
    /// Actions with an entity or operation outside the known set are dropped.
    #[serde(default, deserialize_with = "de::lenient_list")]
    pub actions: Vec<Action>,
    /// Temp id of the company that new contacts and deals attach to.
    /// Defaults to the first proposed company.
    #[serde(
        default,
        deserialize_with = "de::opt_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub primary_company: Option<String>,
}

impl ExtractionResult {
    /// The well-formed "nothing usable" result.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
            && self.companies.is_empty()
            && self.deals.is_empty()
            && self.actions.is_empty()
    }

    /// The company this batch's new contacts and deals belong to.
    ///
    /// An explicitly named `primary_company` wins when it refers to a proposed
    /// company; otherwise the first proposed company is primary.
    pub fn primary_company(&self) -> Option<&ProposedCompany> {
        self.primary_company
            .as_deref()
            .and_then(|temp| self.companies.iter().find(|c| c.temp_id == temp))
            .or_else(|| self.companies.first())
    }
}

/// Temp id → persistent id, in the order entities were reconciled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    entries: Vec<(String, String)>,
}

impl IdMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `temp_id -> persistent_id`. Re-inserting a temp id replaces
    /// its target but keeps its original position.
    pub fn insert(&mut self, temp_id: impl Into<String>, persistent_id: impl Into<String>) {
        let temp_id = temp_id.into();
        let persistent_id = persistent_id.into();
        match self.entries.iter_mut().find(|(t, _)| *t == temp_id) {
            Some(entry) => entry.1 = persistent_id,
            None => self.entries.push((temp_id, persistent_id)),
        }
    }

    pub fn get(&self, temp_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == temp_id)
            .map(|(_, p)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, p)| (t.as_str(), p.as_str()))
    }
}

impl Serialize for IdMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (temp, persistent) in &self.entries {
            map.serialize_entry(temp, persistent)?;
        }
        map.end()
    }
}

/// The full contents of a store at one point in time.
///
/// Serializes each record in its stored form (see [`crate::stored`]), so
/// records nobody changed read back exactly as they sit in the store.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CrmSnapshot {
    pub companies: Vec<Company>,
    pub contacts: Vec<Contact>,
    pub deals: Vec<Deal>,
    pub meetings: Vec<Meeting>,
    /// As-loaded JSON of the records above, filled by the store.
    #[serde(skip)]
    pub stored: StoredForms,
}

impl CrmSnapshot {
    /// One collection as it should be written back.
    pub fn to_stored(&self, collection: Collection) -> serde_json::Result<Value> {
        let forms = self.stored.get(collection);
        match collection {
            Collection::Companies => to_stored_array(&self.companies, forms),
            Collection::Contacts => to_stored_array(&self.contacts, forms),
            Collection::Deals => to_stored_array(&self.deals, forms),
            Collection::Meetings => to_stored_array(&self.meetings, forms),
        }
    }

    /// Record `root` (as returned by [`to_stored`](Self::to_stored)) as the
    /// stored form of `collection`.
    pub fn mark_stored(&mut self, collection: Collection, root: Value) -> serde_json::Result<()> {
        let written = match root {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        let forms = match collection {
            Collection::Companies => capture_all(&self.companies, written)?,
            Collection::Contacts => capture_all(&self.contacts, written)?,
            Collection::Deals => capture_all(&self.deals, written)?,
            Collection::Meetings => capture_all(&self.meetings, written)?,
        };
        self.stored.insert(collection, forms);
        Ok(())
    }
}

impl Serialize for CrmSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Collection::ALL.len()))?;
        for collection in Collection::ALL {
            let records = self
                .to_stored(collection)
                .map_err(serde::ser::Error::custom)?;
            map.serialize_entry(collection.name(), &records)?;
        }
        map.end()
    }
}
