//! The Agenda entry document.
//!
//! Field names follow the Agenda `saveentry` API exactly (PascalCase), and
//! every reference to an Agenda entity is wrapped as `{"ID": n}`.

use serde::{Deserialize, Serialize};

use crate::workflow::WorkflowState;

/// Reference to an Agenda entity by numeric id. `ID` may be null, as in
/// `EntrySchedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    #[serde(rename = "ID")]
    pub id: Option<i64>,
}

impl IdRef {
    pub fn new(id: i64) -> Self {
        Self { id: Some(id) }
    }

    pub fn null() -> Self {
        Self { id: None }
    }
}

/// A selectable reference (categories, agencies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    #[serde(rename = "ID")]
    pub id: i64,
    #[serde(rename = "IsSelected")]
    pub is_selected: bool,
}

impl Selection {
    pub fn selected(id: i64) -> Self {
        Self {
            id,
            is_selected: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRef {
    #[serde(rename = "Topic")]
    pub topic: IdRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgendaCoverage {
    #[serde(rename = "Role")]
    pub role: IdRef,
    #[serde(rename = "CoverageStatus")]
    pub coverage_status: IdRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAddress {
    #[serde(rename = "DisplayString")]
    pub display_string: String,
}

/// Agenda's default region (NSW), country (Australia) and city (Sydney).
pub const DEFAULT_REGION: i64 = 3;
pub const DEFAULT_COUNTRY: i64 = 16;
pub const DEFAULT_CITY: i64 = 106;
/// Region used for anything outside Australia.
pub const WORLD_REGION: i64 = 11;
/// Category used when nothing more specific maps.
pub const DEFAULT_CATEGORY: i64 = 4;
/// Entries are always attributed to AAP.
pub const AAP_AGENCY: i64 = 1;
pub const PUBLIC_VISIBILITY: i64 = 1;

/// A single Agenda entry as sent to `entry/saveentry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgendaEntry {
    pub title: Option<String>,
    pub description: String,
    pub description_format: String,
    pub special_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_from_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_zone: Option<String>,
    pub region: IdRef,
    pub country: IdRef,
    pub city: IdRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<DisplayAddress>,
    pub categories: Vec<Selection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<TopicRef>>,
    pub agencies: Vec<Selection>,
    pub visibility: IdRef,
    pub entry_schedule: IdRef,
    pub workflow_state: WorkflowState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverages: Option<Vec<AgendaCoverage>>,
}

impl AgendaEntry {
    /// An entry with the fixed AAP fields set and the location defaulted to
    /// Sydney, NSW, Australia.
    pub fn new(title: Option<String>, description: String, workflow_state: WorkflowState) -> Self {
        Self {
            title,
            description,
            description_format: "html".to_string(),
            special_instructions: None,
            date_from: None,
            date_to: None,
            time_from: None,
            time_to: None,
            time_from_zone: None,
            time_to_zone: None,
            region: IdRef::new(DEFAULT_REGION),
            country: IdRef::new(DEFAULT_COUNTRY),
            city: IdRef::new(DEFAULT_CITY),
            address: None,
            categories: vec![Selection::selected(DEFAULT_CATEGORY)],
            topics: None,
            agencies: vec![Selection::selected(AAP_AGENCY)],
            visibility: IdRef::new(PUBLIC_VISIBILITY),
            entry_schedule: IdRef::null(),
            workflow_state,
            coverages: None,
        }
    }
}

/// Formatter output: the entry plus the routing fields the transmitter strips
/// before sending (`Type`, `ExternalIdentifier`, `PublishingUser`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishEnvelope {
    #[serde(flatten)]
    pub entry: AgendaEntry,
    #[serde(rename = "Type")]
    pub item_type: String,
    #[serde(rename = "ExternalIdentifier")]
    pub external_identifier: String,
    #[serde(rename = "PublishingUser")]
    pub publishing_user: Option<String>,
}
