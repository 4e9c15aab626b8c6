//! Provider-agnostic representation of a remote CRM record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of record an item was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Contact,
    Company,
    Deal,
    /// Record of a type without a registered extractor
    Unknown,
}

/// A remote record mapped onto one common shape.
///
/// Derived purely from the raw record and its type tag; type-specific fields
/// are `None` when the record type does not carry them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    /// `{provider}/{type tag}/{remote id}`, unique across pooled types
    pub id: String,

    #[serde(rename = "type")]
    pub item_type: ItemType,

    pub name: String,
    pub parent_id: Option<String>,
    pub parent_label: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,

    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
}
