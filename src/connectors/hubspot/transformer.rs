use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;

use super::config::PROVIDER_TAG;
use crate::item::{ItemType, NormalizedItem};

const UNNAMED: &str = "Unnamed Item";

/// Type-specific fields pulled out of one raw record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
}

/// Extraction function for one record type.
pub type Extractor = fn(&Value) -> Extracted;

/// Registry of per-type extractors keyed by type tag.
///
/// Tags without an extractor normalize to `ItemType::Unknown` with the
/// placeholder name and no type-specific fields.
#[derive(Clone)]
pub struct Normalizer {
    extractors: HashMap<String, (ItemType, Extractor)>,
}

impl Normalizer {
    /// A registry with no extractors; every tag normalizes as unknown.
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with the contacts, companies and deals extractors.
    pub fn hubspot() -> Self {
        let mut normalizer = Self::empty();
        normalizer.register("contacts", ItemType::Contact, extract_contact);
        normalizer.register("companies", ItemType::Company, extract_company);
        normalizer.register("deals", ItemType::Deal, extract_deal);
        normalizer
    }

    /// Add or replace the extractor for `tag`.
    pub fn register(&mut self, tag: &str, item_type: ItemType, extractor: Extractor) {
        self.extractors.insert(tag.to_string(), (item_type, extractor));
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.extractors.contains_key(tag)
    }

    /// Map one raw record onto a `NormalizedItem`. Never fails; missing
    /// fields come out as `None`.
    pub fn normalize(
        &self,
        raw: &Value,
        tag: &str,
        parent_id: Option<String>,
        parent_label: Option<String>,
    ) -> NormalizedItem {
        let (item_type, extracted) = match self.extractors.get(tag) {
            Some((item_type, extractor)) => (*item_type, extractor(raw)),
            None => (
                ItemType::Unknown,
                Extracted {
                    name: UNNAMED.to_string(),
                    ..Default::default()
                },
            ),
        };

        NormalizedItem {
            id: namespaced_id(tag, raw),
            item_type,
            name: extracted.name,
            parent_id,
            parent_label,
            creation_time: timestamp(raw, "createdAt", &["createdate"]),
            modified_time: timestamp(
                raw,
                "updatedAt",
                &["hs_lastmodifieddate", "lastmodifieddate"],
            ),
            email: extracted.email,
            phone: extracted.phone,
            company_name: extracted.company_name,
            job_title: extracted.job_title,
        }
    }
}

/// Remote id of a raw record; HubSpot sends strings, older payloads numbers.
pub fn raw_id(raw: &Value) -> Option<String> {
    match raw.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `hubspot/{tag}/{raw id}`
pub fn namespaced_id(tag: &str, raw: &Value) -> String {
    format!(
        "{}/{}/{}",
        PROVIDER_TAG,
        tag,
        raw_id(raw).unwrap_or_default()
    )
}

fn prop(raw: &Value, name: &str) -> Option<String> {
    match raw.get("properties")?.get(name)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp(raw: &Value, top_level: &str, fallbacks: &[&str]) -> Option<DateTime<Utc>> {
    if let Some(parsed) = raw.get(top_level).and_then(parse_timestamp) {
        return Some(parsed);
    }
    let properties = raw.get("properties")?;
    fallbacks
        .iter()
        .filter_map(|name| properties.get(*name))
        .find_map(parse_timestamp)
}

/// RFC 3339 strings, or epoch milliseconds as a number or digit string.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            s.parse::<i64>().ok().and_then(from_millis)
        }
        Value::Number(n) => n.as_i64().and_then(from_millis),
        _ => None,
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn extract_contact(raw: &Value) -> Extracted {
    let first = prop(raw, "firstname").unwrap_or_default();
    let last = prop(raw, "lastname").unwrap_or_default();
    Extracted {
        name: format!("{} {}", first, last).trim().to_string(),
        email: prop(raw, "email"),
        phone: prop(raw, "phone"),
        company_name: prop(raw, "company"),
        job_title: prop(raw, "jobtitle"),
    }
}

fn extract_company(raw: &Value) -> Extracted {
    Extracted {
        name: prop(raw, "name").unwrap_or_else(|| UNNAMED.to_string()),
        phone: prop(raw, "phone"),
        company_name: prop(raw, "domain"),
        ..Default::default()
    }
}

fn extract_deal(raw: &Value) -> Extracted {
    Extracted {
        name: prop(raw, "dealname").unwrap_or_else(|| UNNAMED.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_contact() -> Value {
        json!({
            "id": "51",
            "properties": {
                "firstname": "Maria",
                "lastname": "Johnson",
                "email": "maria@example.com",
                "phone": "+1 555 0100",
                "company": "Acme",
                "jobtitle": "CTO",
                "createdate": "2024-01-02T03:04:05.000Z",
                "lastmodifieddate": "2024-02-01T00:00:00Z"
            },
            "createdAt": "2024-01-02T03:04:05.000Z",
            "updatedAt": "2024-02-03T00:00:00.000Z",
            "archived": false
        })
    }

    #[test]
    fn test_contact() {
        let item = Normalizer::hubspot().normalize(&make_contact(), "contacts", None, None);

        assert_eq!(item.id, "hubspot/contacts/51");
        assert_eq!(item.item_type, ItemType::Contact);
        assert_eq!(item.name, "Maria Johnson");
        assert_eq!(item.email.as_deref(), Some("maria@example.com"));
        assert_eq!(item.phone.as_deref(), Some("+1 555 0100"));
        assert_eq!(item.company_name.as_deref(), Some("Acme"));
        assert_eq!(item.job_title.as_deref(), Some("CTO"));
        assert_eq!(
            item.creation_time.unwrap().to_rfc3339(),
            "2024-01-02T03:04:05+00:00"
        );
        // Top-level updatedAt wins over the property
        assert_eq!(
            item.modified_time.unwrap().to_rfc3339(),
            "2024-02-03T00:00:00+00:00"
        );
    }

    #[test]
    fn test_contact_with_only_email_has_empty_name() {
        let raw = json!({"id": "7", "properties": {"email": "x@y.z"}});
        let item = Normalizer::hubspot().normalize(&raw, "contacts", None, None);

        assert_eq!(item.name, "");
        assert_eq!(item.email.as_deref(), Some("x@y.z"));
        assert!(item.creation_time.is_none());
    }

    #[test]
    fn test_contact_single_name_is_trimmed() {
        let raw = json!({"id": "8", "properties": {"lastname": "Smith"}});
        let item = Normalizer::hubspot().normalize(&raw, "contacts", None, None);
        assert_eq!(item.name, "Smith");
    }

    #[test]
    fn test_company_and_deal() {
        let normalizer = Normalizer::hubspot();

        let company = json!({
            "id": "9",
            "properties": {"name": "Acme", "domain": "acme.test", "phone": "123"}
        });
        let item = normalizer.normalize(&company, "companies", None, None);
        assert_eq!(item.item_type, ItemType::Company);
        assert_eq!(item.name, "Acme");
        assert_eq!(item.company_name.as_deref(), Some("acme.test"));
        assert_eq!(item.phone.as_deref(), Some("123"));

        let nameless = json!({"id": "10", "properties": {}});
        assert_eq!(normalizer.normalize(&nameless, "companies", None, None).name, UNNAMED);

        let deal = json!({"id": 11, "properties": {"dealname": "Renewal"}});
        let item = normalizer.normalize(
            &deal,
            "deals",
            Some("hubspot/companies/9".to_string()),
            Some("Acme".to_string()),
        );
        assert_eq!(item.id, "hubspot/deals/11");
        assert_eq!(item.item_type, ItemType::Deal);
        assert_eq!(item.name, "Renewal");
        assert_eq!(item.parent_id.as_deref(), Some("hubspot/companies/9"));
        assert_eq!(item.parent_label.as_deref(), Some("Acme"));
        assert!(item.email.is_none());
    }

    #[test]
    fn test_unknown_type() {
        let item = Normalizer::hubspot().normalize(&make_contact(), "tickets", None, None);

        assert_eq!(item.item_type, ItemType::Unknown);
        assert_eq!(item.name, "Unnamed Item");
        assert_eq!(item.id, "hubspot/tickets/51");
        assert!(item.email.is_none());
        assert!(item.phone.is_none());
        assert!(item.company_name.is_none());
        assert!(item.job_title.is_none());
    }

    #[test]
    fn test_register_extractor_at_runtime() {
        fn extract_ticket(raw: &Value) -> Extracted {
            Extracted {
                name: prop(raw, "subject").unwrap_or_default(),
                ..Default::default()
            }
        }

        let mut normalizer = Normalizer::hubspot();
        assert!(!normalizer.is_registered("tickets"));
        normalizer.register("tickets", ItemType::Unknown, extract_ticket);

        let raw = json!({"id": "1", "properties": {"subject": "Printer on fire"}});
        assert_eq!(normalizer.normalize(&raw, "tickets", None, None).name, "Printer on fire");
    }

    #[test]
    fn test_empty_registry_treats_every_tag_as_unknown() {
        let normalizer = Normalizer::empty();
        assert!(!normalizer.is_registered("contacts"));

        let item = normalizer.normalize(&make_contact(), "contacts", None, None);
        assert_eq!(item.item_type, ItemType::Unknown);
        assert_eq!(item.name, UNNAMED);
        assert!(item.email.is_none());
    }

    #[test]
    fn test_timestamp_fallbacks() {
        let raw = json!({
            "id": "1",
            "properties": {"createdate": "1700000000000", "hs_lastmodifieddate": "garbage"}
        });
        let item = Normalizer::hubspot().normalize(&raw, "deals", None, None);

        assert_eq!(item.creation_time.unwrap().timestamp_millis(), 1_700_000_000_000);
        assert!(item.modified_time.is_none());
    }

    #[test]
    fn test_sparse_record_never_fails() {
        let item = Normalizer::hubspot().normalize(&json!({}), "contacts", None, None);
        assert_eq!(item.id, "hubspot/contacts/");
        assert_eq!(item.name, "");
    }
}
