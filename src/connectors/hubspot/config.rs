pub const BASE_URL: &str = "https://api.hubapi.com";
pub const AUTH_URL: &str = "https://app.hubspot.com/oauth/authorize";
pub const TOKEN_URL: &str = "https://api.hubapi.com/oauth/v1/token";
pub const SCOPES: &[&str] = &[
    "oauth",
    "crm.objects.contacts.read",
    "crm.objects.companies.read",
    "crm.objects.deals.read",
];

/// Prefix of every normalized item id.
pub const PROVIDER_TAG: &str = "hubspot";

/// A CRM object type loaded from the v3 objects API.
#[derive(Debug, Clone, Copy)]
pub struct ObjectSpec {
    /// Type tag; also the path segment under `/crm/v3/objects/`
    pub tag: &'static str,
    /// Properties requested with each page
    pub properties: &'static [&'static str],
    /// Associated object type used as the item's parent
    pub parent: Option<&'static str>,
}

impl ObjectSpec {
    pub fn path(&self) -> String {
        format!("/crm/v3/objects/{}", self.tag)
    }

    /// Query parameters for the first page of the listing.
    pub fn query_params(&self, page_size: u32) -> Vec<(String, String)> {
        let mut params = vec![
            ("limit".to_string(), page_size.to_string()),
            ("archived".to_string(), "false".to_string()),
            ("properties".to_string(), self.properties.join(",")),
        ];
        if let Some(parent) = self.parent {
            params.push(("associations".to_string(), parent.to_string()));
        }
        params
    }
}

/// Objects loaded, in order. Parents come before the types that point at them.
pub const OBJECTS: &[ObjectSpec] = &[
    ObjectSpec {
        tag: "companies",
        properties: &["name", "domain", "phone", "createdate", "hs_lastmodifieddate"],
        parent: None,
    },
    ObjectSpec {
        tag: "contacts",
        properties: &[
            "firstname",
            "lastname",
            "email",
            "phone",
            "company",
            "jobtitle",
            "createdate",
            "lastmodifieddate",
        ],
        parent: Some("companies"),
    },
    ObjectSpec {
        tag: "deals",
        properties: &["dealname", "amount", "dealstage", "createdate", "hs_lastmodifieddate"],
        parent: Some("companies"),
    },
];
