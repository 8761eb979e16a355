//! Lead models and DTOs.

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

use crate::utils::{format_timestamp, TimeInput};
use crate::validation::{
    normalize_email, normalize_optional, validate_email, validate_lead_value, validate_max_len,
    validate_required, validate_score, FieldErrors, MAX_COMPANY_LEN, MAX_NAME_LEN, MAX_PHONE_LEN,
    MAX_PLACE_LEN,
};

/// Where a lead came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LeadSource {
    #[default]
    Website,
    FacebookAds,
    GoogleAds,
    Referral,
    Events,
    Other,
}

impl LeadSource {
    pub const ALL: [LeadSource; 6] = [
        Self::Website,
        Self::FacebookAds,
        Self::GoogleAds,
        Self::Referral,
        Self::Events,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::FacebookAds => "facebook_ads",
            Self::GoogleAds => "google_ads",
            Self::Referral => "referral",
            Self::Events => "events",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for LeadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LeadSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Source must be one of: {}",
                    Self::ALL.map(|s| s.as_str()).join(", ")
                )
            })
    }
}

/// Pipeline stage of a lead
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Lost,
    Won,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        Self::New,
        Self::Contacted,
        Self::Qualified,
        Self::Lost,
        Self::Won,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Lost => "lost",
            Self::Won => "won",
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Status must be one of: {}",
                    Self::ALL.map(|s| s.as_str()).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub score: i64,
    pub lead_value: f64,
    pub last_activity_at: Option<String>,
    pub is_qualified: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// The writable fields of a lead, before or after normalisation
#[derive(Debug, Clone, PartialEq)]
pub struct LeadDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub source: LeadSource,
    pub status: LeadStatus,
    pub score: i64,
    pub lead_value: f64,
    pub last_activity_at: Option<String>,
    pub is_qualified: bool,
}

impl LeadDraft {
    /// Trim text, lowercase the email, canonicalise `last_activity_at` and
    /// check every field constraint. All failures are reported together.
    pub fn validated(self) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        let email = normalize_email(&self.email);
        let phone = normalize_optional(self.phone);
        let company = normalize_optional(self.company);
        let city = normalize_optional(self.city);
        let state = normalize_optional(self.state);

        errors.check(
            "first_name",
            validate_required(&first_name, "First name", MAX_NAME_LEN),
        );
        errors.check(
            "last_name",
            validate_required(&last_name, "Last name", MAX_NAME_LEN),
        );
        errors.check("email", validate_email(&email));
        if let Some(phone) = &phone {
            errors.check("phone", validate_max_len(phone, "Phone number", MAX_PHONE_LEN));
        }
        if let Some(company) = &company {
            errors.check(
                "company",
                validate_max_len(company, "Company name", MAX_COMPANY_LEN),
            );
        }
        if let Some(city) = &city {
            errors.check("city", validate_max_len(city, "City name", MAX_PLACE_LEN));
        }
        if let Some(state) = &state {
            errors.check("state", validate_max_len(state, "State name", MAX_PLACE_LEN));
        }
        errors.check("score", validate_score(self.score));
        errors.check("lead_value", validate_lead_value(self.lead_value));

        let last_activity_at = match normalize_optional(self.last_activity_at) {
            Some(raw) => match TimeInput::parse(&raw) {
                Some(input) => Some(format_timestamp(input.start())),
                None => {
                    errors.add(
                        "last_activity_at",
                        "Last activity must be a date (YYYY-MM-DD) or an RFC 3339 timestamp",
                    );
                    None
                }
            },
            None => None,
        };

        errors.finish()?;

        Ok(Self {
            first_name,
            last_name,
            email,
            phone,
            company,
            city,
            state,
            source: self.source,
            status: self.status,
            score: self.score,
            lead_value: self.lead_value,
            last_activity_at,
            is_qualified: self.is_qualified,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLeadRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub source: Option<LeadSource>,
    pub status: Option<LeadStatus>,
    pub score: Option<i64>,
    pub lead_value: Option<f64>,
    pub last_activity_at: Option<String>,
    pub is_qualified: Option<bool>,
}

impl From<CreateLeadRequest> for LeadDraft {
    fn from(req: CreateLeadRequest) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone: req.phone,
            company: req.company,
            city: req.city,
            state: req.state,
            source: req.source.unwrap_or_default(),
            status: req.status.unwrap_or_default(),
            score: req.score.unwrap_or(0),
            lead_value: req.lead_value.unwrap_or(0.0),
            last_activity_at: req.last_activity_at,
            is_qualified: req.is_qualified.unwrap_or(false),
        }
    }
}

/// Partial update: absent fields keep their stored value.
///
/// `last_activity_at: null` clears the timestamp; an empty string clears the
/// optional text fields.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateLeadRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub source: Option<LeadSource>,
    pub status: Option<LeadStatus>,
    pub score: Option<i64>,
    pub lead_value: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub last_activity_at: Option<Option<String>>,
    pub is_qualified: Option<bool>,
}

/// Distinguish an explicit `null` (`Some(None)`) from a missing key (`None`)
fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl Lead {
    /// Overlay an update onto the stored record
    pub fn merged(&self, update: UpdateLeadRequest) -> LeadDraft {
        LeadDraft {
            first_name: update.first_name.unwrap_or_else(|| self.first_name.clone()),
            last_name: update.last_name.unwrap_or_else(|| self.last_name.clone()),
            email: update.email.unwrap_or_else(|| self.email.clone()),
            phone: update.phone.or_else(|| self.phone.clone()),
            company: update.company.or_else(|| self.company.clone()),
            city: update.city.or_else(|| self.city.clone()),
            state: update.state.or_else(|| self.state.clone()),
            source: update.source.unwrap_or(self.source),
            status: update.status.unwrap_or(self.status),
            score: update.score.unwrap_or(self.score),
            lead_value: update.lead_value.unwrap_or(self.lead_value),
            last_activity_at: match update.last_activity_at {
                Some(value) => value,
                None => self.last_activity_at.clone(),
            },
            is_qualified: update.is_qualified.unwrap_or(self.is_qualified),
        }
    }
}

/// Envelope for single-lead responses
#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub lead: Lead,
}

/// Paginated lead listing
#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub leads: Vec<Lead>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateLeadRequest {
        serde_json::from_value(serde_json::json!({
            "first_name": "  Ada ",
            "last_name": "Lovelace",
            "email": " Ada@Example.COM ",
            "company": "Analytical Engines",
            "score": 42
        }))
        .unwrap()
    }

    #[test]
    fn test_create_defaults_and_normalization() {
        let draft = LeadDraft::from(request()).validated().unwrap();
        assert_eq!(draft.first_name, "Ada");
        assert_eq!(draft.email, "ada@example.com");
        assert_eq!(draft.source, LeadSource::Website);
        assert_eq!(draft.status, LeadStatus::New);
        assert_eq!(draft.score, 42);
        assert_eq!(draft.lead_value, 0.0);
        assert!(!draft.is_qualified);
        assert!(draft.last_activity_at.is_none());
    }

    #[test]
    fn test_validation_collects_all_fields() {
        let req: CreateLeadRequest = serde_json::from_value(serde_json::json!({
            "email": "nope",
            "score": 101,
            "lead_value": -5.0,
            "phone": "0".repeat(21),
            "last_activity_at": "last tuesday"
        }))
        .unwrap();

        let errors = LeadDraft::from(req).validated().unwrap_err();
        for field in [
            "first_name",
            "last_name",
            "email",
            "score",
            "lead_value",
            "phone",
            "last_activity_at",
        ] {
            assert!(errors.get(field).is_some(), "expected error for {}", field);
        }
    }

    #[test]
    fn test_last_activity_is_canonicalized() {
        let mut draft = LeadDraft::from(request());
        draft.last_activity_at = Some("2024-05-01".to_string());
        let draft = draft.validated().unwrap();
        assert_eq!(
            draft.last_activity_at.as_deref(),
            Some("2024-05-01T00:00:00.000000Z")
        );
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<CreateLeadRequest, _> = serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "nickname": "Countess"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_string_score_rejected() {
        let result: Result<CreateLeadRequest, _> = serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "score": "abc"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("google_ads".parse::<LeadSource>(), Ok(LeadSource::GoogleAds));
        assert_eq!("won".parse::<LeadStatus>(), Ok(LeadStatus::Won));
        assert!("tv".parse::<LeadSource>().is_err());
        assert!("Won".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn test_update_null_vs_missing_activity() {
        let cleared: UpdateLeadRequest =
            serde_json::from_value(serde_json::json!({ "last_activity_at": null })).unwrap();
        assert_eq!(cleared.last_activity_at, Some(None));

        let untouched: UpdateLeadRequest =
            serde_json::from_value(serde_json::json!({ "score": 5 })).unwrap();
        assert_eq!(untouched.last_activity_at, None);
    }

    #[test]
    fn test_merge_keeps_unspecified_fields() {
        let lead = Lead {
            id: "id".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: Some("555".to_string()),
            company: None,
            city: Some("London".to_string()),
            state: None,
            source: LeadSource::Referral,
            status: LeadStatus::Contacted,
            score: 10,
            lead_value: 99.5,
            last_activity_at: Some("2024-01-01T00:00:00.000000Z".to_string()),
            is_qualified: true,
            created_at: "2024-01-01T00:00:00.000000Z".to_string(),
            updated_at: "2024-01-01T00:00:00.000000Z".to_string(),
        };

        let update = UpdateLeadRequest {
            status: Some(LeadStatus::Won),
            phone: Some(String::new()),
            last_activity_at: Some(None),
            ..Default::default()
        };

        let draft = lead.merged(update).validated().unwrap();
        assert_eq!(draft.status, LeadStatus::Won);
        assert_eq!(draft.source, LeadSource::Referral);
        assert_eq!(draft.city.as_deref(), Some("London"));
        assert_eq!(draft.phone, None);
        assert_eq!(draft.last_activity_at, None);
        assert_eq!(draft.lead_value, 99.5);
        assert!(draft.is_qualified);
    }
}
