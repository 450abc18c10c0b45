use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PvMapError;

/// Stable identifier of a project as assigned by the remote source
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Operating,
    Connected,
    Planned,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 3] =
        [ProjectStatus::Operating, ProjectStatus::Connected, ProjectStatus::Planned];

    /// Wire name used by the remote search contract
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Operating => "operating",
            ProjectStatus::Connected => "connected",
            ProjectStatus::Planned => "planned",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = PvMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "operating" => Ok(ProjectStatus::Operating),
            "connected" => Ok(ProjectStatus::Connected),
            "planned" => Ok(ProjectStatus::Planned),
            other => Err(PvMapError::InvalidFilter {
                field: "status".to_string(),
                reason: format!("Unknown status '{}'. Use operating, connected, or planned", other),
            }),
        }
    }
}

/// Award category supplied by the remote source.
///
/// Membership is decided upstream from auction-award data; it is never
/// computed locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardBucket {
    EegAwarded,
    MerchantLikely,
}

impl AwardBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            AwardBucket::EegAwarded => "eeg_awarded",
            AwardBucket::MerchantLikely => "merchant_likely",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            AwardBucket::EegAwarded => "EEG Awarded",
            AwardBucket::MerchantLikely => "Merchant Likely",
        }
    }
}

impl fmt::Display for AwardBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AwardBucket {
    type Err = PvMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "eeg_awarded" | "eeg" => Ok(AwardBucket::EegAwarded),
            "merchant_likely" | "merchant" => Ok(AwardBucket::MerchantLikely),
            other => Err(PvMapError::InvalidFilter {
                field: "award_bucket".to_string(),
                reason: format!("Unknown award bucket '{}'. Use eeg_awarded or merchant_likely", other),
            }),
        }
    }
}

/// A geo-located project as returned by the map search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Unique identifier
    pub id: ProjectId,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Installed or planned capacity in kWp
    pub capacity_kwp: f64,

    /// Lifecycle status
    pub status: ProjectStatus,

    /// Date the project was completed
    #[serde(default, deserialize_with = "deserialize_date")]
    pub completion_date: Option<NaiveDate>,

    /// Date the project is planned to be completed
    #[serde(default, deserialize_with = "deserialize_date")]
    pub planned_date: Option<NaiveDate>,

    /// Award category, if the remote assigned one
    #[serde(default, rename = "eeg_bucket")]
    pub award_bucket: Option<AwardBucket>,

    #[serde(default, alias = "operator_name")]
    pub operator: Option<String>,

    #[serde(default, alias = "grid_operator_name")]
    pub grid_operator: Option<String>,

    #[serde(default)]
    pub contact_name: Option<String>,

    #[serde(default)]
    pub contact_email: Option<String>,

    #[serde(default)]
    pub contact_phone: Option<String>,

    /// Longitude in WGS84 degrees
    pub lon: f64,

    /// Latitude in WGS84 degrees
    pub lat: f64,
}

impl ProjectRecord {
    /// Create a record with only the required fields set
    pub fn new(
        id: impl Into<String>,
        capacity_kwp: f64,
        status: ProjectStatus,
        lon: f64,
        lat: f64,
    ) -> Self {
        Self {
            id: ProjectId::new(id),
            name: String::new(),
            capacity_kwp,
            status,
            completion_date: None,
            planned_date: None,
            award_bucket: None,
            operator: None,
            grid_operator: None,
            contact_name: None,
            contact_email: None,
            contact_phone: None,
            lon,
            lat,
        }
    }

    /// Commissioning date: the completion date, or the planned date when not yet completed
    pub fn commissioning_date(&self) -> Option<NaiveDate> {
        self.completion_date.or(self.planned_date)
    }

    /// Check that the coordinates are finite WGS84 degrees
    pub fn has_valid_location(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// Full project view used by the detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub record: ProjectRecord,

    #[serde(default)]
    pub address_line: Option<String>,

    #[serde(default)]
    pub postal_code: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub country: Option<String>,

    #[serde(default)]
    pub eeg_award_id: Option<String>,

    #[serde(default)]
    pub eeg_auction_round: Option<String>,

    #[serde(default)]
    pub eeg_reference_price_ct_per_kwh: Option<f64>,
}

impl From<ProjectRecord> for ProjectDetail {
    fn from(record: ProjectRecord) -> Self {
        Self {
            record,
            address_line: None,
            postal_code: None,
            city: None,
            state: None,
            country: None,
            eeg_award_id: None,
            eeg_auction_round: None,
            eeg_reference_price_ct_per_kwh: None,
        }
    }
}

/// Accept both plain dates and timestamps; only the calendar date is kept.
fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => {
            let date_part = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
                .map(Some)
                .map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_search_row() {
        let json = r#"{
            "id": "p-1",
            "name": "Solarpark Nord",
            "capacity_kwp": 12500.5,
            "status": "operating",
            "completion_date": "2021-06-30",
            "operator": "Acme Energy",
            "grid_operator": null,
            "lon": 10.45,
            "lat": 51.16
        }"#;

        let record: ProjectRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id.as_str(), "p-1");
        assert_eq!(record.status, ProjectStatus::Operating);
        assert_eq!(record.completion_date, NaiveDate::from_ymd_opt(2021, 6, 30));
        assert_eq!(record.operator.as_deref(), Some("Acme Energy"));
        assert!(record.grid_operator.is_none());
        assert!(record.award_bucket.is_none());
    }

    #[test]
    fn test_deserialize_detail_row() {
        let json = r#"{
            "id": "p-2",
            "name": "Freiflaeche Sued",
            "capacity_kwp": 48000,
            "status": "planned",
            "completion_date": null,
            "planned_date": "2026-03-01T00:00:00+00:00",
            "eeg_bucket": "eeg_awarded",
            "operator_name": "Sunfield GmbH",
            "grid_operator_name": "Netz BW",
            "city": "Freiburg",
            "eeg_reference_price_ct_per_kwh": 5.12,
            "lon": 7.85,
            "lat": 47.99
        }"#;

        let detail: ProjectDetail = serde_json::from_str(json).unwrap();
        assert_eq!(detail.record.award_bucket, Some(AwardBucket::EegAwarded));
        assert_eq!(detail.record.operator.as_deref(), Some("Sunfield GmbH"));
        assert_eq!(detail.record.grid_operator.as_deref(), Some("Netz BW"));
        assert_eq!(detail.record.planned_date, NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(detail.record.commissioning_date(), NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(detail.city.as_deref(), Some("Freiburg"));
        assert_eq!(detail.eeg_reference_price_ct_per_kwh, Some(5.12));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Operating".parse::<ProjectStatus>().unwrap(), ProjectStatus::Operating);
        assert_eq!(" planned ".parse::<ProjectStatus>().unwrap(), ProjectStatus::Planned);
        assert!("decommissioned".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn test_award_bucket_parsing() {
        assert_eq!("eeg-awarded".parse::<AwardBucket>().unwrap(), AwardBucket::EegAwarded);
        assert_eq!("merchant".parse::<AwardBucket>().unwrap(), AwardBucket::MerchantLikely);
        assert!("other".parse::<AwardBucket>().is_err());
    }

    #[test]
    fn test_valid_location() {
        let ok = ProjectRecord::new("a", 100.0, ProjectStatus::Planned, 10.0, 51.0);
        assert!(ok.has_valid_location());

        let out_of_range = ProjectRecord::new("b", 100.0, ProjectStatus::Planned, 200.0, 51.0);
        assert!(!out_of_range.has_valid_location());

        let nan = ProjectRecord::new("c", 100.0, ProjectStatus::Planned, f64::NAN, 51.0);
        assert!(!nan.has_valid_location());
    }
}
