use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::project::{AwardBucket, ProjectRecord, ProjectStatus};

/// Parameters of the remote map search.
///
/// Field names on the wire follow the remote procedure's argument names.
/// Null, absent and empty values are never interchangeable:
///
/// * `min_kwp` / `max_kwp`: always sent, inclusive bounds.
/// * `statuses`: always sent as a list. An empty list means "no status is
///   accepted" and yields no projects; it is never replaced by `null`.
/// * `eegs`: `null` means "no award bucket filter"; a list restricts results
///   to projects whose bucket is in the list.
/// * `completed_after` / `completed_before`: `null` means unbounded,
///   otherwise an inclusive `YYYY-MM-DD` bound on the commissioning date.
/// * `bbox`: `[west, south, east, north]` in WGS84 degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(rename = "min_kwp")]
    pub min_capacity: f64,

    #[serde(rename = "max_kwp")]
    pub max_capacity: f64,

    pub statuses: Vec<ProjectStatus>,

    #[serde(rename = "eegs")]
    pub award_buckets: Option<Vec<AwardBucket>>,

    pub completed_after: Option<NaiveDate>,

    pub completed_before: Option<NaiveDate>,

    pub bbox: [f64; 4],
}

impl SearchRequest {
    /// Evaluate the request against a single record.
    ///
    /// Used by in-memory sources; the remote evaluates the same predicate
    /// server-side. A bounded date window excludes records without a
    /// commissioning date.
    pub fn matches(&self, record: &ProjectRecord) -> bool {
        let [west, south, east, north] = self.bbox;
        if record.lon < west || record.lon > east || record.lat < south || record.lat > north {
            return false;
        }

        if record.capacity_kwp < self.min_capacity || record.capacity_kwp > self.max_capacity {
            return false;
        }

        if !self.statuses.contains(&record.status) {
            return false;
        }

        if let Some(buckets) = &self.award_buckets {
            match record.award_bucket {
                Some(bucket) if buckets.contains(&bucket) => {}
                _ => return false,
            }
        }

        if self.completed_after.is_some() || self.completed_before.is_some() {
            let Some(date) = record.commissioning_date() else {
                return false;
            };
            if self.completed_after.is_some_and(|after| date < after) {
                return false;
            }
            if self.completed_before.is_some_and(|before| date > before) {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::filter::{
        AwardSelection, CapacityRange, DateWindow, FilterState, StatusSelection,
    };
    use crate::models::viewport::BoundingBox;
    use serde_json::json;

    #[test]
    fn test_germany_request_payload() {
        let filter = FilterState::default()
            .with_capacity(CapacityRange::new(10_000.0, 500_000.0).unwrap())
            .with_statuses(StatusSelection::only([ProjectStatus::Operating]));

        let request = filter.to_request(&BoundingBox::GERMANY);
        let payload = serde_json::to_value(&request).unwrap();

        assert_eq!(
            payload,
            json!({
                "min_kwp": 10000.0,
                "max_kwp": 500000.0,
                "statuses": ["operating"],
                "eegs": null,
                "completed_after": null,
                "completed_before": null,
                "bbox": [5.87, 47.27, 15.04, 55.06],
            })
        );
    }

    #[test]
    fn test_empty_status_selection_is_sent_as_empty_list() {
        let filter = FilterState::default().with_statuses(StatusSelection::none());
        let payload = serde_json::to_value(filter.to_request(&BoundingBox::GERMANY)).unwrap();

        assert_eq!(payload["statuses"], json!([]));
        assert!(!payload["statuses"].is_null());
    }

    #[test]
    fn test_all_statuses_are_sent_literally() {
        let payload =
            serde_json::to_value(FilterState::default().to_request(&BoundingBox::GERMANY)).unwrap();
        assert_eq!(payload["statuses"], json!(["operating", "connected", "planned"]));
    }

    #[test]
    fn test_award_buckets_and_dates() {
        let filter = FilterState::default()
            .with_award_buckets(AwardSelection::only([AwardBucket::MerchantLikely]))
            .with_completion(DateWindow::from_inputs("2019-01-01", "").unwrap());
        let payload = serde_json::to_value(filter.to_request(&BoundingBox::GERMANY)).unwrap();

        assert_eq!(payload["eegs"], json!(["merchant_likely"]));
        assert_eq!(payload["completed_after"], json!("2019-01-01"));
        assert!(payload["completed_before"].is_null());
    }

    fn record(status: ProjectStatus, capacity: f64) -> ProjectRecord {
        ProjectRecord::new("r", capacity, status, 10.0, 51.0)
    }

    #[test]
    fn test_matches_statuses_literally() {
        let none = FilterState::default()
            .with_statuses(StatusSelection::none())
            .to_request(&BoundingBox::GERMANY);
        assert!(!none.matches(&record(ProjectStatus::Operating, 50_000.0)));

        let all = FilterState::default().to_request(&BoundingBox::GERMANY);
        assert!(all.matches(&record(ProjectStatus::Planned, 50_000.0)));
    }

    #[test]
    fn test_matches_capacity_and_bbox() {
        let request = FilterState::default()
            .with_capacity(CapacityRange::new(10_000.0, 500_000.0).unwrap())
            .to_request(&BoundingBox::GERMANY);

        assert!(request.matches(&record(ProjectStatus::Operating, 10_000.0)));
        assert!(request.matches(&record(ProjectStatus::Operating, 500_000.0)));
        assert!(!request.matches(&record(ProjectStatus::Operating, 9_999.0)));

        let paris = ProjectRecord::new("paris", 50_000.0, ProjectStatus::Operating, 2.35, 48.85);
        assert!(!request.matches(&paris));
    }

    #[test]
    fn test_matches_buckets_and_dates() {
        let request = FilterState::default()
            .with_award_buckets(AwardSelection::only([AwardBucket::EegAwarded]))
            .with_completion(DateWindow::from_inputs("2020-01-01", "2022-12-31").unwrap())
            .to_request(&BoundingBox::GERMANY);

        let mut r = record(ProjectStatus::Operating, 50_000.0);
        assert!(!request.matches(&r), "no bucket and no date");

        r.award_bucket = Some(AwardBucket::EegAwarded);
        r.completion_date = NaiveDate::from_ymd_opt(2021, 5, 1);
        assert!(request.matches(&r));

        r.completion_date = NaiveDate::from_ymd_opt(2023, 1, 1);
        assert!(!request.matches(&r));

        r.completion_date = None;
        r.planned_date = NaiveDate::from_ymd_opt(2022, 12, 31);
        assert!(request.matches(&r));

        r.award_bucket = Some(AwardBucket::MerchantLikely);
        assert!(!request.matches(&r));
    }
}
