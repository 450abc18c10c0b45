use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::project::{AwardBucket, ProjectStatus};
use super::request::SearchRequest;
use super::viewport::BoundingBox;
use crate::error::{PvMapError, Result};

/// Inclusive capacity bounds in kWp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityRange {
    pub min_kwp: f64,
    pub max_kwp: f64,
}

impl CapacityRange {
    /// Lower end of the capacity slider
    pub const SLIDER_MIN_KWP: f64 = 10_000.0;
    /// Upper end of the capacity slider
    pub const SLIDER_MAX_KWP: f64 = 2_000_000.0;

    pub fn new(min_kwp: f64, max_kwp: f64) -> Result<Self> {
        if !min_kwp.is_finite() || !max_kwp.is_finite() {
            return Err(PvMapError::InvalidFilter {
                field: "capacity".to_string(),
                reason: "bounds must be finite numbers".to_string(),
            });
        }
        if min_kwp < 0.0 {
            return Err(PvMapError::InvalidFilter {
                field: "capacity".to_string(),
                reason: format!("lower bound {} is negative", min_kwp),
            });
        }
        if min_kwp > max_kwp {
            return Err(PvMapError::InvalidFilter {
                field: "capacity".to_string(),
                reason: format!("lower bound {} exceeds upper bound {}", min_kwp, max_kwp),
            });
        }
        Ok(Self { min_kwp, max_kwp })
    }

    pub fn contains(&self, capacity_kwp: f64) -> bool {
        capacity_kwp >= self.min_kwp && capacity_kwp <= self.max_kwp
    }
}

impl Default for CapacityRange {
    fn default() -> Self {
        Self { min_kwp: Self::SLIDER_MIN_KWP, max_kwp: Self::SLIDER_MAX_KWP }
    }
}

/// Accepted project statuses.
///
/// An empty selection is a real filter that matches nothing; it is never
/// widened to "all statuses".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSelection(BTreeSet<ProjectStatus>);

impl StatusSelection {
    pub fn all() -> Self {
        Self(ProjectStatus::ALL.into_iter().collect())
    }

    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn only(statuses: impl IntoIterator<Item = ProjectStatus>) -> Self {
        Self(statuses.into_iter().collect())
    }

    /// Return a copy with `status` switched on or off
    pub fn with(&self, status: ProjectStatus, selected: bool) -> Self {
        let mut set = self.0.clone();
        if selected {
            set.insert(status);
        } else {
            set.remove(&status);
        }
        Self(set)
    }

    pub fn contains(&self, status: ProjectStatus) -> bool {
        self.0.contains(&status)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_all(&self) -> bool {
        self.0.len() == ProjectStatus::ALL.len()
    }

    /// Selected statuses in declaration order
    pub fn iter(&self) -> impl Iterator<Item = ProjectStatus> + '_ {
        self.0.iter().copied()
    }
}

impl Default for StatusSelection {
    fn default() -> Self {
        Self::all()
    }
}

/// Accepted award buckets; an empty selection applies no bucket filter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardSelection(BTreeSet<AwardBucket>);

impl AwardSelection {
    pub fn unfiltered() -> Self {
        Self(BTreeSet::new())
    }

    pub fn only(buckets: impl IntoIterator<Item = AwardBucket>) -> Self {
        Self(buckets.into_iter().collect())
    }

    pub fn with(&self, bucket: AwardBucket, selected: bool) -> Self {
        let mut set = self.0.clone();
        if selected {
            set.insert(bucket);
        } else {
            set.remove(&bucket);
        }
        Self(set)
    }

    pub fn is_unfiltered(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AwardBucket> + '_ {
        self.0.iter().copied()
    }
}

/// Commissioning date window; `None` on either side is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub after: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl DateWindow {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Parse the two date inputs of the filter panel.
    ///
    /// Empty strings map to an open bound rather than an invalid date.
    pub fn from_inputs(after: &str, before: &str) -> Result<Self> {
        Ok(Self {
            after: parse_date_input("completed_after", after)?,
            before: parse_date_input("completed_before", before)?,
        })
    }
}

fn parse_date_input(field: &str, value: &str) -> Result<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map(Some).map_err(|e| {
        PvMapError::InvalidFilter {
            field: field.to_string(),
            reason: format!("'{}' is not a YYYY-MM-DD date: {}", value, e),
        }
    })
}

/// The complete filter predicate of the map.
///
/// Every change produces a new value; the coordinator only ever sees whole
/// filter states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub capacity: CapacityRange,
    pub statuses: StatusSelection,
    pub award_buckets: AwardSelection,
    pub completion: DateWindow,
}

impl FilterState {
    pub fn with_capacity(mut self, capacity: CapacityRange) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_statuses(mut self, statuses: StatusSelection) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn with_award_buckets(mut self, award_buckets: AwardSelection) -> Self {
        self.award_buckets = award_buckets;
        self
    }

    pub fn with_completion(mut self, completion: DateWindow) -> Self {
        self.completion = completion;
        self
    }

    /// Translate into the remote search contract for the given region
    pub fn to_request(&self, bbox: &BoundingBox) -> SearchRequest {
        SearchRequest {
            min_capacity: self.capacity.min_kwp,
            max_capacity: self.capacity.max_kwp,
            statuses: self.statuses.iter().collect(),
            award_buckets: if self.award_buckets.is_unfiltered() {
                None
            } else {
                Some(self.award_buckets.iter().collect())
            },
            completed_after: self.completion.after,
            completed_before: self.completion.before,
            bbox: bbox.to_array(),
        }
    }
}
