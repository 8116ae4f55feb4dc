//! Filter construction for pose queries.

use crate::error::ValidationError;
use crate::store_time::{to_store_datetime, DEFAULT_STORE_TIME_ZONE};
use bson::{doc, Bson, Document};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

pub const INFERENCE_RUN_ID_FIELD: &str = "metadata.inference_run_id";
pub const ENVIRONMENT_ID_FIELD: &str = "metadata.environment_id";
pub const CAMERA_ID_FIELD: &str = "metadata.camera_device_id";
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Filter criteria for pose queries.
///
/// Every criterion is optional and an absent one imposes no constraint; the
/// supplied ones are combined with a logical AND. `start` is inclusive and
/// `end` exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseQuery {
    /// Match any of these inference runs
    pub inference_run_ids: Option<Vec<String>>,
    /// Match this environment
    pub environment_id: Option<String>,
    /// Match any of these cameras
    pub camera_ids: Option<Vec<String>>,
    /// Earliest timestamp (inclusive)
    pub start: Option<DateTime<Utc>>,
    /// Latest timestamp (exclusive)
    pub end: Option<DateTime<Utc>>,
    /// Zone the stored timestamps were written in, UTC when unset
    pub store_time_zone: Option<Tz>,
}

impl PoseQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inference_run_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inference_run_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn environment_id(mut self, id: impl Into<String>) -> Self {
        self.environment_id = Some(id.into());
        self
    }

    pub fn camera_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.camera_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn start<Z: TimeZone>(mut self, start: DateTime<Z>) -> Self {
        self.start = Some(start.with_timezone(&Utc));
        self
    }

    pub fn end<Z: TimeZone>(mut self, end: DateTime<Z>) -> Self {
        self.end = Some(end.with_timezone(&Utc));
        self
    }

    pub fn store_time_zone(mut self, tz: Tz) -> Self {
        self.store_time_zone = Some(tz);
        self
    }

    /// Effective store time zone
    pub fn time_zone(&self) -> Tz {
        self.store_time_zone.unwrap_or(DEFAULT_STORE_TIME_ZONE)
    }

    /// Build the store filter predicate.
    ///
    /// Identifiers are parsed as UUIDs; an unparsable one is an error rather
    /// than a dropped constraint. Time bounds are shifted into the store time
    /// zone and stripped of their zone before comparison.
    pub fn build_filter(&self) -> Result<Document, ValidationError> {
        let mut filter = Document::new();

        if let Some(ids) = &self.inference_run_ids {
            filter.insert(
                INFERENCE_RUN_ID_FIELD,
                doc! { "$in": parse_identifiers("inference_run_ids", ids)? },
            );
        }

        if let Some(id) = &self.environment_id {
            filter.insert(ENVIRONMENT_ID_FIELD, parse_identifier("environment_id", id)?);
        }

        if let Some(ids) = &self.camera_ids {
            filter.insert(
                CAMERA_ID_FIELD,
                doc! { "$in": parse_identifiers("camera_ids", ids)? },
            );
        }

        if self.start.is_some() || self.end.is_some() {
            let tz = self.time_zone();
            let mut range = Document::new();
            if let Some(start) = &self.start {
                range.insert("$gte", to_store_datetime(start, tz));
            }
            if let Some(end) = &self.end {
                range.insert("$lt", to_store_datetime(end, tz));
            }
            filter.insert(TIMESTAMP_FIELD, range);
        }

        Ok(filter)
    }
}

fn parse_identifier(field: &str, value: &str) -> Result<Bson, ValidationError> {
    Uuid::parse_str(value)
        .map(|uuid| Bson::from(bson::Uuid::from_bytes(uuid.into_bytes())))
        .map_err(|_| ValidationError::InvalidIdentifier {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn parse_identifiers(field: &str, values: &[String]) -> Result<Vec<Bson>, ValidationError> {
    values
        .iter()
        .map(|value| parse_identifier(field, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    const RUN_A: &str = "5f0c6a8e-4b7e-4c59-9d0e-2f7f3d1f4a11";
    const RUN_B: &str = "0b9a4b1e-7c6d-4f2b-8a31-6b1d2e3f4a5b";

    fn uuid_bson(s: &str) -> Bson {
        Bson::from(bson::Uuid::parse_str(s).unwrap())
    }

    #[test]
    fn test_open_query_is_empty_filter() {
        let filter = PoseQuery::new().build_filter().unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_identifier_constraints() {
        let filter = PoseQuery::new()
            .inference_run_ids([RUN_A, RUN_B])
            .environment_id(RUN_B)
            .camera_ids(vec![RUN_A.to_string()])
            .build_filter()
            .unwrap();

        assert_eq!(
            filter,
            doc! {
                INFERENCE_RUN_ID_FIELD: { "$in": [uuid_bson(RUN_A), uuid_bson(RUN_B)] },
                ENVIRONMENT_ID_FIELD: uuid_bson(RUN_B),
                CAMERA_ID_FIELD: { "$in": [uuid_bson(RUN_A)] },
            }
        );
    }

    #[test]
    fn test_unparsable_identifier_is_error() {
        let err = PoseQuery::new()
            .camera_ids([RUN_A, "camera-7"])
            .build_filter()
            .unwrap_err();

        assert_eq!(
            err,
            ValidationError::InvalidIdentifier {
                field: "camera_ids".to_string(),
                value: "camera-7".to_string(),
            }
        );
    }

    #[test]
    fn test_time_range_bounds() {
        let start = Utc.with_ymd_and_hms(2023, 6, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 6, 1, 10, 0, 0).unwrap();

        let filter = PoseQuery::new().start(start).end(end).build_filter().unwrap();
        let range = filter.get_document(TIMESTAMP_FIELD).unwrap();

        assert_eq!(range.get_datetime("$gte").unwrap().to_chrono(), start);
        assert_eq!(range.get_datetime("$lt").unwrap().to_chrono(), end);
        assert!(!range.contains_key("$lte"));
        assert!(!range.contains_key("$gt"));
    }

    #[test]
    fn test_single_bound() {
        let start = Utc.with_ymd_and_hms(2023, 6, 1, 9, 0, 0).unwrap();
        let filter = PoseQuery::new().start(start).build_filter().unwrap();
        let range = filter.get_document(TIMESTAMP_FIELD).unwrap();

        assert_eq!(range.len(), 1);
        assert!(range.contains_key("$gte"));
    }

    #[test]
    fn test_bounds_shifted_into_store_time_zone() {
        // 09:00 at UTC-05:00 is 14:00 UTC, which is 07:00 in Los Angeles (PDT)
        let start = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 6, 1, 9, 0, 0)
            .unwrap();

        let query = PoseQuery::new()
            .start(start)
            .store_time_zone(chrono_tz::America::Los_Angeles);
        let filter = query.build_filter().unwrap();
        let stored = filter
            .get_document(TIMESTAMP_FIELD)
            .unwrap()
            .get_datetime("$gte")
            .unwrap()
            .to_chrono();

        assert_eq!(stored.naive_utc().to_string(), "2023-06-01 07:00:00");
        assert_eq!(query.time_zone(), chrono_tz::America::Los_Angeles);
    }

    #[test]
    fn test_default_time_zone_is_utc() {
        assert_eq!(PoseQuery::new().time_zone(), Tz::UTC);
    }
}
