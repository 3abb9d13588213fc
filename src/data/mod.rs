//! Core data models for the SOS feed
//!
//! This module contains the record types delivered by the upstream feed and
//! the helpers the derived views use to read them. The wire layout is fixed
//! by the upstream publisher; every field defaults when absent or `null`.

pub mod feed;

pub use feed::{FetchError, FetchOutcome, Fetcher, HttpFetcher, DEFAULT_FEED_URL, FETCH_TIMEOUT};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Deserializes `null` as the type's default value
///
/// The upstream feed emits `null` for unset strings and counts, which plain
/// `#[serde(default)]` only covers for missing keys.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Like [`nullable`], also defaulting `null` elements inside the sequence
fn nullable_elements<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let items = Option::<Vec<Option<T>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items.into_iter().map(Option::unwrap_or_default).collect())
}

/// A complete snapshot of the upstream feed
///
/// The unit of caching and revalidation: a new fetch replaces the whole
/// collection, records are never patched individually.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// When the publisher generated this snapshot
    #[serde(default, deserialize_with = "nullable")]
    pub fetched_at: String,
    /// Envelope around the record list
    #[serde(default, deserialize_with = "nullable")]
    pub data: RecordList,
}

impl Dataset {
    /// Returns the records in delivery order
    pub fn records(&self) -> &[Record] {
        &self.data.data
    }
}

/// The nested `data.data` array of the feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordList {
    #[serde(default, deserialize_with = "nullable")]
    pub data: Vec<Record>,
}

/// One emergency / SOS report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Upstream identifier
    #[serde(rename = "_id", default, deserialize_with = "nullable")]
    pub id: String,
    /// Location feature carrying the report details
    #[serde(default, deserialize_with = "nullable")]
    pub location: Location,
    /// Human-facing ticket number
    #[serde(default, deserialize_with = "nullable")]
    pub running_number: String,
    /// Last update of the report (ISO-8601)
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Creation of the report (ISO-8601)
    #[serde(default)]
    pub created_at: Option<String>,
}

/// GeoJSON-style feature wrapping a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable")]
    pub properties: Properties,
    #[serde(default, deserialize_with = "nullable")]
    pub geometry: Geometry,
}

/// Report details as filed by the requester
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    /// Free-text notes
    #[serde(default, deserialize_with = "nullable")]
    pub other: String,
    /// Victim entries; only their count is used
    #[serde(default, deserialize_with = "nullable")]
    pub victims: Vec<serde_json::Value>,
    /// Structured patient count; zero or negative means unknown
    #[serde(default, deserialize_with = "nullable")]
    pub patient: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub province: String,
    #[serde(default, deserialize_with = "nullable")]
    pub district: String,
    #[serde(default, deserialize_with = "nullable")]
    pub subdistrict: String,
    /// Severity level summary, 1 to 4 (most severe); anything else is unrated
    #[serde(default, deserialize_with = "nullable")]
    pub sick_level_summary: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub running_number: String,
    #[serde(default, deserialize_with = "nullable")]
    pub status_text: String,
    #[serde(default, deserialize_with = "nullable")]
    pub type_name: String,
    /// Comma or space delimited ages of the people involved
    #[serde(default, deserialize_with = "nullable")]
    pub ages: String,
    /// Chronic disease free text
    #[serde(default, deserialize_with = "nullable")]
    pub disease: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Point geometry, coordinates in `[longitude, latitude]` order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,
    #[serde(default, deserialize_with = "nullable_elements")]
    pub coordinates: Vec<f64>,
}

impl Record {
    pub fn province(&self) -> &str {
        &self.location.properties.province
    }

    pub fn district(&self) -> &str {
        &self.location.properties.district
    }

    pub fn subdistrict(&self) -> &str {
        &self.location.properties.subdistrict
    }

    /// Returns `(latitude, longitude)` when the geometry carries both values
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        match self.location.geometry.coordinates.as_slice() {
            [lon, lat, ..] => Some((*lat, *lon)),
            _ => None,
        }
    }

    /// Most recent update time of the report
    ///
    /// Prefers the top-level `updated_at`, then the one filed with the
    /// properties. Returns `None` when neither parses.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.updated_at
            .as_deref()
            .and_then(parse_timestamp)
            .or_else(|| {
                self.location
                    .properties
                    .updated_at
                    .as_deref()
                    .and_then(parse_timestamp)
            })
    }
}

/// Parses an RFC 3339 timestamp (fractional seconds allowed)
///
/// # Returns
/// * `Some(DateTime<Utc>)` when the trimmed input is a valid timestamp
/// * `None` for blank or malformed input
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
        "fetched_at": "2025-11-26T08:00:00Z",
        "data": {
            "data": [
                {
                    "_id": "abc123",
                    "running_number": "SOS-0001",
                    "updated_at": "2025-11-26T07:30:00.123Z",
                    "created_at": null,
                    "location": {
                        "type": "Feature",
                        "properties": {
                            "other": "water rising",
                            "victims": [{"name": "a"}, {"name": "b"}],
                            "patient": 0,
                            "province": "Songkhla",
                            "district": "Hat Yai",
                            "subdistrict": "Kho Hong",
                            "sick_level_summary": 3,
                            "ages": "72, 40",
                            "disease": null,
                            "updated_at": "2025-11-26T07:00:00+07:00"
                        },
                        "geometry": {
                            "type": "Point",
                            "coordinates": [100.47, 7.0]
                        }
                    }
                }
            ]
        }
    }"#;

    #[test]
    fn test_dataset_parses_nested_feed_layout() {
        let dataset: Dataset = serde_json::from_str(SAMPLE).expect("sample should parse");

        assert_eq!(dataset.fetched_at, "2025-11-26T08:00:00Z");
        assert_eq!(dataset.records().len(), 1);

        let record = &dataset.records()[0];
        assert_eq!(record.id, "abc123");
        assert_eq!(record.province(), "Songkhla");
        assert_eq!(record.district(), "Hat Yai");
        assert_eq!(record.subdistrict(), "Kho Hong");
        assert_eq!(record.location.properties.victims.len(), 2);
        assert_eq!(record.location.properties.sick_level_summary, 3);
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let record: Record = serde_json::from_str(
            r#"{"_id": null, "location": {"properties": {"province": null, "patient": null}}}"#,
        )
        .expect("nulls should be tolerated");

        assert_eq!(record.id, "");
        assert_eq!(record.province(), "");
        assert_eq!(record.location.properties.patient, 0);
        assert!(record.lat_lon().is_none());
    }

    #[test]
    fn test_out_of_range_values_keep_the_dataset() {
        let feed = r#"{"data": {"data": [
            {"_id": "ok", "location": {"properties": {"patient": 2, "sick_level_summary": 3},
                "geometry": {"coordinates": [100.47, 7.0]}}},
            {"_id": "odd", "location": {"properties": {"patient": -1, "sick_level_summary": 300},
                "geometry": {"coordinates": [null, 7.0]}}}
        ]}}"#;

        let dataset: Dataset = serde_json::from_str(feed).expect("odd record must not reject the feed");

        assert_eq!(dataset.records().len(), 2);
        let odd = &dataset.records()[1].location;
        assert_eq!(odd.properties.patient, -1);
        assert_eq!(odd.properties.sick_level_summary, 300);
        assert_eq!(odd.geometry.coordinates, vec![0.0, 7.0]);
    }

    #[test]
    fn test_lat_lon_swaps_delivery_order() {
        let dataset: Dataset = serde_json::from_str(SAMPLE).unwrap();
        let (lat, lon) = dataset.records()[0].lat_lon().unwrap();
        assert!((lat - 7.0).abs() < f64::EPSILON);
        assert!((lon - 100.47).abs() < f64::EPSILON);
    }

    #[test]
    fn test_last_update_prefers_top_level_timestamp() {
        let dataset: Dataset = serde_json::from_str(SAMPLE).unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 11, 26, 7, 30, 0).unwrap()
            + chrono::Duration::milliseconds(123);
        assert_eq!(dataset.records()[0].last_update(), Some(expected));
    }

    #[test]
    fn test_last_update_falls_back_to_properties() {
        let mut record = Record::default();
        record.updated_at = Some("not a date".to_string());
        record.location.properties.updated_at = Some("2025-11-26T07:00:00+07:00".to_string());

        let expected = Utc.with_ymd_and_hms(2025, 11, 26, 0, 0, 0).unwrap();
        assert_eq!(record.last_update(), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_rejects_blank_and_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("   ").is_none());
        assert!(parse_timestamp("2025-13-40").is_none());
        assert!(parse_timestamp(" 2025-11-26T00:00:00Z ").is_some());
    }
}
