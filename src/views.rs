//! Derived views over a dataset
//!
//! Pure functions turning the record list into the listings the CLI prints:
//! area filters, the southern subset, the triage ordering and per-area
//! counts.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::aggregate::{group_count, NameCount};
use crate::data::Record;
use crate::geo::{in_southern_thailand, is_southern_province};
use crate::severity::{score_at, Level, Priority};

/// Administrative level a record can be filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Province,
    District,
    Subdistrict,
}

impl Area {
    pub fn label(&self) -> &'static str {
        match self {
            Area::Province => "province",
            Area::District => "district",
            Area::Subdistrict => "subdistrict",
        }
    }

    fn value<'a>(&self, record: &'a Record) -> &'a str {
        match self {
            Area::Province => record.province(),
            Area::District => record.district(),
            Area::Subdistrict => record.subdistrict(),
        }
    }
}

/// Records matching one area name
///
/// Serializes as `{"<area>": name, "count": n, "items": [...]}`.
#[derive(Debug, Clone)]
pub struct AreaListing<'a> {
    pub area: Area,
    pub name: String,
    pub items: Vec<&'a Record>,
}

impl Serialize for AreaListing<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(self.area.label(), &self.name)?;
        map.serialize_entry("count", &self.items.len())?;
        map.serialize_entry("items", &self.items)?;
        map.end()
    }
}

/// A plain record listing with its size
#[derive(Debug, Clone, Serialize)]
pub struct Listing<'a> {
    pub count: usize,
    pub items: Vec<&'a Record>,
}

impl<'a> Listing<'a> {
    fn new(items: Vec<&'a Record>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

/// A record together with its severity assessment
#[derive(Debug, Clone, Serialize)]
pub struct PrioritizedRecord<'a> {
    #[serde(flatten)]
    pub record: &'a Record,
    pub priority: Priority,
}

/// Triage listing; `count` is taken before the limit is applied
#[derive(Debug, Clone, Serialize)]
pub struct PriorityListing<'a> {
    pub count: usize,
    pub items: Vec<PrioritizedRecord<'a>>,
}

/// Options for [`prioritize`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityQuery {
    /// Keep only this level; `None` keeps all
    pub level: Option<Level>,
    /// Maximum items returned; ignored unless `0 < limit < count`
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub total: usize,
    pub items: Vec<NameCount>,
}

impl From<Vec<NameCount>> for Group {
    fn from(items: Vec<NameCount>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

/// Distinct-name counts at every administrative level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<&'static str>,
    pub provinces: Group,
    pub districts: Group,
    pub subdistricts: Group,
}

/// Records whose `area` equals `name`, ignoring case and surrounding spaces
///
/// Surrounding spaces are trimmed from the record's own value as well as
/// from `name`, so a record filed as `"songkhla "` matches `"Songkhla"`.
/// A blank name matches nothing.
pub fn filter_by_area<'a>(records: &'a [Record], area: Area, name: &str) -> AreaListing<'a> {
    let wanted = name.trim().to_lowercase();
    let items = if wanted.is_empty() {
        Vec::new()
    } else {
        records
            .iter()
            .filter(|record| area.value(record).trim().to_lowercase() == wanted)
            .collect()
    };

    AreaListing {
        area,
        name: name.trim().to_string(),
        items,
    }
}

/// Whether a record lies in the south by both its province and its position
///
/// Records without a coordinate pair never qualify.
pub fn is_southern(record: &Record) -> bool {
    is_southern_province(record.province())
        && record
            .lat_lon()
            .is_some_and(|(lat, lon)| in_southern_thailand(lat, lon))
}

/// Southern records in delivery order
pub fn southern(records: &[Record]) -> Listing<'_> {
    Listing::new(records.iter().filter(|record| is_southern(record)).collect())
}

/// Southern records scored and ordered most urgent first
pub fn prioritize<'a>(records: &'a [Record], query: &PriorityQuery) -> PriorityListing<'a> {
    prioritize_at(records, query, Utc::now())
}

/// [`prioritize`] with an explicit reference time for the recency rule
///
/// Ties on score go to the most recently updated record; records without a
/// parseable update time sort last among equals.
pub fn prioritize_at<'a>(
    records: &'a [Record],
    query: &PriorityQuery,
    now: DateTime<Utc>,
) -> PriorityListing<'a> {
    let mut items: Vec<PrioritizedRecord<'a>> = records
        .iter()
        .filter(|record| is_southern(record))
        .map(|record| PrioritizedRecord {
            record,
            priority: score_at(record, now),
        })
        .filter(|item| query.level.map_or(true, |level| item.priority.level == level))
        .collect();

    items.sort_by(|a, b| {
        b.priority
            .score
            .cmp(&a.priority.score)
            .then_with(|| b.record.last_update().cmp(&a.record.last_update()))
    });

    let count = items.len();
    if let Some(limit) = query.limit.filter(|n| *n > 0 && *n < count) {
        items.truncate(limit);
    }

    PriorityListing { count, items }
}

/// Counts per province, district and subdistrict across all records
pub fn area_summary(records: &[Record]) -> AreaSummary {
    let all: Vec<&Record> = records.iter().collect();
    summarize(&all, None)
}

/// [`area_summary`] restricted to records filed under a southern province
pub fn southern_area_summary(records: &[Record]) -> AreaSummary {
    let south: Vec<&Record> = records
        .iter()
        .filter(|record| is_southern_province(record.province()))
        .collect();
    summarize(&south, Some("south"))
}

fn summarize(records: &[&Record], region: Option<&'static str>) -> AreaSummary {
    AreaSummary {
        region,
        provinces: group_count(records, |record| record.province()).into(),
        districts: group_count(records, |record| record.district()).into(),
        subdistricts: group_count(records, |record| record.subdistrict()).into(),
    }
}
