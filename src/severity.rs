//! Severity scoring for SOS reports
//!
//! Each report gets a 0-100 score built from additive factors: the filed
//! sickness level, head count, age, chronic conditions, how recently the
//! report was touched, and distress keywords in the free-text notes. The
//! score maps onto four priority levels used to triage the feed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::data::{parse_timestamp, Properties, Record};

/// Patients beyond this count add nothing further
const MAX_COUNTED_PATIENTS: i64 = 10;

/// Chronic conditions that raise severity (cardiac, cardiac arrest,
/// vascular, stroke, cancer, dialysis, ventilator)
const HIGH_RISK_CONDITIONS: &[&str] = &[
    "หัวใจ",
    "หัวใจหยุด",
    "เส้นเลือด",
    "หลอดเลือดสมอง",
    "มะเร็ง",
    "ฟอกไต",
    "เครื่องช่วยหายใจ",
];

/// Notes describing immediate danger to life
const CRITICAL_NOTE_TERMS: &[&str] = &[
    "หมดสติ",
    "หัวใจหยุด",
    "วิกฤต",
    "ช่วยด่วน",
    "ฟอกไต",
    "หายใจไม่ออก",
    "เลือดออกมาก",
    "เสียเลือด",
    "หยุดหายใจ",
    "ช็อก",
    "ชัก",
    "ไม่รู้สึกตัว",
    "บาดเจ็บหนัก",
    "กระดูกหัก",
];

/// Notes describing dependent or vulnerable people
const VULNERABILITY_NOTE_TERMS: &[&str] = &[
    "ติดเตียง",
    "พิการ",
    "ใกล้คลอด",
    "เด็กเล็ก",
    "ผู้สูงอายุ",
    "ทารกแรกเกิด",
];

/// Notes describing shortages or isolation
const RESOURCE_NOTE_TERMS: &[&str] = &[
    "ขาดอาหาร",
    "ขาดน้ำ",
    "ขาดยา",
    "ขาดไฟ",
    "ติดต่อไม่ได้",
    "ตัดขาด",
    "ติดอยู่",
    "ไม่มีสัญญาณ",
    "ไฟดับ",
];

// ============================================================================
// Levels
// ============================================================================

/// Priority bucket derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown priority level '{0}', expected one of: low, medium, high, critical")]
pub struct ParseLevelError(pub String);

impl Level {
    /// Returns all levels from least to most urgent
    pub fn all() -> &'static [Level] {
        &[Level::Low, Level::Medium, Level::High, Level::Critical]
    }

    /// Maps a clamped score onto its level
    pub fn from_score(score: u8) -> Self {
        match score {
            75.. => Level::Critical,
            55..=74 => Level::High,
            35..=54 => Level::Medium,
            _ => Level::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Level::all()
            .iter()
            .copied()
            .find(|level| level.label() == wanted)
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

// ============================================================================
// Reasons
// ============================================================================

/// Which rule produced a score contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    SickLevel,
    Patients,
    Age,
    Condition,
    RecentUpdate,
    StaleUpdate,
    CriticalNote,
    VulnerabilityNote,
    ResourceNote,
}

/// One contribution to a report's score
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    pub factor: Factor,
    /// Points added (negative for penalties)
    pub weight: i32,
    /// Value that triggered the rule (level, count, age or matched term)
    pub detail: String,
}

impl Reason {
    fn new(factor: Factor, weight: i32, detail: impl Into<String>) -> Self {
        Self {
            factor,
            weight,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.factor {
            Factor::SickLevel => write!(f, "Sickness level: {}", self.detail),
            Factor::Patients => write!(f, "{} patient(s) reported", self.detail),
            Factor::Age => write!(f, "At-risk age: {} years", self.detail),
            Factor::Condition => write!(f, "Chronic condition: {}", self.detail),
            Factor::RecentUpdate => f.write_str("Updated within the last 24 hours"),
            Factor::StaleUpdate => f.write_str("No update for more than 72 hours"),
            Factor::CriticalNote => write!(f, "Critical keyword: {}", self.detail),
            Factor::VulnerabilityNote => write!(f, "Vulnerability keyword: {}", self.detail),
            Factor::ResourceNote => write!(f, "Needs assistance keyword: {}", self.detail),
        }
    }
}

/// Scoring outcome for a single report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Priority {
    /// Clamped to 0-100
    pub score: u8,
    pub level: Level,
    /// Contributions in evaluation order; rules that added nothing are absent
    #[serde(serialize_with = "reasons_as_text")]
    pub reasons: Vec<Reason>,
}

fn reasons_as_text<S: Serializer>(reasons: &[Reason], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(reasons.iter().map(ToString::to_string))
}

// ============================================================================
// Scoring
// ============================================================================

/// Scores a report against the current time
pub fn score(record: &Record) -> Priority {
    score_at(record, Utc::now())
}

/// Scores a report as of `now`
///
/// # Arguments
///
/// * `record` - The report; only its location properties are consulted
/// * `now` - Reference time for the recency rule
///
/// # Returns
///
/// A `Priority` whose reasons list each rule that contributed, in order.
pub fn score_at(record: &Record, now: DateTime<Utc>) -> Priority {
    let props = &record.location.properties;
    let mut reasons = Vec::new();

    if let Some(weight) = sick_level_weight(props.sick_level_summary) {
        reasons.push(Reason::new(
            Factor::SickLevel,
            weight,
            props.sick_level_summary.to_string(),
        ));
    }

    let patients = patient_count(props);
    if patients > 0 {
        let weight = (patients.min(MAX_COUNTED_PATIENTS) * 2) as i32;
        reasons.push(Reason::new(Factor::Patients, weight, patients.to_string()));
    }

    if let Some(age) = leading_age(&props.ages).filter(|age| *age < 6 || *age >= 70) {
        reasons.push(Reason::new(Factor::Age, 8, age.to_string()));
    }

    if let Some(term) = find_term(&props.disease, HIGH_RISK_CONDITIONS) {
        reasons.push(Reason::new(Factor::Condition, 8, term));
    }

    if let Some(reason) = recency_reason(props, now) {
        reasons.push(reason);
    }

    if let Some(reason) = note_reason(&props.other) {
        reasons.push(reason);
    }

    let total: i32 = reasons.iter().map(|r| r.weight).sum();
    let score = total.clamp(0, 100) as u8;

    Priority {
        score,
        level: Level::from_score(score),
        reasons,
    }
}

fn sick_level_weight(level: i64) -> Option<i32> {
    match level {
        4 => Some(55),
        3 => Some(45),
        2 => Some(30),
        1 => Some(15),
        _ => None,
    }
}

/// Structured count, falling back to the number of victim entries when unset
///
/// A negative structured count is kept as is and contributes nothing.
fn patient_count(props: &Properties) -> i64 {
    if props.patient == 0 {
        i64::try_from(props.victims.len()).unwrap_or(i64::MAX)
    } else {
        props.patient
    }
}

/// First run of ASCII digits in `ages`, ignoring anything before it
///
/// Returns `None` for blank input, input without digits, zero, or a value
/// too large to be an age.
fn leading_age(ages: &str) -> Option<u64> {
    let digits: String = ages
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse::<u64>().ok().filter(|age| *age > 0)
}

fn recency_reason(props: &Properties, now: DateTime<Utc>) -> Option<Reason> {
    let updated = props.updated_at.as_deref().and_then(parse_timestamp)?;
    let age = now - updated;

    if age <= Duration::hours(24) {
        Some(Reason::new(Factor::RecentUpdate, 6, ""))
    } else if age > Duration::hours(72) {
        Some(Reason::new(Factor::StaleUpdate, -5, ""))
    } else {
        None
    }
}

/// Only the most urgent matching tier counts
fn note_reason(notes: &str) -> Option<Reason> {
    let tiers = [
        (Factor::CriticalNote, 12, CRITICAL_NOTE_TERMS),
        (Factor::VulnerabilityNote, 8, VULNERABILITY_NOTE_TERMS),
        (Factor::ResourceNote, 5, RESOURCE_NOTE_TERMS),
    ];

    tiers.into_iter().find_map(|(factor, weight, terms)| {
        find_term(notes, terms).map(|term| Reason::new(factor, weight, term))
    })
}

/// Case-insensitive substring search; returns the first listed term found
fn find_term(text: &str, terms: &[&'static str]) -> Option<&'static str> {
    if text.is_empty() {
        return None;
    }
    let haystack = text.to_lowercase();
    terms
        .iter()
        .copied()
        .find(|term| haystack.contains(&term.to_lowercase()))
}
