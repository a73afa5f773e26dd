//! Archive dates: parsing the date fields of a record and formatting them.
//!
//! A dated record carries at most one of `dateval`, `daterange`, `datespan`
//! or `datestr`. Values are partial ISO dates (`1950`, `1950-03`,
//! `1950-03-01`); `datestr` is free text and never parsed.

use crate::model::record::{Record, Value};
use chrono::{Datelike, NaiveDate};
use std::fmt::{Display, Formatter};

/// How the value of an [`EntityDate`] is to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateModifier {
    Exact,
    Before,
    After,
    About,
    /// Somewhere between `start` and `stop`.
    Range,
    /// From `start` until `stop`.
    Span,
    TextOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateQuality {
    Estimated,
    Calculated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    Single(String),
    Compound { start: String, stop: String },
}

/// Date of an event, citation or media object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDate {
    pub modifier: DateModifier,
    pub quality: Option<DateQuality>,
    pub value: DateValue,
}

impl EntityDate {
    /// Reads the date fields of `record`; `None` when it has none.
    pub fn from_record(record: &Record) -> Option<Self> {
        if let Some(dateval) = first_record(record.get("dateval")) {
            let modifier = match dateval.text("type") {
                Some("before") => DateModifier::Before,
                Some("after") => DateModifier::After,
                Some("about") => DateModifier::About,
                _ => DateModifier::Exact,
            };
            return Some(Self {
                modifier,
                quality: quality(dateval),
                value: DateValue::Single(dateval.text("val")?.to_string()),
            });
        }
        for (field, modifier) in [
            ("daterange", DateModifier::Range),
            ("datespan", DateModifier::Span),
        ] {
            if let Some(bounds) = first_record(record.get(field)) {
                return Some(Self {
                    modifier,
                    quality: quality(bounds),
                    value: DateValue::Compound {
                        start: bounds.text("start")?.to_string(),
                        stop: bounds.text("stop")?.to_string(),
                    },
                });
            }
        }
        let text = first_record(record.get("datestr"))?.text("val")?;
        Some(Self {
            modifier: DateModifier::TextOnly,
            quality: None,
            value: DateValue::Single(text.to_string()),
        })
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.value, DateValue::Compound { .. })
    }

    /// Estimated dates and ranges.
    pub fn is_approximate(&self) -> bool {
        self.quality == Some(DateQuality::Estimated) || self.modifier == DateModifier::Range
    }

    /// Earliest calendar day the date can mean; `None` for free text.
    pub fn earliest(&self) -> Option<NaiveDate> {
        if self.modifier == DateModifier::TextOnly {
            return None;
        }
        match &self.value {
            DateValue::Single(value) => parse_partial(value),
            DateValue::Compound { start, .. } => parse_partial(start),
        }
    }

    /// Year of [`EntityDate::earliest`].
    pub fn year(&self) -> Option<i32> {
        self.earliest().map(|date| date.year())
    }
}

impl Display for EntityDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.quality {
            Some(DateQuality::Estimated) => write!(f, "est ")?,
            Some(DateQuality::Calculated) => write!(f, "calc ")?,
            None => {}
        }
        match (&self.value, self.modifier) {
            (DateValue::Compound { start, stop }, modifier) => {
                let stop = shortened_stop(start, stop);
                if modifier == DateModifier::Range {
                    write!(f, "[{start}-{stop}]")
                } else {
                    write!(f, "{start}..{stop}")
                }
            }
            (DateValue::Single(value), DateModifier::Before) => write!(f, "<{value}"),
            (DateValue::Single(value), DateModifier::After) => write!(f, ">{value}"),
            (DateValue::Single(value), DateModifier::About) => write!(f, "≈{value}"),
            (DateValue::Single(value), _) => write!(f, "{value}"),
        }
    }
}

/// Orders undated first, then by earliest day.
pub fn date_sort_key(date: Option<&EntityDate>) -> Option<NaiveDate> {
    date.and_then(EntityDate::earliest)
}

/// `1882..1895` reads as `1882..95` when both are years of the same century.
fn shortened_stop<'a>(start: &str, stop: &'a str) -> &'a str {
    let same_century = start.len() == 4 && stop.len() == 4 && start.get(..2) == stop.get(..2);
    if same_century {
        &stop[2..]
    } else {
        stop
    }
}

fn first_record(value: Option<&Value>) -> Option<&Record> {
    value?.iter_items().next()?.as_record()
}

fn quality(record: &Record) -> Option<DateQuality> {
    match record.text("quality") {
        Some("estimated") => Some(DateQuality::Estimated),
        Some("calculated") => Some(DateQuality::Calculated),
        _ => None,
    }
}

/// Parses `YYYY`, `YYYY-MM` or `YYYY-MM-DD`; unknown month or day parts (`00`)
/// count as the first.
fn parse_partial(value: &str) -> Option<NaiveDate> {
    let mut parts = value.trim().splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let mut next_part = || match parts.next() {
        None => Some(1),
        Some(part) => part.parse::<u32>().ok().map(|number| number.max(1)),
    };
    let month = next_part()?;
    let day = next_part()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
