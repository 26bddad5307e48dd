//! Turns `div.trow` fragments of a results page into typed row records.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ScrapeError;
use crate::models::{ClassTime, Section};

const ROW_SELECTOR: &str = "div.trow";
const CELL_SELECTOR: &str = "div.tdata";

const CRN: &str = "CRN";
const COURSE_SEC: &str = "Course-Sec";
const TIME: &str = "Time";
const INSTRUCTOR: &str = "Instructor";
const ACTIVITY: &str = "Activity";
const DAY: &str = "Day";
const LOC: &str = "Loc";
const STATUS: &str = "Status";
const COURSE_NAME: &str = "Course Name";

const KNOWN_LABELS: [&str; 9] = [
    CRN, COURSE_SEC, TIME, INSTRUCTOR, ACTIVITY, DAY, LOC, STATUS, COURSE_NAME,
];

/// Label to value mapping of one row, as printed.
pub type RawRowFields = HashMap<String, String>;

/// One offering row after composite fields have been split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    pub crn: String,
    pub course_code: String,
    pub section: String,
    pub course_name: String,
    pub instructor: String,
    pub activity: String,
    pub days: String,
    pub location: String,
    pub start_time: ClassTime,
    pub end_time: ClassTime,
    pub status: String,
}

impl RowRecord {
    pub fn to_section(&self) -> Section {
        Section {
            crn: self.crn.clone(),
            section: self.section.clone(),
            instructor: self.instructor.clone(),
            activity: self.activity.clone(),
            days: self.days.clone(),
            location: self.location.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            status: self.status.clone(),
        }
    }
}

/// Rows of a results page, each either extracted or with the reason it was not.
pub fn parse_rows(document: &Html) -> Vec<Result<RowRecord, ScrapeError>> {
    let row_selector = Selector::parse(ROW_SELECTOR).expect("Invalid row selector");

    document
        .select(&row_selector)
        .map(|row| extract_row(row).and_then(|fields| normalize(&fields)))
        .collect()
}

/// Read every `Label:Value` data cell of a row. Later duplicates of a label win.
pub fn extract_row(row: ElementRef) -> Result<RawRowFields, ScrapeError> {
    let cell_selector = Selector::parse(CELL_SELECTOR).expect("Invalid cell selector");
    let mut fields = RawRowFields::new();

    for cell in row.select(&cell_selector) {
        let text = cell.text().collect::<String>();
        // Course names can contain colons, only the first one separates the label
        let (label, value) = text
            .split_once(':')
            .ok_or_else(|| ScrapeError::MalformedCell {
                text: text.trim().to_string(),
            })?;
        fields.insert(label.trim().to_string(), value.trim().to_string());
    }

    Ok(fields)
}

pub fn normalize(fields: &RawRowFields) -> Result<RowRecord, ScrapeError> {
    for label in fields.keys() {
        if !KNOWN_LABELS.contains(&label.as_str()) {
            debug!(label = %label, "Ignoring unexpected row label");
        }
    }

    let (course_code, section) = split_course_section(required(fields, COURSE_SEC)?)?;
    let (start_time, end_time) = split_time(required(fields, TIME)?)?;

    Ok(RowRecord {
        crn: required(fields, CRN)?.to_string(),
        course_code,
        section,
        course_name: required(fields, COURSE_NAME)?.to_string(),
        instructor: required(fields, INSTRUCTOR)?.to_string(),
        activity: required(fields, ACTIVITY)?.to_string(),
        days: required(fields, DAY)?.to_string(),
        location: required(fields, LOC)?.to_string(),
        start_time,
        end_time,
        status: required(fields, STATUS)?.to_string(),
    })
}

fn required<'a>(fields: &'a RawRowFields, label: &'static str) -> Result<&'a str, ScrapeError> {
    fields
        .get(label)
        .map(String::as_str)
        .ok_or(ScrapeError::MissingLabel { label })
}

/// `ICS202-1` into course code and section number.
fn split_course_section(value: &str) -> Result<(String, String), ScrapeError> {
    match value.split_once('-') {
        Some((code, section))
            if !code.is_empty() && !section.is_empty() && !section.contains('-') =>
        {
            Ok((code.to_string(), section.to_string()))
        }
        _ => Err(ScrapeError::MalformedField {
            label: COURSE_SEC,
            value: value.to_string(),
        }),
    }
}

/// `08:00-08:50` into start and end; a blank side is unscheduled.
fn split_time(value: &str) -> Result<(ClassTime, ClassTime), ScrapeError> {
    match value.split_once('-') {
        Some((start, end)) if !end.contains('-') => Ok((
            ClassTime::from_raw(start.trim()),
            ClassTime::from_raw(end.trim()),
        )),
        _ => Err(ScrapeError::MalformedField {
            label: TIME,
            value: value.to_string(),
        }),
    }
}
