use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use super::CourseSink;
use crate::aggregate::AggregationTable;
use crate::crawl::CrawlReport;
use crate::models::Course;

/// Courses are keyed by `code@term` in crawl order.
#[derive(Serialize)]
struct Export<'a> {
    report: &'a CrawlReport,
    courses: IndexMap<String, &'a Course>,
}

/// Writes the crawl as pretty-printed JSON, replacing any previous file.
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl CourseSink for JsonSink {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn store(&self, table: &AggregationTable, report: &CrawlReport) -> Result<()> {
        let export = Export {
            report,
            courses: table
                .courses()
                .map(|course| (course.key().to_string(), course))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&export).context("Failed to serialize courses")?;

        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        info!(
            sink = "json",
            path = %self.path.display(),
            courses = table.len(),
            "Courses written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RowRecord;
    use crate::models::ClassTime;
    use crate::sink::tests::empty_report;

    #[tokio::test]
    async fn test_writes_courses_with_sentinel_times() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");

        let mut table = AggregationTable::new();
        table.ingest(
            &RowRecord {
                crn: "10245".to_string(),
                course_code: "ICS202".to_string(),
                section: "1".to_string(),
                course_name: "Data Structures".to_string(),
                instructor: "Dr. X".to_string(),
                activity: "LEC".to_string(),
                days: "MW".to_string(),
                location: "B12".to_string(),
                start_time: ClassTime::Unscheduled,
                end_time: ClassTime::At("08:50".to_string()),
                status: "Open".to_string(),
            },
            "202410",
            "ICS",
        );

        JsonSink::new(path.clone())
            .store(&table, &empty_report())
            .await
            .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let course = &written["courses"]["ICS202@202410"];
        assert_eq!(course["code"], "ICS202");
        assert_eq!(course["term"], "202410");
        assert_eq!(course["sections"][0]["start_time"], -1);
        assert_eq!(course["sections"][0]["end_time"], "08:50");
        assert_eq!(written["report"]["pairs_attempted"], 2);

        let courses: IndexMap<String, Course> =
            serde_json::from_value(written["courses"].clone()).unwrap();
        assert!(courses["ICS202@202410"].sections[0].start_time.is_unscheduled());
    }

    #[tokio::test]
    async fn test_same_code_in_two_terms_gets_two_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");

        let row = |crn: &str| RowRecord {
            crn: crn.to_string(),
            course_code: "MATH101".to_string(),
            section: "1".to_string(),
            course_name: "Calculus I".to_string(),
            instructor: "Dr. Y".to_string(),
            activity: "LEC".to_string(),
            days: "UTR".to_string(),
            location: "B5".to_string(),
            start_time: ClassTime::At("07:00".to_string()),
            end_time: ClassTime::At("07:50".to_string()),
            status: "Open".to_string(),
        };
        let mut table = AggregationTable::new();
        table.ingest(&row("20001"), "202420", "MATH");
        table.ingest(&row("10001"), "202410", "MATH");

        JsonSink::new(path.clone())
            .store(&table, &empty_report())
            .await
            .unwrap();

        let courses: IndexMap<String, Course> = serde_json::from_value(
            serde_json::from_str::<serde_json::Value>(&std::fs::read_to_string(&path).unwrap())
                .unwrap()["courses"]
                .clone(),
        )
        .unwrap();
        let keys: Vec<&str> = courses.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["MATH101@202420", "MATH101@202410"]);
        assert_eq!(courses["MATH101@202410"].sections[0].crn, "10001");
    }
}
