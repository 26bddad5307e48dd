use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::CourseSink;
use crate::aggregate::AggregationTable;
use crate::crawl::CrawlReport;
use crate::models::{Course, Section};

pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CourseSink for ConsoleSink {
    fn name(&self) -> &'static str {
        "console"
    }

    #[instrument(skip(self, table, report), fields(
        sink = "console",
        courses = table.len()
    ))]
    async fn store(&self, table: &AggregationTable, report: &CrawlReport) -> Result<()> {
        if table.is_empty() {
            debug!("No courses to print");
        }

        println!("\n{}", "=".repeat(60));
        println!("COURSE OFFERINGS");
        println!("{}", "=".repeat(60));

        for term in table.terms() {
            let courses: Vec<&Course> = table.courses().filter(|c| c.term == term).collect();
            println!("\n[{}] {} courses", term, courses.len());
            println!("{}", "-".repeat(40));
            for course in courses {
                print_course(course);
            }
        }

        println!(
            "\n{} courses, {} sections from {} requests ({} failed, {} rows skipped)",
            report.courses,
            report.sections,
            report.pairs_attempted,
            report.pairs_failed(),
            report.rows_skipped
        );
        for failed in &report.failed_pairs {
            println!("    skipped {} / {}: {}", failed.term, failed.department, failed.error);
        }
        println!("{}", "=".repeat(60));

        info!(
            sink = "console",
            courses = table.len(),
            sections = table.section_count(),
            "Console summary displayed"
        );

        Ok(())
    }
}

fn print_course(course: &Course) {
    println!(
        "{} - {} ({}, {} sections)",
        course.code,
        course.name,
        course.department,
        course.sections.len()
    );
    for section in &course.sections {
        println!(
            "    {:>3} CRN {} {} {} {} {} [{}] {}",
            section.section,
            section.crn,
            section.activity,
            section.days,
            time_range(section),
            section.location,
            section.status,
            section.instructor
        );
    }
}

fn time_range(section: &Section) -> String {
    if section.start_time.is_unscheduled() && section.end_time.is_unscheduled() {
        return "unscheduled".to_string();
    }
    format!(
        "{}-{}",
        section.start_time.as_str().unwrap_or("?"),
        section.end_time.as_str().unwrap_or("?")
    )
}
