use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use libsql::{params, Builder, Connection};
use tracing::{debug, info};

use crate::aggregate::AggregationTable;
use crate::crawl::CrawlReport;
use crate::models::Course;
use crate::sink::CourseSink;

pub struct Database {
    conn: Connection,
    db_type: &'static str,
}

impl Database {
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .context("Failed to open database")?;
        let conn = db.connect().context("Failed to connect to database")?;
        Self::init(conn, "sqlite").await
    }

    pub async fn open_turso(url: &str, auth_token: &str) -> Result<Self> {
        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .context("Failed to open remote database")?;
        let conn = db.connect().context("Failed to connect to remote database")?;
        Self::init(conn, "turso").await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .context("Failed to open in-memory database")?;
        let conn = db.connect()?;
        Self::init(conn, "memory").await
    }

    async fn init(conn: Connection, db_type: &'static str) -> Result<Self> {
        let db = Self { conn, db_type };
        db.init_schema().await?;
        Ok(db)
    }

    pub fn db_type(&self) -> &'static str {
        self.db_type
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS courses (
                code TEXT NOT NULL,
                term TEXT NOT NULL,
                name TEXT NOT NULL,
                department TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (code, term)
            );

            CREATE TABLE IF NOT EXISTS sections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                course_code TEXT NOT NULL,
                term TEXT NOT NULL,
                position INTEGER NOT NULL,
                crn TEXT NOT NULL,
                section TEXT NOT NULL,
                instructor TEXT NOT NULL,
                activity TEXT NOT NULL,
                days TEXT NOT NULL,
                location TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                status TEXT NOT NULL,
                FOREIGN KEY (course_code, term) REFERENCES courses(code, term)
            );

            CREATE TABLE IF NOT EXISTS crawl_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                terms TEXT NOT NULL,
                pairs_attempted INTEGER NOT NULL,
                pairs_failed INTEGER NOT NULL,
                failed_pairs TEXT NOT NULL,
                rows_seen INTEGER NOT NULL,
                rows_ingested INTEGER NOT NULL,
                rows_skipped INTEGER NOT NULL,
                courses INTEGER NOT NULL,
                sections INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sections_course
                ON sections(course_code, term);
            CREATE INDEX IF NOT EXISTS idx_crawl_runs_started_at
                ON crawl_runs(started_at);
            "#,
            )
            .await
            .context("Failed to initialize schema")?;

        debug!(db_type = self.db_type, "Database schema initialized");
        Ok(())
    }

    /// Replace stored offerings with the crawled ones.
    ///
    /// Terms crawled without any failed pair are cleared first, so courses the
    /// portal no longer lists disappear. Terms with failed pairs keep their
    /// older rows and only have the crawled courses overwritten.
    pub async fn sync_table(&self, table: &AggregationTable, report: &CrawlReport) -> Result<SyncResult> {
        let now = report.started_at.to_rfc3339();
        let partial_terms: HashSet<&str> = report
            .failed_pairs
            .iter()
            .map(|p| p.term.as_str())
            .collect();

        let tx = self.conn.transaction().await.context("Failed to begin transaction")?;
        let mut cleared_terms = Vec::new();

        for term in &report.terms {
            if partial_terms.contains(term.as_str()) {
                continue;
            }
            tx.execute("DELETE FROM sections WHERE term = ?1", params![term.clone()])
                .await?;
            tx.execute("DELETE FROM courses WHERE term = ?1", params![term.clone()])
                .await?;
            cleared_terms.push(term.clone());
        }

        for course in table.courses() {
            write_course(&tx, course, &now).await?;
        }

        tx.commit().await.context("Failed to commit crawl")?;

        info!(
            courses = table.len(),
            sections = table.section_count(),
            cleared_terms = ?cleared_terms,
            partial_terms = ?partial_terms,
            "Stored crawl in database"
        );

        Ok(SyncResult {
            courses: table.len(),
            sections: table.section_count(),
            cleared_terms,
        })
    }

    pub async fn log_run(&self, report: &CrawlReport) -> Result<()> {
        let terms = serde_json::to_string(&report.terms)?;
        let failed_pairs = serde_json::to_string(&report.failed_pairs)?;

        self.conn
            .execute(
                "INSERT INTO crawl_runs (
                    started_at, terms, pairs_attempted, pairs_failed, failed_pairs,
                    rows_seen, rows_ingested, rows_skipped, courses, sections, duration_ms
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    report.started_at.to_rfc3339(),
                    terms,
                    report.pairs_attempted as i64,
                    report.pairs_failed() as i64,
                    failed_pairs,
                    report.rows_seen as i64,
                    report.rows_ingested as i64,
                    report.rows_skipped as i64,
                    report.courses as i64,
                    report.sections as i64,
                    i64::try_from(report.duration_ms).unwrap_or(i64::MAX)
                ],
            )
            .await
            .context("Failed to log crawl run")?;

        debug!(started_at = %report.started_at, "Logged crawl run");
        Ok(())
    }
}

async fn write_course(conn: &Connection, course: &Course, now: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM sections WHERE course_code = ?1 AND term = ?2",
        params![course.code.clone(), course.term.clone()],
    )
    .await?;

    conn.execute(
        "INSERT OR REPLACE INTO courses (code, term, name, department, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            course.code.clone(),
            course.term.clone(),
            course.name.clone(),
            course.department.clone(),
            now.to_string()
        ],
    )
    .await
    .with_context(|| format!("Failed to store course {}", course.key()))?;

    for (position, section) in course.sections.iter().enumerate() {
        conn.execute(
            "INSERT INTO sections (
                course_code, term, position, crn, section, instructor,
                activity, days, location, start_time, end_time, status
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                course.code.clone(),
                course.term.clone(),
                position as i64,
                section.crn.clone(),
                section.section.clone(),
                section.instructor.clone(),
                section.activity.clone(),
                section.days.clone(),
                section.location.clone(),
                section.start_time.to_string(),
                section.end_time.to_string(),
                section.status.clone()
            ],
        )
        .await
        .with_context(|| format!("Failed to store section {} of {}", section.crn, course.key()))?;
    }

    Ok(())
}

#[derive(Debug)]
pub struct SyncResult {
    pub courses: usize,
    pub sections: usize,
    pub cleared_terms: Vec<String>,
}

#[async_trait]
impl CourseSink for Database {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn store(&self, table: &AggregationTable, report: &CrawlReport) -> Result<()> {
        let result = self.sync_table(table, report).await?;
        debug!(
            db_type = self.db_type,
            courses = result.courses,
            sections = result.sections,
            cleared_terms = ?result.cleared_terms,
            "Database sync completed"
        );
        self.log_run(report).await
    }
}
