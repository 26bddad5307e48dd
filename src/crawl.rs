use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::aggregate::AggregationTable;
use crate::error::ScrapeError;
use crate::extract::parse_rows;
use crate::form_state::{extract_tokens, FormState};
use crate::transport::Transport;

/// A (term, department) postback that produced no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPair {
    pub term: String,
    pub department: String,
    pub error: String,
}

/// Outcome counters of one crawl run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub terms: Vec<String>,
    pub pairs_attempted: usize,
    pub failed_pairs: Vec<FailedPair>,
    pub rows_seen: usize,
    pub rows_ingested: usize,
    pub rows_skipped: usize,
    pub courses: usize,
    pub sections: usize,
    pub duration_ms: u64,
}

impl CrawlReport {
    fn new(terms: Vec<String>) -> Self {
        Self {
            started_at: Utc::now(),
            terms,
            pairs_attempted: 0,
            failed_pairs: Vec::new(),
            rows_seen: 0,
            rows_ingested: 0,
            rows_skipped: 0,
            courses: 0,
            sections: 0,
            duration_ms: 0,
        }
    }

    pub fn pairs_failed(&self) -> usize {
        self.failed_pairs.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_pairs.is_empty() && self.rows_skipped == 0
    }
}

#[derive(Debug, Default)]
struct PageOutcome {
    seen: usize,
    ingested: usize,
    skipped: usize,
}

/// Replays the offering search for every (term, department) pair.
pub struct Crawler<'a> {
    transport: &'a dyn Transport,
    url: String,
    term_limit: usize,
}

impl<'a> Crawler<'a> {
    pub fn new(transport: &'a dyn Transport, url: String, term_limit: usize) -> Self {
        Self {
            transport,
            url,
            term_limit,
        }
    }

    pub async fn load_form_state(&self) -> Result<FormState, ScrapeError> {
        match FormState::load(self.transport, &self.url, self.term_limit).await {
            Ok(state) => Ok(state),
            Err(e) => {
                error!(
                    url = %self.url,
                    transport = e.is_transport(),
                    error = %e,
                    "Failed to load landing page state"
                );
                Err(e)
            }
        }
    }

    /// Load the landing page, then crawl every pair into `table`.
    ///
    /// Only a landing page failure is fatal; failed pairs and bad rows are
    /// recorded in the report and the crawl moves on.
    pub async fn run_crawl(&self, table: &mut AggregationTable) -> Result<CrawlReport, ScrapeError> {
        let state = self.load_form_state().await?;
        Ok(self.crawl_pairs(&state, table).await)
    }

    #[instrument(skip(self, state, table), fields(
        terms = state.terms.len(),
        departments = state.departments.len()
    ))]
    pub async fn crawl_pairs(&self, state: &FormState, table: &mut AggregationTable) -> CrawlReport {
        let start = Instant::now();
        let mut report = CrawlReport::new(state.terms.clone());

        info!(pairs = state.pair_count(), "Starting crawl");

        for term in &state.terms {
            for department in &state.departments {
                report.pairs_attempted += 1;
                info!(term = %term, department = %department, "Requesting offerings");

                let payload = state.postback_payload(term, department);
                let body = match self.transport.post_form(&self.url, &payload).await {
                    Ok(body) => body,
                    Err(e) => {
                        error!(
                            term = %term,
                            department = %department,
                            error = %e,
                            "Postback failed - skipping pair"
                        );
                        report.failed_pairs.push(FailedPair {
                            term: term.clone(),
                            department: department.clone(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                let outcome = ingest_page(&body, state, table, term, department);
                debug!(
                    term = %term,
                    department = %department,
                    rows = outcome.seen,
                    ingested = outcome.ingested,
                    skipped = outcome.skipped,
                    "Pair processed"
                );

                report.rows_seen += outcome.seen;
                report.rows_ingested += outcome.ingested;
                report.rows_skipped += outcome.skipped;
            }
        }

        report.courses = table.len();
        report.sections = table.section_count();
        report.duration_ms = whole_millis(start.elapsed());

        if report.pairs_failed() > 0 {
            warn!(
                failed = report.pairs_failed(),
                pairs = ?report
                    .failed_pairs
                    .iter()
                    .map(|p| format!("{}:{}", p.term, p.department))
                    .collect::<Vec<_>>(),
                "Some pairs were skipped"
            );
        }

        info!(
            pairs_attempted = report.pairs_attempted,
            pairs_failed = report.pairs_failed(),
            rows_seen = report.rows_seen,
            rows_ingested = report.rows_ingested,
            rows_skipped = report.rows_skipped,
            courses = report.courses,
            sections = report.sections,
            duration_ms = report.duration_ms,
            "Crawl completed"
        );

        report
    }
}

fn ingest_page(
    body: &str,
    state: &FormState,
    table: &mut AggregationTable,
    term: &str,
    department: &str,
) -> PageOutcome {
    let document = Html::parse_document(body);

    // Tokens are reused for the whole crawl; note when the portal hands out new ones
    if let Ok(tokens) = extract_tokens(&document) {
        if tokens != state.tokens {
            debug!(term = %term, department = %department, "Response carries rotated postback tokens");
        }
    }

    let mut outcome = PageOutcome::default();
    for row in parse_rows(&document) {
        outcome.seen += 1;
        match row {
            Ok(record) => {
                table.ingest(&record, term, department);
                outcome.ingested += 1;
            }
            Err(e) => {
                warn!(
                    term = %term,
                    department = %department,
                    row = outcome.seen,
                    error = %e,
                    "Skipping row"
                );
                outcome.skipped += 1;
            }
        }
    }

    outcome
}

fn whole_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
