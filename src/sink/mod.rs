mod console;
mod json;

pub use console::ConsoleSink;
pub use json::JsonSink;

use anyhow::Result;
use async_trait::async_trait;

use crate::aggregate::AggregationTable;
use crate::crawl::CrawlReport;

/// Destination for the courses of a finished crawl.
#[async_trait]
pub trait CourseSink: Send + Sync {
    /// Get the name of this sink for logging
    fn name(&self) -> &'static str;

    async fn store(&self, table: &AggregationTable, report: &CrawlReport) -> Result<()>;
}

/// Collection of sinks that receive the same crawl output
pub struct SinkChain {
    sinks: Vec<Box<dyn CourseSink>>,
}

impl SinkChain {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add<S: CourseSink + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Store to every sink in order; one failure does not stop the rest.
    pub async fn store_all(
        &self,
        table: &AggregationTable,
        report: &CrawlReport,
    ) -> Vec<(&'static str, Result<()>)> {
        let mut results = Vec::new();
        for sink in &self.sinks {
            let result = sink.store(table, report).await;
            results.push((sink.name(), result));
        }
        results
    }
}

impl Default for SinkChain {
    fn default() -> Self {
        Self::new()
    }
}
