//! Chunked step execution with retries and a skip budget

use super::context::JobContext;
use crate::config::JobConfig;
use crate::error::{RecommenderError, Result};
use crate::sources::EventChunk;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of flushing the state accumulated over one chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub saved: usize,
    /// Workloads that could not be persisted after retrying
    pub failed: usize,
}

/// One read-process-flush pipeline driven by `StepRunner`
#[async_trait]
pub trait Step: Send {
    type Item: Send + Sync;

    fn name(&self) -> &'static str;

    /// Next chunk of at most `limit` items; empty once the input is exhausted
    async fn read_chunk(&mut self, limit: usize) -> Result<EventChunk<Self::Item>>;

    /// Must leave `ctx` untouched when it fails transiently, so it can be retried
    async fn process(&mut self, ctx: &mut JobContext, item: &Self::Item) -> Result<()>;

    async fn flush(&mut self, ctx: &mut JobContext) -> FlushReport;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: &'static str,
    pub read: usize,
    pub processed: usize,
    pub skipped: usize,
    pub retried: usize,
    pub flushed: usize,
    /// Skips charged against the step's skip limit
    pub skip_budget_used: usize,
    pub elapsed_secs: f64,
}

impl StepReport {
    fn new(step: &'static str) -> Self {
        Self {
            step,
            read: 0,
            processed: 0,
            skipped: 0,
            retried: 0,
            flushed: 0,
            skip_budget_used: 0,
            elapsed_secs: 0.0,
        }
    }
}

/// Drives a step chunk by chunk until its input is exhausted
#[derive(Debug, Clone)]
pub struct StepRunner {
    chunk_size: usize,
    skip_limit: usize,
    item_retry_limit: u32,
    retry_delay: Duration,
}

impl StepRunner {
    pub fn new(
        chunk_size: usize,
        skip_limit: usize,
        item_retry_limit: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            skip_limit,
            item_retry_limit,
            retry_delay,
        }
    }

    pub fn from_config(config: &JobConfig) -> Self {
        Self::new(
            config.chunk_size,
            config.skip_limit,
            config.item_retry_limit,
            config.retry_delay(),
        )
    }

    pub async fn run<S: Step>(&self, step: &mut S, ctx: &mut JobContext) -> Result<StepReport> {
        let started = Instant::now();
        let mut report = StepReport::new(step.name());

        let outcome = self.run_chunks(step, ctx, &mut report).await;

        report.elapsed_secs = started.elapsed().as_secs_f64();
        ctx.metrics.observe_step_duration(report.step, report.elapsed_secs);

        match outcome {
            Ok(()) => {
                ctx.logger.log_step_finished(
                    report.step,
                    report.read,
                    report.processed,
                    report.skipped,
                );
                Ok(report)
            }
            Err(e) => {
                // nothing buffered by a failed step may reach the store
                ctx.workloads.clear();
                ctx.logger.log_step_failed(report.step, &e.to_string());
                Err(e)
            }
        }
    }

    async fn run_chunks<S: Step>(
        &self,
        step: &mut S,
        ctx: &mut JobContext,
        report: &mut StepReport,
    ) -> Result<()> {
        loop {
            let chunk = self.read_chunk(step, report).await?;
            if chunk.is_empty() {
                return Ok(());
            }
            let consumed = chunk.items.len() + chunk.malformed;
            report.read += consumed;
            ctx.metrics.inc_items_read(report.step, consumed);
            if chunk.malformed > 0 {
                let error = RecommenderError::MalformedEvent {
                    source_name: report.step,
                    count: chunk.malformed,
                };
                self.skip(ctx, report, &error, chunk.malformed)?;
            }
            if chunk.items.is_empty() {
                continue;
            }
            debug!(step = report.step, items = chunk.items.len(), "Processing chunk");

            for item in &chunk.items {
                match self.process_item(step, ctx, item, report).await {
                    Ok(()) => report.processed += 1,
                    Err(e) => self.skip(ctx, report, &e, 1)?,
                }
            }

            let flush = step.flush(ctx).await;
            report.flushed += flush.saved;
            if flush.failed > 0 {
                let error = RecommenderError::transient(
                    "store.save",
                    anyhow::anyhow!("{} workloads not saved", flush.failed),
                );
                self.skip(ctx, report, &error, flush.failed)?;
            }
        }
    }

    async fn read_chunk<S: Step>(
        &self,
        step: &mut S,
        report: &mut StepReport,
    ) -> Result<EventChunk<S::Item>> {
        let mut attempt = 0;
        loop {
            match step.read_chunk(self.chunk_size).await {
                Err(e) if e.is_transient() && attempt < self.item_retry_limit => {
                    attempt += 1;
                    report.retried += 1;
                    warn!(step = report.step, attempt = attempt, error = %e, "Retrying chunk read");
                    self.pause().await;
                }
                other => return other,
            }
        }
    }

    async fn process_item<S: Step>(
        &self,
        step: &mut S,
        ctx: &mut JobContext,
        item: &S::Item,
        report: &mut StepReport,
    ) -> Result<()> {
        let mut attempt = 0;
        loop {
            match step.process(ctx, item).await {
                Err(e) if e.is_transient() && attempt < self.item_retry_limit => {
                    attempt += 1;
                    report.retried += 1;
                    ctx.metrics.inc_items_retried(report.step);
                    warn!(step = report.step, attempt = attempt, error = %e, "Retrying item");
                    self.pause().await;
                }
                other => return other,
            }
        }
    }

    /// Record skipped items; only exhausted transient failures use the budget
    fn skip(
        &self,
        ctx: &JobContext,
        report: &mut StepReport,
        error: &RecommenderError,
        count: usize,
    ) -> Result<()> {
        report.skipped += count;
        for _ in 0..count {
            ctx.metrics.inc_items_skipped(report.step, error.reason());
        }
        ctx.logger
            .log_sample_rejected(report.step, error.reason(), &error.to_string());

        if error.is_transient() {
            report.skip_budget_used += count;
            if report.skip_budget_used > self.skip_limit {
                return Err(RecommenderError::SkipLimitExceeded {
                    step: report.step,
                    limit: self.skip_limit,
                });
            }
        }
        Ok(())
    }

    async fn pause(&self) {
        if !self.retry_delay.is_zero() {
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}
