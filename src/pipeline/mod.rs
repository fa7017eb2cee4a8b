//! The per-cycle orchestration: fetch → parse → age-filter → dedup →
//! describe → match → notify → persist, per source, followed by one
//! expiration sweep over the whole store.

pub mod domain;
pub mod matcher;
pub mod notify;
pub mod ocr;
pub mod source;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{Obituary, SourceId};
pub use matcher::matches;
pub use notify::{DeliveryReport, EmailNotifier, Notifier, NotifyError};
pub use ocr::{OcrError, TesseractRecognizer, TextRecognizer};
pub use source::{HttpSourceClient, RawListing, SourceClient, SourceError};
pub use store::{ObituaryStore, SqliteStore, StoreError};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::SourceConfig;
use source::{filter_by_age, parse_listings};

/// Counters for one orchestration cycle, for logging and assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sources: Vec<SourceReport>,
    pub expired_removed: u64,
}

/// Counters for a single source within a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub source: String,
    /// Raw entries on the listing page.
    pub listed: usize,
    /// Entries that survived per-entry parsing.
    pub parsed: usize,
    /// Parsed records inside the retention window.
    pub fresh: usize,
    /// Fresh records not yet known to the store.
    pub new: usize,
    /// New records whose description matched a keyword.
    pub matched: usize,
    /// Matched records for which a notification went out.
    pub notified: usize,
}

/// Orchestrator over the four seams: source client, text recognizer,
/// obituary store, and notifier.
pub struct Pipeline<C, T, S, N> {
    client: C,
    recognizer: T,
    store: S,
    notifier: N,
}

impl<C, T, S, N> Pipeline<C, T, S, N>
where
    C: SourceClient,
    T: TextRecognizer,
    S: ObituaryStore,
    N: Notifier,
{
    pub fn new(client: C, recognizer: T, store: S, notifier: N) -> Self {
        Self {
            client,
            recognizer,
            store,
            notifier,
        }
    }

    /// Run one full cycle over every configured source, then sweep expired
    /// records once. Per-source and per-item failures degrade locally; only
    /// a store failure aborts the cycle.
    pub async fn run_cycle(
        &self,
        sources: &[SourceConfig],
        keywords: &[String],
        today: NaiveDate,
    ) -> Result<CycleReport, StoreError> {
        let mut report = CycleReport::default();

        for source in sources {
            report
                .sources
                .push(self.process_source(source, keywords, today).await?);
        }

        // The sweep runs after all sources so no record disappears before
        // its notification decision for this cycle was made.
        report.expired_removed = self.store.delete_expired(today).await?;
        info!(removed = report.expired_removed, "expiration sweep complete");
        Ok(report)
    }

    async fn process_source(
        &self,
        source: &SourceConfig,
        keywords: &[String],
        today: NaiveDate,
    ) -> Result<SourceReport, StoreError> {
        let mut report = SourceReport {
            source: source.identifier.0.clone(),
            ..SourceReport::default()
        };

        let raws = match self.client.fetch_listings(source).await {
            Ok(raws) => raws,
            Err(error) => {
                warn!(
                    source = %source.identifier,
                    %error,
                    "listing fetch failed, continuing with no items for this source"
                );
                Vec::new()
            }
        };
        report.listed = raws.len();

        let parsed = parse_listings(source, raws);
        report.parsed = parsed.len();

        let fresh = filter_by_age(parsed, today);
        report.fresh = fresh.len();

        // Items stay sequential within a source: a later item's dedup check
        // must observe an earlier item's insert.
        for obituary in &fresh {
            if self.store.exists(&obituary.identifier, &obituary.source).await? {
                continue;
            }
            report.new += 1;

            self.process_new(obituary, keywords, &mut report).await;
            self.store.add(obituary).await?;
        }

        Ok(report)
    }

    /// Describe, match, and (on match) notify one first-seen record. The
    /// record is persisted by the caller no matter what happens here, so a
    /// failed description or delivery is never re-attempted in later cycles.
    async fn process_new(
        &self,
        obituary: &Obituary,
        keywords: &[String],
        report: &mut SourceReport,
    ) {
        let description = self.describe(obituary).await;
        if !matcher::matches(&description, keywords) {
            return;
        }
        report.matched += 1;

        match self.notifier.notify(obituary).await {
            Ok(delivery) => {
                report.notified += 1;
                info!(
                    source = %obituary.source,
                    identifier = %obituary.identifier,
                    delivered = delivery.delivered,
                    attempted = delivery.attempted,
                    "notified subscribers about matching notice"
                );
            }
            Err(error) => {
                warn!(
                    source = %obituary.source,
                    identifier = %obituary.identifier,
                    %error,
                    "notification failed, record stays persisted without retry"
                );
            }
        }
    }

    async fn describe(&self, obituary: &Obituary) -> String {
        let image = match self.client.fetch_image(obituary).await {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(
                    source = %obituary.source,
                    identifier = %obituary.identifier,
                    %error,
                    "image fetch failed, treating description as empty"
                );
                return String::new();
            }
        };

        match self.recognizer.recognize(&image).await {
            Ok(text) => text,
            Err(error) => {
                warn!(
                    source = %obituary.source,
                    identifier = %obituary.identifier,
                    %error,
                    "text recognition failed, treating description as empty"
                );
                String::new()
            }
        }
    }
}
