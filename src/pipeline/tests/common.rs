use std::sync::Mutex;

use chrono::NaiveDate;

use crate::config::SourceConfig;
use crate::pipeline::domain::{Obituary, SourceId};
use crate::pipeline::notify::{DeliveryReport, Notifier, NotifyError};
use crate::pipeline::ocr::{OcrError, TextRecognizer};
use crate::pipeline::source::{RawListing, SourceClient, SourceError};
use crate::pipeline::store::{ObituaryStore, StoreError};

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn source_config(identifier: &str) -> SourceConfig {
    SourceConfig {
        identifier: SourceId(identifier.to_string()),
        base_url: format!("https://{identifier}.example"),
        retention_days: 14,
    }
}

pub(super) fn raw_listing(id: &str, name: &str, death_date: &str) -> RawListing {
    RawListing {
        relative_uri: format!("/Begleiten/{id}"),
        full_name: name.to_string(),
        date_of_death: death_date.to_string(),
        image_uri: None,
    }
}

/// Source client fake serving canned listings and recording which images
/// were actually requested.
#[derive(Default)]
pub(super) struct FakeClient {
    pub listings: Vec<RawListing>,
    pub fail_listings: bool,
    pub fail_images: bool,
    pub image_requests: Mutex<Vec<String>>,
}

impl SourceClient for &FakeClient {
    async fn fetch_listings(
        &self,
        source: &SourceConfig,
    ) -> Result<Vec<RawListing>, SourceError> {
        if self.fail_listings {
            return Err(SourceError::Status {
                url: source.base_url.clone(),
                status: 503,
            });
        }
        Ok(self.listings.clone())
    }

    async fn fetch_image(&self, obituary: &Obituary) -> Result<Vec<u8>, SourceError> {
        self.image_requests
            .lock()
            .expect("image request log")
            .push(obituary.identifier.clone());
        if self.fail_images {
            return Err(SourceError::Status {
                url: obituary.image_link.clone(),
                status: 404,
            });
        }
        Ok(vec![0u8; 4])
    }
}

/// Recognizer fake answering a fixed text, or failing when none is set.
#[derive(Default)]
pub(super) struct FixedRecognizer {
    pub text: Option<String>,
}

impl FixedRecognizer {
    pub(super) fn reading(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }
}

impl TextRecognizer for &FixedRecognizer {
    async fn recognize(&self, _image: &[u8]) -> Result<String, OcrError> {
        match &self.text {
            Some(text) => Ok(text.clone()),
            None => Err(OcrError::Engine {
                code: Some(1),
                stderr: "no text layer".to_string(),
            }),
        }
    }
}

/// In-memory store with a sweep counter, mirroring the persistent contract.
#[derive(Default)]
pub(super) struct MemoryStore {
    pub records: Mutex<Vec<Obituary>>,
    pub sweeps: Mutex<Vec<NaiveDate>>,
}

impl MemoryStore {
    pub(super) fn identifiers(&self) -> Vec<String> {
        self.records
            .lock()
            .expect("records")
            .iter()
            .map(|record| record.identifier.clone())
            .collect()
    }
}

impl ObituaryStore for &MemoryStore {
    async fn exists(&self, identifier: &str, source: &SourceId) -> Result<bool, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("records")
            .iter()
            .any(|record| record.identifier == identifier && record.source == *source))
    }

    async fn add(&self, obituary: &Obituary) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("records");
        if records
            .iter()
            .any(|record| record.identifier == obituary.identifier && record.source == obituary.source)
        {
            return Err(StoreError::Conflict);
        }
        records.push(obituary.clone());
        Ok(())
    }

    async fn delete_expired(&self, as_of: NaiveDate) -> Result<u64, StoreError> {
        self.sweeps.lock().expect("sweeps").push(as_of);
        let mut records = self.records.lock().expect("records");
        let before = records.len();
        records.retain(|record| record.expiration_date >= as_of);
        Ok((before - records.len()) as u64)
    }
}

/// Notifier fake recording every delivery request.
#[derive(Default)]
pub(super) struct RecordingNotifier {
    pub fail: bool,
    pub deliveries: Mutex<Vec<Obituary>>,
}

impl RecordingNotifier {
    pub(super) fn notified(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .expect("deliveries")
            .iter()
            .map(|record| record.identifier.clone())
            .collect()
    }
}

impl Notifier for &RecordingNotifier {
    async fn notify(&self, obituary: &Obituary) -> Result<DeliveryReport, NotifyError> {
        if self.fail {
            return Err(NotifyError::Address {
                address: "kaputt@".to_string(),
                reason: "unparsable".to_string(),
            });
        }
        self.deliveries
            .lock()
            .expect("deliveries")
            .push(obituary.clone());
        Ok(DeliveryReport {
            attempted: 1,
            delivered: 1,
        })
    }
}
