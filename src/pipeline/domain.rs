use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier of the undertaker a record came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub String);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One published notice. Records are write-once: created during listing
/// parse, persisted on first sight, removed by the expiration sweep.
/// (`identifier`, `source`) is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obituary {
    pub identifier: String,
    pub name: String,
    pub date_of_death: NaiveDate,
    /// `date_of_death` plus the source's retention window; derived once at
    /// parse time and never mutated.
    pub expiration_date: NaiveDate,
    pub source: SourceId,
    pub detail_link: String,
    pub image_link: String,
}
