use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use super::domain::Obituary;
use crate::config::SourceConfig;

/// Fixed listing page: the upstream contract exposes the newest notices on
/// page 1 and we never paginate past it.
pub const LISTING_PATH: &str = "/json/OrdersPage?nr=1&size=20";

/// One entry of the listing endpoint's `orders` array, as served.
#[derive(Debug, Clone, Deserialize)]
pub struct RawListing {
    #[serde(rename = "relativeUri")]
    pub relative_uri: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    /// Locale long-date string, e.g. "3. März 2024".
    #[serde(rename = "dateOfDeath")]
    pub date_of_death: String,
    #[serde(
        rename = "imageUri",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub image_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    orders: Vec<RawListing>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered status {status}")]
    Status { url: String, status: u16 },
}

/// Gateway to one undertaker's public endpoints so the pipeline can be
/// exercised without network access.
#[allow(async_fn_in_trait)]
pub trait SourceClient {
    /// Fetch the raw listing page. A non-2xx answer is not an error: the
    /// source is degraded to an empty page for this cycle.
    async fn fetch_listings(
        &self,
        source: &SourceConfig,
    ) -> Result<Vec<RawListing>, SourceError>;

    /// Fetch the portrait image bytes for a notice.
    async fn fetch_image(&self, obituary: &Obituary) -> Result<Vec<u8>, SourceError>;
}

/// Production client on top of a shared `reqwest` connection pool.
#[derive(Debug, Default)]
pub struct HttpSourceClient {
    http: reqwest::Client,
}

impl HttpSourceClient {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceClient for HttpSourceClient {
    async fn fetch_listings(
        &self,
        source: &SourceConfig,
    ) -> Result<Vec<RawListing>, SourceError> {
        let url = join_url(&source.base_url, LISTING_PATH);
        let response = self.http.get(&url).send().await.map_err(|source| {
            SourceError::Transport {
                url: url.clone(),
                source,
            }
        })?;

        if !response.status().is_success() {
            warn!(
                source = %source.identifier,
                %url,
                status = response.status().as_u16(),
                "listing endpoint unavailable, continuing with an empty page"
            );
            return Ok(Vec::new());
        }

        let page: ListingPage = response
            .json()
            .await
            .map_err(|source| SourceError::Transport {
                url: url.clone(),
                source,
            })?;
        Ok(page.orders)
    }

    async fn fetch_image(&self, obituary: &Obituary) -> Result<Vec<u8>, SourceError> {
        let url = obituary.image_link.clone();
        let response = self.http.get(&url).send().await.map_err(|source| {
            SourceError::Transport {
                url: url.clone(),
                source,
            }
        })?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| SourceError::Transport { url, source })?;
        Ok(bytes.to_vec())
    }
}

/// Convert raw listing entries into domain records. Each entry is isolated:
/// a missing identifier segment or malformed death date skips that one entry
/// with a diagnostic instead of aborting the batch.
pub fn parse_listings(source: &SourceConfig, raws: Vec<RawListing>) -> Vec<Obituary> {
    raws.into_iter()
        .filter_map(|raw| match parse_listing(source, &raw) {
            Some(obituary) => Some(obituary),
            None => {
                warn!(
                    source = %source.identifier,
                    uri = %raw.relative_uri,
                    date = %raw.date_of_death,
                    "skipping listing entry with missing or malformed fields"
                );
                None
            }
        })
        .collect()
}

fn parse_listing(source: &SourceConfig, raw: &RawListing) -> Option<Obituary> {
    let identifier = raw
        .relative_uri
        .split('/')
        .filter(|segment| !segment.is_empty())
        .nth(1)?
        .to_string();
    let date_of_death = parse_death_date(&raw.date_of_death)?;
    let expiration_date = date_of_death + Duration::days(source.retention_days);

    let detail_link = join_url(&source.base_url, &raw.relative_uri);
    let image_link = match &raw.image_uri {
        Some(uri) => join_url(&source.base_url, uri),
        None => format!("{detail_link}/Profilbild"),
    };

    Some(Obituary {
        identifier,
        name: raw.full_name.clone(),
        date_of_death,
        expiration_date,
        source: source.identifier.clone(),
        detail_link,
        image_link,
    })
}

const GERMAN_MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// Parse the source's `d. Monat yyyy` long-date format against an explicit
/// month table, independent of the process locale.
pub fn parse_death_date(value: &str) -> Option<NaiveDate> {
    let mut parts = value.split_whitespace();
    let day = parts.next()?.strip_suffix('.')?.parse::<u32>().ok()?;
    let month_name = parts.next()?;
    let year = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let month = GERMAN_MONTHS
        .iter()
        .position(|name| *name == month_name)? as u32
        + 1;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Retain only records that have not yet expired. The boundary is inclusive:
/// a record expiring today is still processed today.
pub fn filter_by_age(obituaries: Vec<Obituary>, today: NaiveDate) -> Vec<Obituary> {
    obituaries
        .into_iter()
        .filter(|obituary| obituary.expiration_date >= today)
        .collect()
}

fn join_url(base: &str, relative: &str) -> String {
    let base = base.trim_end_matches('/');
    if relative.starts_with('/') {
        format!("{base}{relative}")
    } else {
        format!("{base}/{relative}")
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::domain::SourceId;

    fn config() -> SourceConfig {
        SourceConfig {
            identifier: SourceId("bestatter-nord".to_string()),
            base_url: "https://bestatter.example/".to_string(),
            retention_days: 14,
        }
    }

    fn raw(uri: &str, name: &str, date: &str) -> RawListing {
        RawListing {
            relative_uri: uri.to_string(),
            full_name: name.to_string(),
            date_of_death: date.to_string(),
            image_uri: None,
        }
    }

    #[test]
    fn parses_german_long_dates() {
        assert_eq!(
            parse_death_date("3. März 2024"),
            NaiveDate::from_ymd_opt(2024, 3, 3)
        );
        assert_eq!(
            parse_death_date("31. Dezember 2023"),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
    }

    #[test]
    fn rejects_malformed_dates() {
        assert_eq!(parse_death_date(""), None);
        assert_eq!(parse_death_date("3 März 2024"), None);
        assert_eq!(parse_death_date("3. Mars 2024"), None);
        assert_eq!(parse_death_date("3. März 2024 extra"), None);
        assert_eq!(parse_death_date("32. Januar 2024"), None);
    }

    #[test]
    fn listing_entry_becomes_obituary_with_resolved_links() {
        let parsed = parse_listings(
            &config(),
            vec![raw("/Begleiten/abc-123", "Erika Muster", "3. März 2024")],
        );

        assert_eq!(parsed.len(), 1);
        let obituary = &parsed[0];
        assert_eq!(obituary.identifier, "abc-123");
        assert_eq!(obituary.name, "Erika Muster");
        assert_eq!(
            obituary.date_of_death,
            NaiveDate::from_ymd_opt(2024, 3, 3).expect("valid date")
        );
        assert_eq!(
            obituary.expiration_date,
            NaiveDate::from_ymd_opt(2024, 3, 17).expect("valid date")
        );
        assert_eq!(
            obituary.detail_link,
            "https://bestatter.example/Begleiten/abc-123"
        );
        assert_eq!(
            obituary.image_link,
            "https://bestatter.example/Begleiten/abc-123/Profilbild"
        );
    }

    #[test]
    fn explicit_image_uri_wins_over_derived_path() {
        let mut listing = raw("/Begleiten/abc-123", "Erika Muster", "3. März 2024");
        listing.image_uri = Some("/Bilder/abc-123.jpg".to_string());

        let parsed = parse_listings(&config(), vec![listing]);
        assert_eq!(
            parsed[0].image_link,
            "https://bestatter.example/Bilder/abc-123.jpg"
        );
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let parsed = parse_listings(
            &config(),
            vec![
                raw("/Begleiten/ok-1", "Erika Muster", "3. März 2024"),
                raw("/Begleiten/bad-date", "Hans Muster", "gestern"),
                raw("/", "Kein Pfad", "3. März 2024"),
                raw("/Begleiten/ok-2", "Max Muster", "4. März 2024"),
            ],
        );

        let identifiers: Vec<&str> = parsed
            .iter()
            .map(|obituary| obituary.identifier.as_str())
            .collect();
        assert_eq!(identifiers, ["ok-1", "ok-2"]);
    }

    #[test]
    fn age_filter_is_inclusive_at_the_boundary() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid date");
        let parsed = parse_listings(
            &config(),
            vec![
                raw("/Begleiten/expires-today", "A", "25. Februar 2024"),
                raw("/Begleiten/expired-yesterday", "B", "24. Februar 2024"),
                raw("/Begleiten/still-fresh", "C", "3. März 2024"),
            ],
        );

        let fresh = filter_by_age(parsed, today);
        let identifiers: Vec<&str> = fresh
            .iter()
            .map(|obituary| obituary.identifier.as_str())
            .collect();
        assert_eq!(identifiers, ["expires-today", "still-fresh"]);
    }

    #[test]
    fn retention_scenario_from_march_listing() {
        let parsed = parse_listings(
            &config(),
            vec![raw("/Begleiten/abc-123", "Erika Muster", "3. März 2024")],
        );

        let as_of_march_10 = NaiveDate::from_ymd_opt(2024, 3, 10).expect("valid date");
        let as_of_march_20 = NaiveDate::from_ymd_opt(2024, 3, 20).expect("valid date");
        assert_eq!(filter_by_age(parsed.clone(), as_of_march_10).len(), 1);
        assert!(filter_by_age(parsed, as_of_march_20).is_empty());
    }
}
