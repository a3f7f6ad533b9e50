//! NFL gameday accountability (fines) page scraper.
//!
//! The page has one `div.select-table__table` per week, each with a few
//! `<p>Label: value</p>` summary lines and a table of fined players whose first
//! row is the header. The parsing is naive string work tailored to that layout.

use crate::domain::model::{Record, Table};
use crate::domain::ports::{Clock, DatasetAdapter, SystemClock};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

pub const DEFAULT_FINES_URL: &str =
    "https://operations.nfl.com/inside-football-ops/rules-enforcement/gameday-accountability/";

static SECTION_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div\b[^>]*\bclass\s*=\s*"[^"]*\bselect-table__table\b[^"]*"[^>]*>"#)
        .expect("section pattern")
});
static DATA_WEEK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)\bdata-week\s*=\s*"([^"]*)""#).expect("week pattern"));
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("paragraph pattern"));
static TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").expect("table pattern"));
static ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").expect("row pattern"));
static CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(th|td)\b[^>]*>(.*?)</(?:th|td)>").expect("cell pattern")
});

/// One weekly section of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekSection {
    pub week: String,
    pub summary: Map<String, Value>,
    /// Table rows; the first one is the header.
    pub rows: Vec<Vec<String>>,
}

pub struct FinesScraper {
    client: Client,
    url: String,
    clock: Arc<dyn Clock>,
}

impl FinesScraper {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Turns a fetched page into fines records.
    pub fn parse_page(&self, html: &str) -> Result<Table> {
        let sections = parse_sections(html);
        if sections.is_empty() {
            return Err(EtlError::processing(format!(
                "no weekly fines sections found at {}",
                self.url
            )));
        }

        let scraped_at = self.clock.now().to_rfc3339();
        let mut records = Vec::new();

        for section in sections {
            let Some((header, rows)) = section.rows.split_first() else {
                continue;
            };

            for row in rows.iter().filter(|r| r.len() == header.len()) {
                let mut data: HashMap<String, Value> = header
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned().map(Value::String))
                    .collect();
                data.insert("week".into(), Value::String(section.week.clone()));
                data.insert("weekSummary".into(), Value::Object(section.summary.clone()));
                data.insert("scraped_at".into(), Value::String(scraped_at.clone()));
                data.insert("source_url".into(), Value::String(self.url.clone()));
                records.push(Record { data });
            }
        }

        tracing::debug!("🧾 Parsed {} fines records", records.len());
        Ok(Table::from_records(records))
    }
}

#[async_trait]
impl DatasetAdapter for FinesScraper {
    async fn fetch(&self, _seasons: Option<&[u16]>) -> Result<Table> {
        tracing::debug!("🌐 GET {}", self.url);
        let html = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        self.parse_page(&html)
    }
}

/// Splits the page into weekly sections. A section runs from its opening div
/// to the next section (or the end of the page).
pub fn parse_sections(html: &str) -> Vec<WeekSection> {
    let opens: Vec<_> = SECTION_OPEN.find_iter(html).collect();
    let mut sections = Vec::new();

    for (i, open) in opens.iter().enumerate() {
        let Some(week) = DATA_WEEK
            .captures(open.as_str())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };

        let end = opens.get(i + 1).map_or(html.len(), |next| next.start());
        let body = &html[open.end()..end];

        let mut summary = Map::new();
        for p in PARAGRAPH.captures_iter(body) {
            let text = text_of(&p[1]);
            if let Some((key, value)) = text.split_once(':') {
                summary.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
            }
        }

        let rows = TABLE
            .captures(body)
            .map(|t| parse_rows(&t[1]))
            .unwrap_or_default();

        sections.push(WeekSection {
            week,
            summary,
            rows,
        });
    }

    sections
}

fn parse_rows(table: &str) -> Vec<Vec<String>> {
    ROW.captures_iter(table)
        .map(|tr| {
            CELL.captures_iter(&tr[1])
                .map(|cell| text_of(&cell[2]))
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

/// Visible text of an HTML fragment: tags removed, entities decoded, whitespace collapsed.
fn text_of(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
