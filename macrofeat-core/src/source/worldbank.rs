//! World Bank API v2 client: URL building, XML parsing, and fetch.

use super::{DateRange, IndicatorSource, LongTable, Observation};
use crate::config::SourceConfig;
use crate::error::{MacroError, Result};
use crate::panel::io::parse_period;
use async_trait::async_trait;
use std::time::Duration;

pub const WORLD_BANK_API_BASE: &str = "http://api.worldbank.org/v2/";
const USER_AGENT: &str = concat!("macrofeat/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the World Bank indicators API.
pub struct WorldBankSource {
    client: reqwest::Client,
    base_url: String,
    per_page: u32,
}

impl WorldBankSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MacroError::fetch(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            per_page: config.per_page,
        })
    }

    /// Download one indicator and parse it into a long-form table.
    ///
    /// When the response reports several pages, pages 2..=N are requested in
    /// turn and their records appended in page order.
    pub async fn fetch_indicator(
        &self,
        indicator: &str,
        entities: &[String],
        range: &DateRange,
    ) -> Result<LongTable> {
        let url = build_indicator_url(&self.base_url, entities, indicator, self.per_page, range);
        let body = self.get_page(&url, indicator).await?;
        let mut table = parse_indicator_response(&body, indicator)?;

        let pages = response_pages(&body);
        for page in 2..=pages {
            tracing::debug!(indicator, page, pages, "Fetching next page");
            let body = self.get_page(&format!("{url}&page={page}"), indicator).await?;
            let next = parse_indicator_response(&body, indicator)?;
            table.observations.extend(next.observations);
        }
        Ok(table)
    }

    async fn get_page(&self, url: &str, indicator: &str) -> Result<String> {
        tracing::debug!(%url, "World Bank request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MacroError::fetch(format!("World Bank request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MacroError::fetch(format!(
                "World Bank API returned status {status} for {indicator}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| MacroError::fetch(format!("Failed to read World Bank response: {e}")))
    }
}

#[async_trait]
impl IndicatorSource for WorldBankSource {
    async fn fetch(
        &self,
        indicator: &str,
        entities: &[String],
        range: &DateRange,
    ) -> Result<LongTable> {
        self.fetch_indicator(indicator, entities, range).await
    }

    fn describe(&self) -> String {
        format!("World Bank API ({})", self.base_url)
    }
}

// ── URL Building ──────────────────────────────────────────────

/// `{base}country/{e1;e2}/indicator/{code}?per_page=N[&date=start:end]`
pub fn build_indicator_url(
    base_url: &str,
    entities: &[String],
    indicator: &str,
    per_page: u32,
    range: &DateRange,
) -> String {
    let base = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{base_url}/")
    };
    let codes = entities
        .iter()
        .map(|e| urlencoding::encode(e.trim()).into_owned())
        .collect::<Vec<_>>()
        .join(";");
    let mut url = format!(
        "{base}country/{codes}/indicator/{}?per_page={per_page}",
        urlencoding::encode(indicator.trim())
    );
    if let Some(dates) = range.as_query() {
        url.push_str("&date=");
        url.push_str(&dates);
    }
    url
}

// ── XML Parsing ───────────────────────────────────────────────

/// Parse a World Bank XML document into observations for `indicator`.
///
/// The root `<wb:data page=.. pages=..>` wraps one `<wb:data>` record per
/// observation. An `<wb:error>` document is reported as a fetch error.
pub fn parse_indicator_response(xml: &str, indicator: &str) -> Result<LongTable> {
    if xml.contains("<wb:error") {
        let message = extract_tag_text(xml, "wb:message")
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(MacroError::fetch(format!(
            "World Bank API error for {indicator}: {}",
            unescape_xml(&message)
        )));
    }
    if !xml.contains("<wb:data") {
        return Err(MacroError::parse(format!(
            "World Bank response for {indicator} is not a data document"
        )));
    }

    if let Some(root) = opening_tag(xml, "wb:data") {
        let page = extract_attribute(root, "page").unwrap_or_default();
        let total = extract_attribute(root, "total").unwrap_or_default();
        tracing::debug!(indicator, page = %page, total = %total, "World Bank response");
    }

    let mut table = LongTable::new(indicator);
    for record in extract_records(xml) {
        table.observations.push(parse_record(record, indicator)?);
    }
    Ok(table)
}

/// Page count from the root `pages` attribute; 1 when absent.
pub fn response_pages(xml: &str) -> u32 {
    opening_tag(xml, "wb:data")
        .and_then(|root| extract_attribute(root, "pages"))
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1)
}

/// The `<wb:data>` record blocks. Records carry no attributes; the root does.
fn extract_records(xml: &str) -> Vec<&str> {
    let start_tag = "<wb:data>";
    let end_tag = "</wb:data>";
    let mut records = Vec::new();
    let mut search_from = 0;

    while let Some(pos) = xml[search_from..].find(start_tag) {
        let start = search_from + pos;
        let Some(end_pos) = xml[start..].find(end_tag) else {
            break;
        };
        let end = start + end_pos + end_tag.len();
        records.push(&xml[start..end]);
        search_from = end;
    }
    records
}

fn parse_record(record: &str, indicator: &str) -> Result<Observation> {
    let raw_date = extract_tag_text(record, "wb:date")
        .ok_or_else(|| MacroError::parse(format!("{indicator}: record without <wb:date>")))?;
    let date = parse_period(&raw_date)
        .ok_or_else(|| MacroError::parse(format!("{indicator}: unparseable date '{raw_date}'")))?;

    let country_tag = opening_tag(record, "wb:country");
    let entity = extract_tag_text(record, "wb:countryiso3code")
        .filter(|c| !c.is_empty())
        .or_else(|| country_tag.and_then(|t| extract_attribute(t, "id")))
        .ok_or_else(|| MacroError::parse(format!("{indicator}: record without entity code")))?;
    let entity_name = extract_tag_text(record, "wb:country")
        .map(|n| unescape_xml(&n))
        .unwrap_or_default();

    let value = match extract_tag_text(record, "wb:value") {
        Some(v) if !v.is_empty() => Some(v.parse::<f64>().map_err(|_| {
            MacroError::parse(format!("{indicator}: value '{v}' is not numeric"))
        })?),
        _ => None,
    };

    let series = opening_tag(record, "wb:indicator")
        .and_then(|t| extract_attribute(t, "id"))
        .unwrap_or_else(|| indicator.to_string());

    Ok(Observation {
        entity,
        entity_name,
        date,
        value,
        indicator: series,
    })
}

/// The opening tag `<tag ...>` (attributes included) of the first `tag` element.
fn opening_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}");
    let mut from = 0;
    while let Some(pos) = xml[from..].find(&open) {
        let start = from + pos;
        let after = xml[start + open.len()..].chars().next()?;
        if after == '>' || after == '/' || after.is_whitespace() {
            let end = xml[start..].find('>')? + start + 1;
            return Some(&xml[start..end]);
        }
        from = start + open.len();
    }
    None
}

/// Text content of the first `<tag>text</tag>`. A self-closing `<tag/>` is empty.
fn extract_tag_text(xml: &str, tag: &str) -> Option<String> {
    let open = opening_tag(xml, tag)?;
    if open.ends_with("/>") {
        return Some(String::new());
    }
    let close = format!("</{tag}>");
    let open_start = xml.find(open)?;
    let content_start = open_start + open.len();
    let content_end = xml[content_start..].find(&close)? + content_start;
    Some(xml[content_start..content_end].trim().to_string())
}

/// Attribute value from a tag string.
fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let search = format!(" {attr}=\"");
    let start = tag.find(&search)? + search.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
