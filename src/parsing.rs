//! HTML parsing for MLOL pages.
//!
//! This module turns listing pages, detail pages, the user's resources page and
//! reservation responses into typed data. The functions here are pure: they take
//! parsed documents and return owned values, never performing I/O.
//!
//! Extraction is best-effort. A listing item that lacks an ID or a title is
//! skipped with a warning; every detail-page field is extracted on its own so
//! that one missing or malformed element never hides the others.

use crate::schema::PageSchema;
use crate::types::{Book, BookDetails, BookStatus};
use crate::{MlolError, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Parser for MLOL pages, driven by a [`PageSchema`].
#[derive(Debug, Clone)]
pub struct MlolParser {
    schema: PageSchema,
    selectors: Selectors,
    book_id_pattern: Regex,
    loan_id_pattern: Regex,
}

/// Schema selectors, compiled once.
#[derive(Debug, Clone)]
struct Selectors {
    result_item: Selector,
    result_title: Selector,
    result_link: Selector,
    result_author_link: Selector,
    result_author_fallback: Selector,
    pager: Selector,
    book_title: Selector,
    book_authors: Selector,
    book_publisher: Selector,
    book_isbn: Selector,
    book_status: Selector,
    book_description: Selector,
    book_language: Selector,
    book_year: Selector,
    format_label: Selector,
    format_value: Selector,
    anchor: Selector,
    loan_download_link: Selector,
    reservation_message: Selector,
}

impl Selectors {
    fn compile(schema: &PageSchema) -> Result<Self> {
        Ok(Self {
            result_item: compile_selector(&schema.result_item)?,
            result_title: compile_selector(&schema.result_title)?,
            result_link: compile_selector(&schema.result_link)?,
            result_author_link: compile_selector(&schema.result_author_link)?,
            result_author_fallback: compile_selector(&schema.result_author_fallback)?,
            pager: compile_selector(&schema.pager)?,
            book_title: compile_selector(&schema.book_title)?,
            book_authors: compile_selector(&schema.book_authors)?,
            book_publisher: compile_selector(&schema.book_publisher)?,
            book_isbn: compile_selector(&schema.book_isbn)?,
            book_status: compile_selector(&schema.book_status)?,
            book_description: compile_selector(&schema.book_description)?,
            book_language: compile_selector(&schema.book_language)?,
            book_year: compile_selector(&schema.book_year)?,
            format_label: compile_selector(&schema.format_label)?,
            format_value: compile_selector(&schema.format_value)?,
            anchor: compile_selector("a[href]")?,
            loan_download_link: compile_selector(&schema.loan_download_link)?,
            reservation_message: compile_selector(&schema.reservation_message)?,
        })
    }
}

fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| MlolError::InvalidSchema(format!("selector '{selector}': {e:?}")))
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| MlolError::InvalidSchema(format!("pattern '{pattern}': {e}")))
}

/// Trimmed text content of an element.
fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Split a semicolon-delimited author list.
///
/// Returns `None` when the text holds no author at all.
pub fn split_authors(text: &str) -> Option<Vec<String>> {
    let authors: Vec<String> = text
        .split(';')
        .map(str::trim)
        .filter(|author| !author.is_empty())
        .map(str::to_string)
        .collect();

    if authors.is_empty() {
        None
    } else {
        Some(authors)
    }
}

/// Parse a combined format string such as `"EPUB/PDF con DRM Adobe"`.
///
/// The first whitespace-delimited token lists the formats separated by `/`;
/// DRM protection is signalled by the token "drm" anywhere in the text.
///
/// ```rust
/// use mlol_client::parsing::parse_format_string;
///
/// assert_eq!(
///     parse_format_string("EPUB/PDF con DRM Adobe"),
///     Some((vec!["epub".to_string(), "pdf".to_string()], true))
/// );
/// assert_eq!(
///     parse_format_string("PDF senza protezioni"),
///     Some((vec!["pdf".to_string()], false))
/// );
/// assert_eq!(parse_format_string("   "), None);
/// ```
pub fn parse_format_string(text: &str) -> Option<(Vec<String>, bool)> {
    let first_token = text.split_whitespace().next()?;
    let formats: Vec<String> = first_token
        .split('/')
        .map(|format| format.trim().to_lowercase())
        .filter(|format| !format.is_empty())
        .collect();

    if formats.is_empty() {
        return None;
    }

    let drm = text.to_lowercase().contains("drm");
    Some((formats, drm))
}

impl MlolParser {
    /// Create a parser for the current portal layout.
    pub fn new() -> Self {
        Self::with_schema(PageSchema::default())
            .expect("the built-in page schema only contains valid selectors")
    }

    /// Create a parser for a custom layout.
    ///
    /// Fails with [`MlolError::InvalidSchema`] if a selector or pattern does not compile.
    pub fn with_schema(schema: PageSchema) -> Result<Self> {
        let selectors = Selectors::compile(&schema)?;
        let book_id_pattern = compile_pattern(&schema.book_id_pattern)?;
        let loan_id_pattern = compile_pattern(&schema.loan_id_pattern)?;

        Ok(Self {
            schema,
            selectors,
            book_id_pattern,
            loan_id_pattern,
        })
    }

    pub fn schema(&self) -> &PageSchema {
        &self.schema
    }

    // === LISTING PAGES ===

    /// Parse the result items of a search or listing page, in page order.
    ///
    /// Items whose ID or title cannot be read are skipped and logged with their
    /// 1-based position.
    pub fn parse_search_page(&self, document: &Html) -> Vec<Book> {
        let mut books = Vec::new();

        for (index, item) in document.select(&self.selectors.result_item).enumerate() {
            let Some((id, title)) = self.parse_result_identity(item) else {
                log::warn!(
                    "Could not parse ID or title. Skipping book #{}...",
                    index + 1
                );
                continue;
            };

            let authors = self.parse_result_authors(item);
            books.push(Book::partial(&id, &title, authors));
        }

        log::debug!("Parsed {} books from listing page", books.len());
        books
    }

    fn parse_result_identity(&self, item: ElementRef) -> Option<(String, String)> {
        let title = item
            .select(&self.selectors.result_title)
            .next()?
            .value()
            .attr(&self.schema.result_title_attr)?
            .trim()
            .to_string();

        let href = item
            .select(&self.selectors.result_link)
            .next()?
            .value()
            .attr("href")?;
        let id = self
            .book_id_pattern
            .captures(href.trim())?
            .get(1)?
            .as_str()
            .to_string();

        if id.is_empty() || title.is_empty() {
            return None;
        }
        Some((id, title))
    }

    fn parse_result_authors(&self, item: ElementRef) -> Option<Vec<String>> {
        let author_element = item
            .select(&self.selectors.result_author_link)
            .next()
            .or_else(|| item.select(&self.selectors.result_author_fallback).next())?;

        split_authors(&element_text(author_element))
    }

    /// Total page count announced by the pager, defaulting to a single page.
    pub fn parse_page_count(&self, document: &Html) -> u32 {
        document
            .select(&self.selectors.pager)
            .next()
            .and_then(|pager| pager.value().attr(&self.schema.pager_pages_attr))
            .and_then(|pages| pages.trim().parse::<u32>().ok())
            .filter(|pages| *pages > 0)
            .unwrap_or(1)
    }

    // === DETAIL PAGES ===

    /// Extract every field of a detail page independently.
    pub fn parse_book_page(&self, document: &Html) -> BookDetails {
        let title = self.select_text(document, &self.selectors.book_title);

        let authors = self
            .select_text(document, &self.selectors.book_authors)
            .and_then(|text| split_authors(&text));

        let publisher = self.select_text(document, &self.selectors.book_publisher);

        let isbns: Vec<String> = document
            .select(&self.selectors.book_isbn)
            .map(element_text)
            .collect();
        let isbns = if isbns.is_empty() { None } else { Some(isbns) };

        let status = self
            .select_text(document, &self.selectors.book_status)
            .map(|text| BookStatus::from_indicator(&text));

        let description = self.select_text(document, &self.selectors.book_description);
        let language = self.select_text(document, &self.selectors.book_language);

        let year = self
            .select_text(document, &self.selectors.book_year)
            .and_then(|text| match text.parse::<i32>() {
                Ok(year) => Some(year),
                Err(e) => {
                    log::debug!("Unparseable publication year '{text}': {e}");
                    None
                }
            });

        let (formats, drm) = match self
            .format_text(document)
            .as_deref()
            .and_then(parse_format_string)
        {
            Some((formats, drm)) => (Some(formats), Some(drm)),
            None => {
                log::warn!(
                    "Failed to parse formats for book {}",
                    title.as_deref().unwrap_or("<unknown title>")
                );
                (None, None)
            }
        };

        BookDetails {
            title,
            authors,
            publisher,
            isbns,
            status,
            description,
            language,
            year,
            formats,
            drm,
        }
    }

    fn select_text(&self, document: &Html, selector: &Selector) -> Option<String> {
        document.select(selector).next().map(element_text)
    }

    /// Text of the value next to the format label.
    fn format_text(&self, document: &Html) -> Option<String> {
        let label = document
            .select(&self.selectors.format_label)
            .find(|label| {
                label
                    .text()
                    .collect::<String>()
                    .contains(&self.schema.format_label_text)
            })?;

        let container = ElementRef::wrap(label.parent()?.parent()?)?;
        container
            .select(&self.selectors.format_value)
            .next()
            .map(element_text)
    }

    /// Whether a response URL is the portal's generic "not available" notice.
    pub fn is_unavailable_page(&self, url: &str) -> bool {
        url.contains(&self.schema.unavailable_page_marker)
    }

    // === RESOURCES PAGE ===

    /// Find the loan ID of a borrowed book on the user's resources page.
    pub fn parse_loan_id(&self, document: &Html, book_id: &str) -> Option<String> {
        // The ID must not be part of a longer number
        let book_link = Regex::new(&format!(r"(^|\D){}(\D|$)", regex::escape(book_id))).ok()?;

        let anchor = document.select(&self.selectors.anchor).find(|anchor| {
            anchor
                .value()
                .attr("href")
                .is_some_and(|href| book_link.is_match(href))
        })?;

        let entry = ElementRef::wrap(anchor.parent()?.parent()?)?;
        let href = entry
            .select(&self.selectors.loan_download_link)
            .next()?
            .value()
            .attr("href")?;

        Some(
            self.loan_id_pattern
                .captures(href.trim())?
                .get(1)?
                .as_str()
                .to_string(),
        )
    }

    // === RESERVATION AND DOWNLOAD RESPONSES ===

    /// Lower-cased reservation outcome message, if the page has one.
    pub fn parse_reservation_message(&self, document: &Html) -> Option<String> {
        self.select_text(document, &self.selectors.reservation_message)
            .map(|message| message.to_lowercase())
    }

    /// Whether a download response body carries a fulfillment token.
    pub fn is_fulfillment_token(&self, body: &[u8]) -> bool {
        body.starts_with(self.schema.fulfillment_token_prefix.as_bytes())
    }
}

impl Default for MlolParser {
    fn default() -> Self {
        Self::new()
    }
}
