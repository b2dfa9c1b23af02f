//! Page schema for MLOL portal markup.
//!
//! Every CSS selector, attribute name and identifier pattern the parsers and the
//! login flow depend on lives in [`PageSchema`]. When the portal changes its
//! layout, a new schema value is all that needs to change; the parsing logic in
//! [`crate::parsing`] never hard-codes markup details.
//!
//! The fixed relative paths of the portal endpoints are kept next to it in
//! [`Endpoints`].

use serde::{Deserialize, Serialize};

/// Relative paths of the portal endpoints used by the client.
pub struct Endpoints;

impl Endpoints {
    /// Search and listing pages
    pub const SEARCH: &'static str = "/media/ricerca.aspx";
    /// Login form
    pub const LOGIN: &'static str = "/user/logform.aspx";
    /// The authenticated user's resources (active loans)
    pub const RESOURCES: &'static str = "/user/risorse.aspx";
    /// Book detail page
    pub const GET_BOOK: &'static str = "/media/scheda.aspx";
    /// Redownload of an owned book, keyed by loan ID
    pub const REDOWNLOAD: &'static str = "/help/dlrepeat.aspx";
    /// Referer page for the redownload endpoint
    pub const REDOWNLOAD_REFERER: &'static str = "/help/helpdeskdl.aspx";
    /// Direct download of an available book
    pub const DOWNLOAD: &'static str = "/media/downloadebadok.aspx";
    /// Referer page for the direct download endpoint
    pub const DOWNLOAD_REFERER: &'static str = "/media/downloadebad2.aspx";
    /// Reservation dialog
    pub const PRE_RESERVE: &'static str = "/media/prenota.aspx";
    /// Reservation submission
    pub const RESERVE: &'static str = "/media/prenota2.aspx";
}

/// Selectors and markers describing the portal's HTML.
///
/// Selector fields are CSS selectors understood by [`scraper::Selector`]; pattern
/// fields are regular expressions whose first capture group is the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSchema {
    // Listing pages
    /// One search result
    pub result_item: String,
    /// Element inside a result carrying the title attribute
    pub result_title: String,
    /// Attribute holding the result title
    pub result_title_attr: String,
    /// Anchor inside a result linking to the detail page
    pub result_link: String,
    /// Pattern extracting the book ID from the result link
    pub book_id_pattern: String,
    /// Author links inside a result
    pub result_author_link: String,
    /// Schema-annotated author paragraph, used when no author link exists
    pub result_author_fallback: String,
    /// Pager element
    pub pager: String,
    /// Pager attribute with the total page count
    pub pager_pages_attr: String,

    // Detail pages
    /// Book title
    pub book_title: String,
    /// Semicolon-delimited author list
    pub book_authors: String,
    /// Publisher name
    pub book_publisher: String,
    /// ISBN elements (all of them are collected)
    pub book_isbn: String,
    /// Status panel
    pub book_status: String,
    /// Description block
    pub book_description: String,
    /// Language
    pub book_language: String,
    /// Publication year
    pub book_year: String,
    /// Label elements searched for the format label
    pub format_label: String,
    /// Text identifying the format label
    pub format_label_text: String,
    /// Value element, looked up under the label's grandparent
    pub format_value: String,
    /// Redirect target of books that are not available to the library
    pub unavailable_page_marker: String,

    // Resources page
    /// Download button link inside a loan entry
    pub loan_download_link: String,
    /// Pattern extracting the loan ID from the download button link
    pub loan_id_pattern: String,

    // Reservation
    /// Element holding the reservation outcome message
    pub reservation_message: String,

    // Login
    /// Name of the username field identifying the login form
    pub login_username_field: String,
    /// Name of the password field
    pub login_password_field: String,

    // Downloads
    /// Prefix of a successful download response body
    pub fulfillment_token_prefix: String,
}

impl Default for PageSchema {
    fn default() -> Self {
        Self {
            result_item: ".result-item".to_string(),
            result_title: "h4".to_string(),
            result_title_attr: "title".to_string(),
            result_link: "a".to_string(),
            book_id_pattern: r"id=(\d+)$".to_string(),
            result_author_link: "p > a.authorref".to_string(),
            result_author_fallback: "p[itemprop=\"author\"]".to_string(),
            pager: "#pager".to_string(),
            pager_pages_attr: "data-pages".to_string(),

            book_title: ".book-title".to_string(),
            book_authors: ".authors_title".to_string(),
            book_publisher: ".publisher_title > span > a".to_string(),
            book_isbn: "[itemprop=\"isbn\"]".to_string(),
            book_status: ".panel-mlol".to_string(),
            book_description: "div[itemprop=\"description\"]".to_string(),
            book_language: "span[itemprop=\"inLanguage\"]".to_string(),
            book_year: "span[itemprop=\"datePublished\"]".to_string(),
            format_label: "b".to_string(),
            format_label_text: "FORMATO".to_string(),
            format_value: "span".to_string(),
            unavailable_page_marker: "alert.aspx".to_string(),

            loan_download_link: ".download_button.bottom-buffer-10 > a".to_string(),
            loan_id_pattern: r"idp=(\d+)$".to_string(),

            reservation_message: "#lblInfo".to_string(),

            login_username_field: "lusername".to_string(),
            login_password_field: "lpassword".to_string(),

            fulfillment_token_prefix: "<fulfillmentToken".to_string(),
        }
    }
}
