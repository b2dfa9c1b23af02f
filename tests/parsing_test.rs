mod common;

use common::fixture;
use mlol_client::{BookStatus, Html, MlolParser};

#[test_log::test]
fn test_search_page_parsing() {
    let parser = MlolParser::new();
    let document = Html::parse_document(&fixture("search_page_1.html"));

    let books = parser.parse_search_page(&document);

    // The result item without a detail link is skipped
    let ids: Vec<&str> = books.iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["150283901", "150283955", "150284010"]);

    assert_eq!(books[0].title, "Il barone rampante");
    assert_eq!(books[0].authors, Some(vec!["Calvino, Italo".to_string()]));

    assert_eq!(books[1].title, "La donna della domenica");
    assert_eq!(
        books[1].authors,
        Some(vec![
            "Fruttero, Carlo".to_string(),
            "Lucentini, Franco".to_string()
        ])
    );

    assert_eq!(books[2].title, "Lessico famigliare");
    assert_eq!(books[2].authors, None);

    // Listing records never carry detail fields
    assert!(books.iter().all(|b| b.status.is_none() && b.isbns.is_none()));

    assert_eq!(parser.parse_page_count(&document), 2);
}

#[test_log::test]
fn test_page_count_defaults_to_one_without_pager() {
    let parser = MlolParser::new();
    let document = Html::parse_document(&fixture("latest_books.html"));

    assert_eq!(parser.parse_search_page(&document).len(), 8);
    assert_eq!(parser.parse_page_count(&document), 1);
}

#[test_log::test]
fn test_book_page_parsing() {
    let parser = MlolParser::new();
    let document = Html::parse_document(&fixture("book_page.html"));

    let details = parser.parse_book_page(&document);

    assert_eq!(details.title.as_deref(), Some("Il barone rampante"));
    assert_eq!(details.authors, Some(vec!["Calvino, Italo".to_string()]));
    assert_eq!(details.publisher.as_deref(), Some("Mondadori"));
    assert_eq!(
        details.isbns,
        Some(vec![
            "9788804668237".to_string(),
            "9788852036700".to_string()
        ])
    );
    assert_eq!(details.language.as_deref(), Some("Italiano"));
    assert_eq!(details.year, Some(2016));
    assert_eq!(
        details.formats,
        Some(vec!["epub".to_string(), "pdf".to_string()])
    );
    assert_eq!(details.drm, Some(true));
    assert_eq!(details.status, Some(BookStatus::Available));

    let description = details.description.unwrap();
    assert!(description.starts_with("Cosimo Piovasco di Rondò"));
    assert!(description.ends_with("non scendere mai più."));

    let book = parser
        .parse_book_page(&document)
        .into_book("150283901")
        .unwrap();
    assert_eq!(book.id, "150283901");
    assert_eq!(book.to_string(), "Calvino, Italo - Il barone rampante");
}

#[test_log::test]
fn test_book_page_fields_are_independent() {
    let parser = MlolParser::new();
    let document = Html::parse_document(&fixture("book_page_minimal.html"));

    let details = parser.parse_book_page(&document);

    assert_eq!(details.title.as_deref(), Some("Quaderno senza metadati"));
    assert_eq!(details.authors, None);
    assert_eq!(details.publisher, None);
    assert_eq!(details.isbns, None);
    assert_eq!(details.status, None);
    assert_eq!(details.year, None);
    assert_eq!(details.formats, None);
    assert_eq!(details.drm, None);

    let book = details.into_book("42").unwrap();
    assert_eq!(book.title, "Quaderno senza metadati");
}

#[test_log::test]
fn test_status_indicator_variants() {
    let parser = MlolParser::new();
    let page = fixture("book_page.html");

    let cases = [
        ("RIPETI IL DOWNLOAD", BookStatus::Owned),
        ("PRENOTATO", BookStatus::Reserved),
        ("OCCUPATO - PRENOTA", BookStatus::Taken),
        ("NON DISPONIBILE", BookStatus::Unavailable),
        ("IN ARRIVO", BookStatus::Unknown),
    ];

    for (indicator, expected) in cases {
        let document = Html::parse_document(&page.replace("SCARICA", indicator));
        assert_eq!(
            parser.parse_book_page(&document).status,
            Some(expected),
            "indicator {indicator}"
        );
    }
}

#[test_log::test]
fn test_unavailable_page_detection() {
    let parser = MlolParser::new();

    assert!(parser.is_unavailable_page("https://milano.medialibrary.it/media/alert.aspx?t=1"));
    assert!(!parser.is_unavailable_page("https://milano.medialibrary.it/media/scheda.aspx?id=1"));
}

#[test_log::test]
fn test_loan_id_lookup() {
    let parser = MlolParser::new();
    let document = Html::parse_document(&fixture("resources_page.html"));

    assert_eq!(
        parser.parse_loan_id(&document, "150283901"),
        Some("98765".to_string())
    );
    // Must not match an ID that merely contains the requested one
    assert_eq!(
        parser.parse_loan_id(&document, "1502839011"),
        Some("11111".to_string())
    );
    assert_eq!(parser.parse_loan_id(&document, "777"), None);
}

#[test_log::test]
fn test_reservation_messages() {
    let parser = MlolParser::new();

    let confirmed = Html::parse_document(&fixture("reservation_confirmed.html"));
    let message = parser.parse_reservation_message(&confirmed).unwrap();
    assert!(message.contains("con successo"));

    let active = Html::parse_document(&fixture("reservation_active.html"));
    assert!(parser
        .parse_reservation_message(&active)
        .unwrap()
        .contains("prenotazione attiva"));

    let empty = Html::parse_document("<div class=\"modal-body\"></div>");
    assert_eq!(parser.parse_reservation_message(&empty), None);
}

#[test_log::test]
fn test_fulfillment_token_detection() {
    let parser = MlolParser::new();

    assert!(parser.is_fulfillment_token(fixture("fulfillment.acsm").as_bytes()));
    assert!(!parser.is_fulfillment_token(b"<html><body>Errore</body></html>"));
    assert!(!parser.is_fulfillment_token(b""));
}
