use http_client::Request;

/// Desktop Chrome user agent sent with every request
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.67 Safari/537.36";

/// Accept header of a regular page navigation
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

/// Accept header of the reservation request
pub const ACCEPT_FRAGMENT: &str = "text/html, */*; q=0.01";

/// Add the browser headers every portal request carries
pub fn add_default_headers(request: &mut Request) {
    let _ = request.insert_header("User-Agent", USER_AGENT);
    let _ = request.insert_header("Upgrade-Insecure-Requests", "1");
    let _ = request.insert_header("Accept", ACCEPT_HTML);
    let _ = request.insert_header("Sec-Fetch-Site", "same-origin");
    let _ = request.insert_header("Sec-Fetch-Mode", "navigate");
    let _ = request.insert_header("Sec-Fetch-User", "?1");
    let _ = request.insert_header("Sec-Fetch-Dest", "document");
}

/// Add per-request headers, overriding any default with the same name
pub fn add_extra_headers(request: &mut Request, headers: &[(String, String)]) {
    for (name, value) in headers {
        let _ = request.insert_header(name.as_str(), value.as_str());
    }
}

/// Add cookies to a request if there are any
pub fn add_cookies(request: &mut Request, cookie_header: Option<&str>) {
    if let Some(cookie_header) = cookie_header {
        let _ = request.insert_header("Cookie", cookie_header);
    }
}
