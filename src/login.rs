use crate::http::{HttpSession, PageRequest};
use crate::schema::{Endpoints, PageSchema};
use crate::session::CookieJar;
use crate::types::{MlolSession, RetryConfig};
use crate::{MlolError, Result};
use http_client::HttpClient;
use http_types::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;

/// Login functionality separated from the main client.
///
/// MLOL tenants are identified internally by a numeric ID. Submitting the login
/// form served by the tenant's own subdomain avoids having to know that ID.
pub struct LoginManager {
    http: HttpSession,
    schema: PageSchema,
}

/// A login form as found on the page, ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Resolved submission URL
    pub action: Url,
    /// Whether the form is submitted with POST
    pub is_post: bool,
    /// Field values in document order
    pub fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Set a field, replacing its value or appending it if the form lacks it.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.fields.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }
}

impl LoginManager {
    pub fn new(
        client: Arc<dyn HttpClient + Send + Sync>,
        base_url: String,
        retry: RetryConfig,
        schema: PageSchema,
    ) -> Self {
        Self {
            http: HttpSession::new(client, base_url, CookieJar::new(), retry),
            schema,
        }
    }

    /// Authenticate with MLOL using username and password.
    ///
    /// This method:
    /// 1. Fetches the login page
    /// 2. Picks the form that contains the username field
    /// 3. Fills in the credentials and submits the form
    /// 4. Returns a session holding every cookie collected along the way
    ///
    /// A missing authentication cookie is not treated as a failure here; it shows
    /// up when an operation that needs authentication is attempted.
    pub async fn login(&self, username: &str, password: &str) -> Result<MlolSession> {
        let mut cookies = CookieJar::new();

        let login_page = self.http.get(Endpoints::LOGIN)?;
        let response = self.http.send_with_jar(login_page, &mut cookies).await?;
        let html = response.text();

        let mut form = find_login_form(&html, &response.url, &self.schema.login_username_field)?;
        form.set(&self.schema.login_username_field, username);
        form.set(&self.schema.login_password_field, password);

        let request = if form.is_post {
            PageRequest::post_form(form.action.clone(), &form.fields)
        } else {
            form.fields
                .iter()
                .fold(PageRequest::get(form.action.clone()), |request, (k, v)| {
                    request.query(k, v)
                })
        };
        let request = request.header("Referer", response.url.as_str());

        let response = self.http.send_with_jar(request, &mut cookies).await?;
        log::debug!("Login response status: {}", response.status);

        let session = MlolSession::new(
            username.to_string(),
            cookies,
            self.http.base_url().to_string(),
        );
        if session.is_authenticated() {
            log::debug!("Login successful - authenticated session established");
        } else {
            log::warn!(
                "Login form submitted but no authentication cookie was set; authenticated operations will fail"
            );
        }

        Ok(session)
    }
}

/// Find the form containing the username field and serialize its controls.
///
/// Forms are matched by field name, not position: the page may contain other
/// forms (site search, newsletter) before the login one.
pub fn find_login_form(html: &str, page_url: &Url, username_field: &str) -> Result<LoginForm> {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").unwrap();
    let username_selector = Selector::parse(&format!("[name=\"{username_field}\"]"))
        .map_err(|e| MlolError::InvalidSchema(format!("login field '{username_field}': {e:?}")))?;

    let form = document
        .select(&form_selector)
        .find(|form| form.select(&username_selector).next().is_some())
        .ok_or(MlolError::LoginFormNotFound)?;

    let action = match form.value().attr("action").map(str::trim) {
        Some(action) if !action.is_empty() => page_url
            .join(action)
            .map_err(|e| MlolError::Parse(format!("Invalid login form action {action}: {e}")))?,
        _ => page_url.clone(),
    };
    let is_post = form
        .value()
        .attr("method")
        .is_some_and(|method| method.eq_ignore_ascii_case("post"));

    Ok(LoginForm {
        action,
        is_post,
        fields: serialize_form_fields(form),
    })
}

/// Collect the values a browser would submit for a form.
fn serialize_form_fields(form: ElementRef) -> Vec<(String, String)> {
    let control_selector = Selector::parse("input[name], select[name], textarea[name]").unwrap();
    let option_selector = Selector::parse("option").unwrap();

    let mut fields = Vec::new();
    let mut submit_included = false;

    for control in form.select(&control_selector) {
        let element = control.value();
        let Some(name) = element.attr("name") else {
            continue;
        };

        match element.name() {
            "select" => {
                let options: Vec<_> = control.select(&option_selector).collect();
                let selected = options
                    .iter()
                    .find(|option| option.value().attr("selected").is_some())
                    .or_else(|| options.first());
                if let Some(option) = selected {
                    let value = option
                        .value()
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| option.text().collect::<String>().trim().to_string());
                    fields.push((name.to_string(), value));
                }
            }
            "textarea" => {
                fields.push((name.to_string(), control.text().collect::<String>()));
            }
            _ => {
                let input_type = element.attr("type").unwrap_or("text").to_ascii_lowercase();
                let value = element.attr("value").unwrap_or("");
                match input_type.as_str() {
                    "checkbox" | "radio" => {
                        if element.attr("checked").is_some() {
                            let value = if value.is_empty() { "on" } else { value };
                            fields.push((name.to_string(), value.to_string()));
                        }
                    }
                    "submit" | "image" => {
                        // Only the first submit control counts as the one "clicked"
                        if !submit_included {
                            submit_included = true;
                            fields.push((name.to_string(), value.to_string()));
                        }
                    }
                    "button" | "reset" | "file" => {}
                    _ => fields.push((name.to_string(), value.to_string())),
                }
            }
        }
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        <html><body>
          <form id="search" action="/media/ricerca.aspx" method="get">
            <input type="text" name="keywords" value="">
            <input type="submit" value="Cerca">
          </form>
          <form id="login" action="logform.aspx?ret=1" method="post">
            <input type="hidden" name="__VIEWSTATE" value="dDwtMTA4">
            <input type="hidden" name="__EVENTVALIDATION" value="abc123">
            <input type="text" name="lusername" value="">
            <input type="password" name="lpassword">
            <input type="checkbox" name="remember">
            <input type="checkbox" name="cookies" value="yes" checked>
            <select name="lang"><option value="it" selected>Italiano</option><option value="en">English</option></select>
            <input type="submit" name="btnLogin" value="Accedi">
            <input type="submit" name="btnRecover" value="Recupera password">
          </form>
        </body></html>"#;

    fn page_url() -> Url {
        "https://milano.medialibrary.it/user/logform.aspx"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_finds_form_by_username_field() {
        let form = find_login_form(LOGIN_PAGE, &page_url(), "lusername").unwrap();

        assert!(form.is_post);
        assert_eq!(
            form.action.as_str(),
            "https://milano.medialibrary.it/user/logform.aspx?ret=1"
        );
        assert_eq!(form.get("__VIEWSTATE"), Some("dDwtMTA4"));
        assert_eq!(form.get("__EVENTVALIDATION"), Some("abc123"));
        assert_eq!(form.get("lusername"), Some(""));
        assert_eq!(form.get("lpassword"), Some(""));
        assert_eq!(form.get("keywords"), None);
    }

    #[test]
    fn test_form_serialization_rules() {
        let form = find_login_form(LOGIN_PAGE, &page_url(), "lusername").unwrap();

        assert_eq!(form.get("remember"), None);
        assert_eq!(form.get("cookies"), Some("yes"));
        assert_eq!(form.get("lang"), Some("it"));
        assert_eq!(form.get("btnLogin"), Some("Accedi"));
        assert_eq!(form.get("btnRecover"), None);
    }

    #[test]
    fn test_setting_credentials() {
        let mut form = find_login_form(LOGIN_PAGE, &page_url(), "lusername").unwrap();
        form.set("lusername", "reader@example.org");
        form.set("lpassword", "s3cret");
        form.set("extra", "1");

        assert_eq!(form.get("lusername"), Some("reader@example.org"));
        assert_eq!(form.get("lpassword"), Some("s3cret"));
        assert_eq!(form.fields.last(), Some(&("extra".to_string(), "1".to_string())));
    }

    #[test]
    fn test_missing_login_form() {
        let html = r#"<form action="/media/ricerca.aspx"><input name="keywords"></form>"#;
        assert!(matches!(
            find_login_form(html, &page_url(), "lusername"),
            Err(MlolError::LoginFormNotFound)
        ));
    }

    #[test]
    fn test_form_without_action_posts_back_to_page() {
        let html = r#"<form method="POST"><input name="lusername"></form>"#;
        let form = find_login_form(html, &page_url(), "lusername").unwrap();
        assert!(form.is_post);
        assert_eq!(form.action, page_url());
    }
}
