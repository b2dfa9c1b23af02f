use serde::{Deserialize, Serialize};

/// Cookies attached to every request made on behalf of a session.
///
/// Cookies are stored as `name=value` pairs, the way they are sent back in a
/// `Cookie` header. Attributes such as `Path` or `Expires` are dropped when a
/// `Set-Cookie` header is absorbed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CookieJar {
    cookies: Vec<String>,
}

impl CookieJar {
    /// Create an empty jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a jar from `name=value` pairs
    pub fn from_pairs(cookies: Vec<String>) -> Self {
        let mut jar = Self::new();
        for cookie in cookies {
            jar.absorb_set_cookie(&cookie);
        }
        jar
    }

    /// Absorb one `Set-Cookie` header value, replacing any cookie with the same name.
    pub fn absorb_set_cookie(&mut self, header: &str) {
        // Just the name=value part, before any attribute
        let Some(pair) = header.split(';').next().map(str::trim) else {
            return;
        };
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        self.set(name.trim(), value.trim());
    }

    /// Set a cookie, replacing any existing value.
    pub fn set(&mut self, name: &str, value: &str) {
        let prefix = format!("{name}=");
        self.cookies.retain(|existing| !existing.starts_with(&prefix));
        self.cookies.push(format!("{name}={value}"));
    }

    /// Value of the named cookie, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.cookies
            .iter()
            .find_map(|cookie| cookie.strip_prefix(prefix.as_str()))
    }

    /// Whether the named cookie is present with a non-empty value.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// The `name=value` pairs in insertion order.
    pub fn pairs(&self) -> &[String] {
        &self.cookies
    }

    /// Value for a `Cookie` request header, or `None` if the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            None
        } else {
            Some(self.cookies.join("; "))
        }
    }
}
