//! http::routes
//!
//! The Protected-Route Set and origin helpers.

use reqwest::Url;

/// Ordered URL prefixes that receive the bearer token.
///
/// A URL is protected iff it starts with one of the prefixes. The set is
/// fixed at construction.
///
/// # Example
///
/// ```
/// use aula::http::ProtectedRoutes;
///
/// let routes = ProtectedRoutes::new(["https://api.example.edu/api"]);
/// assert!(routes.is_protected("https://api.example.edu/api/students"));
/// assert!(!routes.is_protected("https://api.example.edu/public/health"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedRoutes {
    prefixes: Vec<String>,
}

impl ProtectedRoutes {
    /// Build the set. Blank prefixes are dropped.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.trim().is_empty())
                .collect(),
        }
    }

    pub fn is_protected(&self, url: &str) -> bool {
        self.prefixes.iter().any(|prefix| url.starts_with(prefix.as_str()))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

/// `scheme://host[:port]` of a URL, or `None` for opaque origins.
///
/// Default ports are omitted, so `https://id.example.edu:443` and
/// `https://id.example.edu` share an origin.
pub fn origin_of(url: &Url) -> Option<String> {
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching_is_ordered_and_literal() {
        let routes = ProtectedRoutes::new([
            "https://api.example.edu/api",
            "https://reports.example.edu/",
        ]);
        assert_eq!(routes.prefixes().len(), 2);
        assert!(routes.is_protected("https://api.example.edu/api"));
        assert!(routes.is_protected("https://reports.example.edu/cycles/1"));
        assert!(!routes.is_protected("http://api.example.edu/api/students"));
        assert!(!routes.is_protected("https://cdn.example.edu/logo.png"));
    }

    #[test]
    fn empty_set_protects_nothing() {
        let routes = ProtectedRoutes::new(Vec::<String>::new());
        assert!(routes.is_empty());
        assert!(!routes.is_protected("https://api.example.edu/api"));
    }

    #[test]
    fn blank_prefixes_are_dropped() {
        let routes = ProtectedRoutes::new(["", "  ", "https://api.example.edu"]);
        assert_eq!(routes.prefixes(), ["https://api.example.edu".to_string()]);
        assert!(!routes.is_protected("https://elsewhere.example.edu"));
    }

    #[test]
    fn origin_ignores_path_and_default_port() {
        let a = Url::parse("https://id.example.edu/realms/aula").unwrap();
        let b = Url::parse("https://id.example.edu:443/other").unwrap();
        let c = Url::parse("https://id.example.edu:8443/realms/aula").unwrap();

        assert_eq!(origin_of(&a).as_deref(), Some("https://id.example.edu"));
        assert_eq!(origin_of(&a), origin_of(&b));
        assert_ne!(origin_of(&a), origin_of(&c));
    }

    #[test]
    fn opaque_origin_is_none() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert!(origin_of(&url).is_none());
    }
}
