use url::Url;

/// An outgoing request as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// Top-level document load.
    pub navigate: bool,
}

impl Request {
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            headers: Vec::new(),
            navigate: false,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A navigation request for a page document.
    pub fn navigate(url: Url) -> Self {
        Self {
            navigate: true,
            ..Self::get(url)
        }
        .with_header("accept", "text/html,application/xhtml+xml")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn accepts_html(&self) -> bool {
        self.header("accept")
            .map(|a| a.contains("text/html"))
            .unwrap_or(false)
    }

    /// Store key: the absolute URL. Only GET requests are ever stored, so
    /// the method is implied.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}
