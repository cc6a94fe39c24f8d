use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::Result;
use crate::models::RequestResult;

/// Caller-supplied predicate over the response body and the full result
pub type MatchFn = dyn Fn(&str, &RequestResult) -> bool + Send + Sync;

/// How a website's body is checked
#[derive(Clone)]
pub enum Matcher {
    Predicate(Arc<MatchFn>),
    Pattern(Regex),
    Literal(String),
}

impl Matcher {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str, &RequestResult) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Arc::new(f))
    }

    pub fn pattern(pattern: &str) -> Result<Self> {
        Ok(Matcher::Pattern(Regex::new(pattern)?))
    }

    pub fn literal(s: impl Into<String>) -> Self {
        Matcher::Literal(s.into())
    }

    /// Pick one matcher out of several candidates: predicate, then pattern, then literal
    pub fn from_parts(
        predicate: Option<Arc<MatchFn>>,
        pattern: Option<Regex>,
        literal: Option<String>,
    ) -> Option<Self> {
        predicate
            .map(Matcher::Predicate)
            .or_else(|| pattern.map(Matcher::Pattern))
            .or_else(|| literal.map(Matcher::Literal))
    }

    /// Check a response; `Err` carries the mismatch reason
    pub fn check(&self, body: &str, result: &RequestResult) -> std::result::Result<(), &'static str> {
        let matched = match self {
            Matcher::Predicate(f) => f(body, result),
            Matcher::Pattern(re) => re.is_match(body),
            Matcher::Literal(s) => body.contains(s.as_str()),
        };

        if matched {
            Ok(())
        } else {
            Err(match self {
                Matcher::Predicate(_) => "data doesn't match provided function",
                Matcher::Pattern(_) => "data doesn't match provided regex",
                Matcher::Literal(_) => "data doesn't contain provided string",
            })
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
            Matcher::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Matcher::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
        }
    }
}

/// A target website fetched through the proxy
#[derive(Debug, Clone)]
pub struct WebsiteSpec {
    /// Unique key of this website in the verdict
    pub name: String,
    pub url: String,
    pub matcher: Option<Matcher>,
    pub connect_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl WebsiteSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            matcher: Some(matcher),
            connect_timeout: None,
            timeout: None,
        }
    }

    pub fn with_timeouts(mut self, connect_timeout: Option<Duration>, timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self.timeout = timeout;
        self
    }
}

/// Website entry as written in a websites file
#[derive(Debug, Clone, Deserialize)]
pub struct WebsiteEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    /// Seconds
    #[serde(default)]
    pub connect_timeout: Option<u64>,
    /// Seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl WebsiteEntry {
    /// Build a spec, using the given timeouts where the entry sets none
    pub fn into_spec(
        self,
        default_connect_timeout: Duration,
        default_timeout: Duration,
    ) -> Result<WebsiteSpec> {
        let pattern = self.regex.as_deref().map(Regex::new).transpose()?;

        Ok(WebsiteSpec {
            matcher: Matcher::from_parts(None, pattern, self.contains),
            connect_timeout: Some(
                self.connect_timeout
                    .map(Duration::from_secs)
                    .unwrap_or(default_connect_timeout),
            ),
            timeout: Some(self.timeout.map(Duration::from_secs).unwrap_or(default_timeout)),
            name: self.name,
            url: self.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;

    fn result_with(body: &str) -> RequestResult {
        RequestResult::ok(200, body, Default::default())
    }

    #[test]
    fn test_matcher_from_parts_priority() {
        let predicate: Arc<MatchFn> = Arc::new(|_: &str, _: &RequestResult| true);

        let m = Matcher::from_parts(
            Some(predicate),
            Some(Regex::new("x").unwrap()),
            Some("y".to_string()),
        );
        assert!(matches!(m, Some(Matcher::Predicate(_))));

        let m = Matcher::from_parts(None, Some(Regex::new("x").unwrap()), Some("y".to_string()));
        assert!(matches!(m, Some(Matcher::Pattern(_))));

        let m = Matcher::from_parts(None, None, Some("y".to_string()));
        assert!(matches!(m, Some(Matcher::Literal(ref s)) if s == "y"));

        assert!(Matcher::from_parts(None, None, None).is_none());
    }

    #[test]
    fn test_matcher_check() {
        let body = "<title>Google Search</title>";
        let result = result_with(body);

        assert!(Matcher::literal("Google").check(body, &result).is_ok());
        assert!(Matcher::literal("google").check(body, &result).is_err());

        assert!(Matcher::pattern(r"(?i)google\s+search")
            .unwrap()
            .check(body, &result)
            .is_ok());

        let by_status = Matcher::predicate(|_, r| r.status == Some(200));
        assert!(by_status.check(body, &result).is_ok());
        assert_eq!(
            Matcher::predicate(|_, _| false).check(body, &result),
            Err("data doesn't match provided function")
        );
    }

    #[test]
    fn test_website_entry_into_spec() {
        let entries: Vec<WebsiteEntry> = serde_json::from_str(
            r#"[
                {"name": "google", "url": "https://www.google.com", "contains": "Google", "regex": "<title>", "timeout": 3},
                {"name": "bare", "url": "http://example.com"}
            ]"#,
        )
        .unwrap();

        let mut specs = entries
            .into_iter()
            .map(|e| e.into_spec(Duration::from_secs(5), Duration::from_secs(15)))
            .collect::<Result<Vec<_>>>()
            .unwrap();

        let bare = specs.pop().unwrap();
        assert!(bare.matcher.is_none());
        assert_eq!(bare.timeout, Some(Duration::from_secs(15)));

        let google = specs.pop().unwrap();
        assert!(matches!(google.matcher, Some(Matcher::Pattern(_))));
        assert_eq!(google.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(google.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_website_entry_invalid_regex() {
        let entry = WebsiteEntry {
            name: "broken".to_string(),
            url: "http://example.com".to_string(),
            contains: None,
            regex: Some("(".to_string()),
            connect_timeout: None,
            timeout: None,
        };

        let err = entry
            .into_spec(Duration::from_secs(5), Duration::from_secs(15))
            .unwrap_err();
        assert!(matches!(err, CheckError::InvalidConfig(_)));
    }
}
