//! Checker predicates.
//!
//! A checker maps a URL to a pass/fail verdict. The orchestrators only see
//! the [`WebsiteChecker`] trait; how the verdict is reached is up to the
//! caller. Plain closures and fn items are checkers through a blanket impl.

use std::time::Duration;

use regex::Regex;

use crate::config::CheckerSettings;
use crate::{slog_trace, Error, Result};

/// A unary predicate over a URL.
///
/// Implementations must not fail; a hanging implementation makes
/// [`crate::fanout::check_websites`] wait forever.
pub trait WebsiteChecker: Send + Sync {
    fn check(&self, url: &str) -> bool;
}

impl<F> WebsiteChecker for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn check(&self, url: &str) -> bool {
        self(url)
    }
}

/// Classifies URLs by scheme and deny patterns, without touching the network.
///
/// A URL passes when it has an allowed scheme and matches no deny pattern.
#[derive(Debug, Clone)]
pub struct PatternChecker {
    schemes: Vec<String>,
    deny: Vec<Regex>,
    delay: Duration,
}

impl PatternChecker {
    pub fn new() -> Self {
        Self {
            schemes: vec!["http".to_string(), "https".to_string()],
            deny: Vec::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn from_settings(settings: &CheckerSettings) -> Result<Self> {
        let mut checker = Self::new()
            .with_schemes(settings.schemes.iter().cloned())
            .with_delay(Duration::from_millis(settings.delay_ms));
        for pattern in &settings.deny {
            checker = checker.deny(pattern)?;
        }
        Ok(checker)
    }

    pub fn with_schemes<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemes = schemes
            .into_iter()
            .map(|s| s.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Add a deny pattern.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if `pattern` is not a valid regex.
    pub fn deny(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::Validation(format!("invalid deny pattern {pattern:?}: {e}")))?;
        self.deny.push(regex);
        Ok(self)
    }

    /// Simulated latency applied to every check.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn scheme_allowed(&self, url: &str) -> bool {
        match url.split_once("://") {
            Some((scheme, rest)) if !rest.is_empty() => {
                let scheme = scheme.to_ascii_lowercase();
                self.schemes.iter().any(|s| *s == scheme)
            }
            _ => false,
        }
    }
}

impl Default for PatternChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl WebsiteChecker for PatternChecker {
    fn check(&self, url: &str) -> bool {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let ok = self.scheme_allowed(url) && !self.deny.iter().any(|re| re.is_match(url));
        slog_trace!("PatternChecker::check url={} ok={}", url, ok);
        ok
    }
}
