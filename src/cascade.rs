//! Ordered fallback chains.
//!
//! Every resolver that has several ways of producing the same value runs them
//! through a [`Cascade`]: stages are tried in order, the first `Found` wins, and
//! the reasons of every skipped or failed stage are kept for the final error.

use tracing::debug;

/// Result of one strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Found(T),
    /// The strategy did not apply (missing input, nothing matched)
    Skip(String),
    Fail(String),
}

impl<T> Attempt<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Attempt::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attempt<U> {
        match self {
            Attempt::Found(v) => Attempt::Found(f(v)),
            Attempt::Skip(r) => Attempt::Skip(r),
            Attempt::Fail(r) => Attempt::Fail(r),
        }
    }
}

impl<T> From<crate::error::Result<T>> for Attempt<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(v) => Attempt::Found(v),
            Err(e) => Attempt::Fail(e.to_string()),
        }
    }
}

/// A pure strategy over already-fetched text
pub type Strategy<T> = (&'static str, fn(&str) -> Attempt<T>);

/// Driver state for one fallback chain
#[derive(Debug)]
pub struct Cascade<T> {
    label: &'static str,
    reasons: Vec<String>,
    found: Option<T>,
}

impl<T> Cascade<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            reasons: Vec::new(),
            found: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.found.is_some()
    }

    /// Record the outcome of a stage. Once a stage has produced a value, later
    /// outcomes are ignored.
    pub fn record(&mut self, stage: &str, attempt: Attempt<T>) -> bool {
        if self.found.is_some() {
            return true;
        }
        match attempt {
            Attempt::Found(v) => {
                debug!("{}: stage '{}' succeeded", self.label, stage);
                self.found = Some(v);
                true
            }
            Attempt::Skip(reason) | Attempt::Fail(reason) => {
                debug!("{}: stage '{}' gave nothing: {}", self.label, stage, reason);
                self.reasons.push(format!("{}: {}", stage, reason));
                false
            }
        }
    }

    /// Run pure strategies in order against `input` until one succeeds
    pub fn run(&mut self, input: &str, strategies: &[Strategy<T>]) -> bool {
        for (stage, strategy) in strategies {
            if self.record(stage, strategy(input)) {
                return true;
            }
        }
        self.is_done()
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// The winning value, or every collected reason joined into one message
    pub fn finish(self) -> std::result::Result<T, String> {
        match self.found {
            Some(v) => Ok(v),
            None if self.reasons.is_empty() => Err(format!("{}: no strategy ran", self.label)),
            None => Err(self.reasons.join("; ")),
        }
    }
}
