use chrono::{DateTime, Utc};
use std::fmt;

/// One intercepted HTTP request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub method: String,
    pub path: String,
    /// Raw query component without the leading `?`; empty when absent.
    pub query: String,
    /// Raw request body, lossily decoded as UTF-8.
    pub body: String,
    pub captured_at: DateTime<Utc>,
}

impl CapturedEvent {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        query: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query: query.into(),
            body: body.into(),
            captured_at: Utc::now(),
        }
    }

    /// Single-line display form pushed to viewers (before sanitizing):
    /// `method path query body`, always with three separating spaces.
    pub fn display(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CapturedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.method, self.path, self.query, self.body)
    }
}
