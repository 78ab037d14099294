use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ViewerPushError;

/// Registry key for one live viewer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(Uuid);

impl ViewerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Push side of a viewer connection.
///
/// The broadcaster bounds every `push` and `close` with its push timeout, so
/// implementations may simply await the transport.
#[async_trait]
pub trait Viewer: Send {
    /// Remote address or other label for logs.
    fn peer(&self) -> &str;

    /// Deliver one display line.
    async fn push(&mut self, line: &str) -> Result<(), ViewerPushError>;

    /// Close the underlying connection. Errors are swallowed.
    async fn close(&mut self);
}
