//! Status classification for completed responses.

use std::fmt;
use std::sync::Arc;

/// Decides whether a completed response counts as success.
#[derive(Clone)]
pub struct ValidateStatus(Arc<dyn Fn(u16) -> bool + Send + Sync>);

impl ValidateStatus {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn check(&self, status: u16) -> bool {
        (self.0)(status)
    }
}

/// Accepts 2xx.
impl Default for ValidateStatus {
    fn default() -> Self {
        Self::new(|status| (200..300).contains(&status))
    }
}

impl fmt::Debug for ValidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidateStatus(..)")
    }
}
