use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::Error;
use crate::models::test::{Test, TestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotPublished(TestStatus),
    NotYetOpen(DateTime<Utc>),
    Closed(DateTime<Utc>),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::NotPublished(status) => write!(f, "test is {}", status),
            DenyReason::NotYetOpen(at) => write!(f, "test opens at {}", at.to_rfc3339()),
            DenyReason::Closed(at) => write!(f, "test closed at {}", at.to_rfc3339()),
        }
    }
}

impl From<DenyReason> for Error {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NotPublished(_) => Error::AccessDenied(reason.to_string()),
            DenyReason::NotYetOpen(_) | DenyReason::Closed(_) => Error::window_closed(reason),
        }
    }
}

/// Decides whether the test can be taken at `now`. The close instant itself is still open.
pub fn evaluate(test: &Test, now: DateTime<Utc>) -> AccessDecision {
    if test.status != TestStatus::Published {
        return AccessDecision::Denied(DenyReason::NotPublished(test.status));
    }
    if let Some(opens_at) = test.opens_at {
        if now < opens_at {
            return AccessDecision::Denied(DenyReason::NotYetOpen(opens_at));
        }
    }
    if let Some(closes_at) = test.closes_at {
        if now > closes_at {
            return AccessDecision::Denied(DenyReason::Closed(closes_at));
        }
    }
    AccessDecision::Allowed
}

/// [`evaluate`] as a `Result`, for call sites that just propagate the refusal.
pub fn ensure_open(test: &Test, now: DateTime<Utc>) -> Result<(), Error> {
    match evaluate(test, now) {
        AccessDecision::Allowed => Ok(()),
        AccessDecision::Denied(reason) => Err(reason.into()),
    }
}
