//! Outcome classifier - maps raw provider responses to retry verdicts.
//!
//! All knowledge of OCI error shapes lives here; the engine only ever
//! matches on `Outcome`.

use log::warn;

use crate::domain::{LaunchedInstance, Outcome};
use crate::provider::RawResponse;

/// Longest error detail carried into events
pub const MAX_DETAIL_CHARS: usize = 100;

const CAPACITY_MESSAGE: &str = "out of host capacity";
const CAPACITY_CODES: &[&str] = &["OutOfCapacity", "OutOfHostCapacity"];
const RATE_LIMIT_CODES: &[&str] = &["TooManyRequests"];
const FATAL_CODES: &[&str] = &[
    "NotAuthenticated",
    "NotAuthorizedOrNotFound",
    "RelatedResourceNotAuthorizedOrNotFound",
    "InvalidParameter",
    "MissingParameter",
    "CannotParseRequest",
    "LimitExceeded",
    "QuotaExceeded",
];
const FATAL_STATUSES: &[u16] = &[400, 401, 403, 404];

/// Classify one provider response. Never fails.
///
/// Anything not positively recognised is treated as transient so an odd
/// response cannot silently end a run; its raw detail is logged.
pub fn classify(raw: &RawResponse) -> Outcome {
    match raw {
        RawResponse::Launched { payload } => match LaunchedInstance::from_payload(payload) {
            Some(instance) => Outcome::Success(instance),
            None => {
                warn!("Launch response without instance id: {}", payload);
                Outcome::TransientError("launch response missing instance id".into())
            }
        },
        RawResponse::ServiceError { status, code, message } => classify_service_error(*status, code, message),
        RawResponse::Transport { detail } => Outcome::TransientError(truncate(&format!("Network error: {}", detail))),
        RawResponse::TimedOut => Outcome::TransientError("Provider call timed out".into()),
        RawResponse::Unrecognized { detail } => {
            warn!("Unrecognized provider response: {}", detail);
            Outcome::TransientError(truncate(&format!("Unrecognized response: {}", detail)))
        }
    }
}

fn classify_service_error(status: u16, code: &str, message: &str) -> Outcome {
    if message.to_lowercase().contains(CAPACITY_MESSAGE) || CAPACITY_CODES.contains(&code) {
        return Outcome::CapacityUnavailable;
    }

    let detail = truncate(&format!("{} ({}): {}", code, status, message));

    if status == 429 || RATE_LIMIT_CODES.contains(&code) {
        return Outcome::TransientError(detail);
    }
    if FATAL_CODES.contains(&code) || FATAL_STATUSES.contains(&status) {
        return Outcome::FatalError(detail);
    }
    if (500..600).contains(&status) {
        return Outcome::TransientError(detail);
    }

    warn!(
        "Unrecognized service error: status={} code={} message={}",
        status, code, message
    );
    Outcome::TransientError(detail)
}

/// Cut `text` to `MAX_DETAIL_CHARS` characters on a char boundary.
pub fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_DETAIL_CHARS) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
