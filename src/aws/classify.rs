//! Classification of provider failures.
//!
//! Provider errors arrive as free text. They are sorted into an
//! [`ErrorClass`] by case-insensitive substring match, first match wins.

use crate::error::{ErrorClass, FetchError, FetchTarget};

/// Substring rules in priority order.
const RULES: &[(ErrorClass, &[&str])] = &[
    (
        ErrorClass::Throttling,
        &["throttling", "requestlimitexceeded", "too many requests"],
    ),
    (
        ErrorClass::Authentication,
        &[
            "authfailure",
            "unauthorizedoperation",
            "access denied",
            "validate the provided access credentials",
        ],
    ),
    (
        ErrorClass::NotFound,
        &["does not exist", "notfound", "invalidinstanceid"],
    ),
    (ErrorClass::Network, &["timeout", "connection", "network"]),
];

/// Returns the class for a raw provider message.
#[must_use]
pub fn class_of(message: &str) -> ErrorClass {
    let lowered = message.to_lowercase();
    RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lowered.contains(n)))
        .map_or(ErrorClass::Unknown, |(class, _)| *class)
}

/// Whether failures of this class may be retried.
#[must_use]
pub const fn is_retryable(class: ErrorClass) -> bool {
    matches!(class, ErrorClass::Throttling | ErrorClass::Network)
}

impl FetchError {
    /// Wraps a raw provider message into a classified error.
    #[must_use]
    pub fn classify(target: FetchTarget, cause: impl Into<String>) -> Self {
        let cause = cause.into();
        let class = class_of(&cause);
        Self::new(target, class, is_retryable(class), cause)
    }
}
