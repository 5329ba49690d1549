// src/services/error_classifier.rs
use crate::errors::GenerationErrorKind;

const QUOTA_MARKERS: [&str; 2] = ["quota exceeded", "resourceexhausted"];

/// Best-effort match against upstream error text. Only the gateway adapters
/// call this; everything past the gateway works with structured kinds.
pub fn classify(message: &str) -> GenerationErrorKind {
    let lowered = message.to_lowercase();
    if QUOTA_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        GenerationErrorKind::QuotaExceeded
    } else {
        GenerationErrorKind::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_markers_match_case_insensitively() {
        assert_eq!(
            classify("rpc error: Quota Exceeded for aiplatform"),
            GenerationErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify("code = ResourceExhausted desc = try later"),
            GenerationErrorKind::QuotaExceeded
        );
    }

    #[test]
    fn everything_else_is_generic() {
        assert_eq!(
            classify("API request failed with status 500: internal"),
            GenerationErrorKind::Generic
        );
        assert_eq!(classify(""), GenerationErrorKind::Generic);
        // The underscored status name is not one of the markers.
        assert_eq!(classify("RESOURCE_EXHAUSTED"), GenerationErrorKind::Generic);
    }
}
