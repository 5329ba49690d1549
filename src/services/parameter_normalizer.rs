// src/services/parameter_normalizer.rs
use crate::errors::TryOnError;
use crate::models::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Parameters as they arrive from a caller, every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParameters {
    pub add_watermark: Option<bool>,
    pub base_steps: Option<u32>,
    pub person_generation: Option<PersonGeneration>,
    pub safety_setting: Option<SafetySetting>,
    pub sample_count: Option<u32>,
    pub seed: Option<i64>,
    pub output_format: Option<OutputFormat>,
    pub compression_quality: Option<u32>,
}

impl RawParameters {
    /// Reads multipart/url-encoded form fields.
    ///
    /// Unlike [`ParameterNormalizer::normalize`], bad form values never fail:
    /// missing, unparseable or out-of-range entries fall back to the default.
    pub fn from_form(fields: &HashMap<String, String>) -> Self {
        Self {
            add_watermark: Some(form_bool(fields, "add_watermark", true)),
            base_steps: Some(form_int(
                fields,
                "base_steps",
                DEFAULT_BASE_STEPS,
                BASE_STEPS_RANGE,
            )),
            person_generation: Some(form_enum(fields, "person_generation")),
            safety_setting: Some(form_enum(fields, "safety_setting")),
            sample_count: Some(form_int(
                fields,
                "sample_count",
                DEFAULT_SAMPLE_COUNT,
                SAMPLE_COUNT_RANGE,
            )),
            seed: Some(form_value(fields, "seed").unwrap_or(0)),
            output_format: Some(form_enum(fields, "output_mime_type")),
            compression_quality: Some(form_int(
                fields,
                "compression_quality",
                DEFAULT_COMPRESSION_QUALITY,
                COMPRESSION_QUALITY_RANGE,
            )),
        }
    }
}

impl From<&GenerationParameters> for RawParameters {
    fn from(params: &GenerationParameters) -> Self {
        Self {
            add_watermark: Some(params.add_watermark()),
            base_steps: Some(params.base_steps()),
            person_generation: Some(params.person_generation()),
            safety_setting: Some(params.safety_setting()),
            sample_count: Some(params.sample_count()),
            seed: Some(params.seed()),
            output_format: Some(params.output_format()),
            compression_quality: Some(params.compression_quality()),
        }
    }
}

fn non_empty<'a>(fields: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn form_value<T: FromStr>(fields: &HashMap<String, String>, key: &str) -> Option<T> {
    non_empty(fields, key).and_then(|v| v.parse().ok())
}

fn form_bool(fields: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match non_empty(fields, key) {
        Some(v) => v == "true",
        None => default,
    }
}

fn form_int(
    fields: &HashMap<String, String>,
    key: &str,
    default: u32,
    range: RangeInclusive<u32>,
) -> u32 {
    form_value::<u32>(fields, key)
        .filter(|v| range.contains(v))
        .unwrap_or(default)
}

fn form_enum<T: FromStr + Default>(fields: &HashMap<String, String>, key: &str) -> T {
    form_value(fields, key).unwrap_or_default()
}

pub struct ParameterNormalizer;

impl ParameterNormalizer {
    /// Applies defaults, then lets the parameter constructor reject ranges
    /// and enforce the watermark/seed and format/quality rules.
    pub fn normalize(raw: &RawParameters) -> Result<GenerationParameters, TryOnError> {
        GenerationParameters::new(
            raw.add_watermark.unwrap_or(true),
            raw.base_steps.unwrap_or(DEFAULT_BASE_STEPS),
            raw.person_generation.unwrap_or_default(),
            raw.safety_setting.unwrap_or_default(),
            raw.sample_count.unwrap_or(DEFAULT_SAMPLE_COUNT),
            raw.seed.unwrap_or(0),
            raw.output_format.unwrap_or_default(),
            raw.compression_quality.unwrap_or(DEFAULT_COMPRESSION_QUALITY),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_input_yields_defaults() {
        let params = ParameterNormalizer::normalize(&RawParameters::default()).unwrap();
        assert_eq!(params, GenerationParameters::default());
        assert!(params.add_watermark());
        assert_eq!(params.base_steps(), 32);
        assert_eq!(params.sample_count(), 1);
        assert_eq!(params.output_format(), OutputFormat::Png);
    }

    #[test]
    fn watermark_and_png_override_seed_and_quality() {
        let raw = RawParameters {
            add_watermark: Some(true),
            seed: Some(999),
            output_format: Some(OutputFormat::Png),
            compression_quality: Some(50),
            ..Default::default()
        };
        let params = ParameterNormalizer::normalize(&raw).unwrap();
        assert_eq!(params.seed(), 0);
        assert_eq!(params.compression_quality(), 0);
    }

    #[test]
    fn base_steps_boundaries() {
        for (steps, ok) in [(0, false), (1, true), (100, true), (101, false)] {
            let raw = RawParameters {
                base_steps: Some(steps),
                ..Default::default()
            };
            assert_eq!(ParameterNormalizer::normalize(&raw).is_ok(), ok, "{}", steps);
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let inputs = [
            RawParameters::default(),
            RawParameters {
                add_watermark: Some(false),
                seed: Some(42),
                output_format: Some(OutputFormat::Jpeg),
                compression_quality: Some(60),
                sample_count: Some(4),
                ..Default::default()
            },
            RawParameters {
                add_watermark: Some(true),
                seed: Some(7),
                compression_quality: Some(10),
                person_generation: Some(PersonGeneration::DontAllow),
                safety_setting: Some(SafetySetting::BlockLowAndAbove),
                ..Default::default()
            },
        ];

        for raw in inputs {
            let once = ParameterNormalizer::normalize(&raw).unwrap();
            let twice = ParameterNormalizer::normalize(&RawParameters::from(&once)).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn form_values_fall_back_to_defaults() {
        let fields = form(&[
            ("base_steps", "500"),
            ("sample_count", "many"),
            ("compression_quality", "-3"),
            ("person_generation", "everyone"),
            ("output_mime_type", "image/tiff"),
        ]);
        let raw = RawParameters::from_form(&fields);
        assert_eq!(raw.base_steps, Some(32));
        assert_eq!(raw.sample_count, Some(1));
        assert_eq!(raw.compression_quality, Some(75));
        assert_eq!(raw.person_generation, Some(PersonGeneration::AllowAdult));
        assert_eq!(raw.output_format, Some(OutputFormat::Png));
        assert!(ParameterNormalizer::normalize(&raw).is_ok());
    }

    #[test]
    fn form_values_are_parsed_when_valid() {
        let fields = form(&[
            ("add_watermark", "false"),
            ("base_steps", "64"),
            ("sample_count", "3"),
            ("seed", "1234"),
            ("safety_setting", "block_none"),
            ("output_mime_type", "image/jpeg"),
            ("compression_quality", "90"),
        ]);
        let params = ParameterNormalizer::normalize(&RawParameters::from_form(&fields)).unwrap();
        assert!(!params.add_watermark());
        assert_eq!(params.base_steps(), 64);
        assert_eq!(params.sample_count(), 3);
        assert_eq!(params.seed(), 1234);
        assert_eq!(params.safety_setting(), SafetySetting::BlockNone);
        assert_eq!(params.output_format(), OutputFormat::Jpeg);
        assert_eq!(params.compression_quality(), 90);
    }

    #[test]
    fn form_watermark_is_only_true_for_literal_true() {
        let raw = RawParameters::from_form(&form(&[("add_watermark", "yes"), ("seed", "5")]));
        assert_eq!(raw.add_watermark, Some(false));
        assert_eq!(ParameterNormalizer::normalize(&raw).unwrap().seed(), 5);
    }
}
