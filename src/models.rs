// src/models.rs
use crate::errors::TryOnError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// Raw image bytes together with the format detected from their header.
///
/// Only [`crate::services::image_normalizer::ImageNormalizer`] builds these, so the format tag
/// always matches the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    data: Vec<u8>,
    format: ImageFormat,
}

impl ImageData {
    pub(crate) fn from_parts(data: Vec<u8>, format: ImageFormat) -> Self {
        Self { data, format }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn is_jpeg(&self) -> bool {
        self.format == ImageFormat::Jpeg
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

/// Bytes plus the MIME type the client declared for them.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub data: Vec<u8>,
    pub mime_hint: Option<String>,
}

impl ImageInput {
    pub fn new(data: Vec<u8>, mime_hint: Option<String>) -> Self {
        Self { data, mime_hint }
    }
}

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TryOnError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(TryOnError::Validation(format!(
                        "unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

string_enum!(PersonGeneration {
    AllowAdult => "allow_adult",
    AllowAll => "allow_all",
    DontAllow => "dont_allow",
});

string_enum!(SafetySetting {
    BlockMediumAndAbove => "block_medium_and_above",
    BlockLowAndAbove => "block_low_and_above",
    BlockOnlyHigh => "block_only_high",
    BlockNone => "block_none",
});

string_enum!(OutputFormat {
    Png => "image/png",
    Jpeg => "image/jpeg",
});

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        self.as_str()
    }
}

impl Default for PersonGeneration {
    fn default() -> Self {
        PersonGeneration::AllowAdult
    }
}

impl Default for SafetySetting {
    fn default() -> Self {
        SafetySetting::BlockMediumAndAbove
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Png
    }
}

pub const BASE_STEPS_RANGE: std::ops::RangeInclusive<u32> = 1..=100;
pub const SAMPLE_COUNT_RANGE: std::ops::RangeInclusive<u32> = 1..=4;
pub const COMPRESSION_QUALITY_RANGE: std::ops::RangeInclusive<u32> = 0..=100;

pub const DEFAULT_BASE_STEPS: u32 = 32;
pub const DEFAULT_SAMPLE_COUNT: u32 = 1;
pub const DEFAULT_COMPRESSION_QUALITY: u32 = 75;

/// Validated generation parameters.
///
/// The model rejects a seed alongside a watermark and only honours a
/// compression quality for JPEG output, so both are forced to zero here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParameters {
    add_watermark: bool,
    base_steps: u32,
    person_generation: PersonGeneration,
    safety_setting: SafetySetting,
    sample_count: u32,
    seed: i64,
    output_format: OutputFormat,
    compression_quality: u32,
}

impl GenerationParameters {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        add_watermark: bool,
        base_steps: u32,
        person_generation: PersonGeneration,
        safety_setting: SafetySetting,
        sample_count: u32,
        seed: i64,
        output_format: OutputFormat,
        compression_quality: u32,
    ) -> Result<Self, TryOnError> {
        if !BASE_STEPS_RANGE.contains(&base_steps) {
            return Err(TryOnError::Validation(format!(
                "base_steps must be between 1 and 100, got {}",
                base_steps
            )));
        }

        if !SAMPLE_COUNT_RANGE.contains(&sample_count) {
            return Err(TryOnError::Validation(format!(
                "sample_count must be between 1 and 4, got {}",
                sample_count
            )));
        }

        if !COMPRESSION_QUALITY_RANGE.contains(&compression_quality) {
            return Err(TryOnError::Validation(format!(
                "compression_quality must be between 0 and 100, got {}",
                compression_quality
            )));
        }

        let compression_quality = if output_format == OutputFormat::Jpeg {
            compression_quality
        } else {
            0
        };
        let seed = if add_watermark { 0 } else { seed };

        Ok(Self {
            add_watermark,
            base_steps,
            person_generation,
            safety_setting,
            sample_count,
            seed,
            output_format,
            compression_quality,
        })
    }

    pub fn add_watermark(&self) -> bool {
        self.add_watermark
    }

    pub fn base_steps(&self) -> u32 {
        self.base_steps
    }

    pub fn person_generation(&self) -> PersonGeneration {
        self.person_generation
    }

    pub fn safety_setting(&self) -> SafetySetting {
        self.safety_setting
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn compression_quality(&self) -> u32 {
        self.compression_quality
    }
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            add_watermark: true,
            base_steps: DEFAULT_BASE_STEPS,
            person_generation: PersonGeneration::default(),
            safety_setting: SafetySetting::default(),
            sample_count: DEFAULT_SAMPLE_COUNT,
            seed: 0,
            output_format: OutputFormat::default(),
            // PNG output forces the quality to zero.
            compression_quality: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Time-derived and unique even for requests built in the same nanosecond.
    pub fn generate() -> Self {
        Self(time_derived_id("req"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultId(String);

impl ResultId {
    pub fn generate() -> Self {
        Self(time_derived_id("result"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn time_derived_id(prefix: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, nanos, &suffix[..8])
}

/// One person/garment pair sent to the generation gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub id: RequestId,
    pub person_image: Arc<ImageData>,
    pub garment_image: Arc<ImageData>,
    pub parameters: GenerationParameters,
    pub created_at: DateTime<Utc>,
}

impl GenerationRequest {
    pub fn new(
        person_image: Arc<ImageData>,
        garment_image: Arc<ImageData>,
        parameters: GenerationParameters,
    ) -> Self {
        Self {
            id: RequestId::generate(),
            person_image,
            garment_image,
            parameters,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub id: ResultId,
    pub request_id: RequestId,
    pub images: Vec<ImageData>,
    pub created_at: DateTime<Utc>,
}

impl GenerationResult {
    pub fn new(request_id: RequestId, images: Vec<ImageData>) -> Self {
        Self {
            id: ResultId::generate(),
            request_id,
            images,
            created_at: Utc::now(),
        }
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ImageOutput {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// Merged output of one multi-garment call.
#[derive(Debug, Clone)]
pub struct AggregatedOutput {
    pub request_id: RequestId,
    pub images: Vec<ImageOutput>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with_steps(base_steps: u32) -> Result<GenerationParameters, TryOnError> {
        GenerationParameters::new(
            true,
            base_steps,
            PersonGeneration::AllowAdult,
            SafetySetting::BlockMediumAndAbove,
            1,
            0,
            OutputFormat::Png,
            75,
        )
    }

    #[test]
    fn base_steps_bounds_are_inclusive() {
        assert!(params_with_steps(0).is_err());
        assert!(params_with_steps(101).is_err());
        assert!(params_with_steps(1).is_ok());
        assert!(params_with_steps(100).is_ok());
    }

    #[test]
    fn rejects_out_of_range_sample_count_and_quality() {
        let sample = GenerationParameters::new(
            false,
            32,
            PersonGeneration::AllowAll,
            SafetySetting::BlockNone,
            5,
            0,
            OutputFormat::Jpeg,
            75,
        );
        assert!(matches!(sample, Err(TryOnError::Validation(_))));

        let quality = GenerationParameters::new(
            false,
            32,
            PersonGeneration::AllowAll,
            SafetySetting::BlockNone,
            1,
            0,
            OutputFormat::Jpeg,
            101,
        );
        assert!(matches!(quality, Err(TryOnError::Validation(_))));
    }

    #[test]
    fn cross_field_rules_override_explicit_values() {
        let params = GenerationParameters::new(
            true,
            32,
            PersonGeneration::AllowAdult,
            SafetySetting::BlockMediumAndAbove,
            1,
            999,
            OutputFormat::Png,
            50,
        )
        .unwrap();
        assert_eq!(params.seed(), 0);
        assert_eq!(params.compression_quality(), 0);

        let jpeg = GenerationParameters::new(
            false,
            32,
            PersonGeneration::AllowAdult,
            SafetySetting::BlockMediumAndAbove,
            2,
            999,
            OutputFormat::Jpeg,
            50,
        )
        .unwrap();
        assert_eq!(jpeg.seed(), 999);
        assert_eq!(jpeg.compression_quality(), 50);
    }

    #[test]
    fn enum_strings_round_trip_through_from_str() {
        assert_eq!(
            "block_only_high".parse::<SafetySetting>().unwrap(),
            SafetySetting::BlockOnlyHigh
        );
        assert_eq!(
            "image/jpeg".parse::<OutputFormat>().unwrap(),
            OutputFormat::Jpeg
        );
        assert!("everyone".parse::<PersonGeneration>().is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("req_"));
        assert!(ResultId::generate().as_str().starts_with("result_"));
    }
}
