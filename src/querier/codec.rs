//! Cache payload codec
//!
//! Cached payloads are a JSON array of series, each `{labels, points}` with
//! points as `{timestamp, value}`. JSON has no literal for non-finite
//! floats, so `NaN`, `+Inf` and `-Inf` are written as strings in the same
//! spelling Prometheus uses.

use crate::error::CodecError;
use crate::types::Series;

/// Encode a series list for the cache
pub fn encode(series: &[Series]) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(series).map_err(CodecError::Encode)
}

/// Decode a cached payload back into series
pub fn decode(data: &[u8]) -> Result<Vec<Series>, CodecError> {
    serde_json::from_slice(data).map_err(CodecError::Decode)
}

/// Serde adapter for sample values that keeps non-finite floats
pub(crate) mod sample_value {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "+Inf" } else { "-Inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(SampleValueVisitor)
    }

    struct SampleValueVisitor;

    impl<'de> Visitor<'de> for SampleValueVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or one of \"NaN\", \"+Inf\", \"-Inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "NaN" => Ok(f64::NAN),
                "+Inf" | "Inf" => Ok(f64::INFINITY),
                "-Inf" => Ok(f64::NEG_INFINITY),
                other => other
                    .parse::<f64>()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}
