use crate::backend::Encoding;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

pub const DEFAULT_CACHE_WINDOW: Duration = Duration::from_millis(1000);

/// Per-handle settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFileOptions {
    pub encoding: Encoding,
    /// How long a resolved read stays reusable before the file is checked again.
    #[serde(
        rename = "cache_window_ms",
        serialize_with = "serialize_ms",
        deserialize_with = "deserialize_ms"
    )]
    pub cache_window: Duration,
}

impl Default for TextFileOptions {
    fn default() -> Self {
        Self {
            encoding: Encoding::default(),
            cache_window: DEFAULT_CACHE_WINDOW,
        }
    }
}

impl TextFileOptions {
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_cache_window(mut self, cache_window: Duration) -> Self {
        self.cache_window = cache_window;
        self
    }
}

fn serialize_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn deserialize_ms<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
}
