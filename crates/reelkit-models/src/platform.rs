//! Social platform definitions and limits.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported publishing platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    X,
    Instagram,
    Tiktok,
    Facebook,
    Youtube,
}

impl Platform {
    /// Maximum description length enforced per platform.
    pub fn max_chars(&self) -> usize {
        match self {
            Platform::Linkedin => 3000,
            Platform::X => 280,
            Platform::Instagram | Platform::Tiktok | Platform::Facebook => 2200,
            Platform::Youtube => 5000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linkedin => "linkedin",
            Platform::X => "x",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Facebook => "facebook",
            Platform::Youtube => "youtube",
        }
    }

    pub fn all() -> &'static [Platform] {
        &[
            Platform::Linkedin,
            Platform::X,
            Platform::Instagram,
            Platform::Tiktok,
            Platform::Facebook,
            Platform::Youtube,
        ]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generated description for one platform.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlatformDescription {
    pub text: String,
    pub character_count: usize,
    pub max_characters: usize,
    #[serde(default)]
    pub hashtags: Vec<String>,
}
