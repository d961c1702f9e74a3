pub mod dictionary;

use std::fmt;

use serde::{Deserialize, Serialize};
use zhconv::Variant;

use crate::error::{ConvertError, Result};

/// Script conversion direction
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Simplified to Traditional
    #[default]
    S2t,
    /// Simplified to Traditional (Taiwan)
    S2tw,
    /// Simplified to Traditional (Hong Kong)
    S2hk,
    /// Traditional to Simplified
    T2s,
    /// No conversion
    Identity,
}

impl Direction {
    pub const ALL: [Direction; 5] = [
        Direction::S2t,
        Direction::S2tw,
        Direction::S2hk,
        Direction::T2s,
        Direction::Identity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Direction::S2t => "s2t",
            Direction::S2tw => "s2tw",
            Direction::S2hk => "s2hk",
            Direction::T2s => "t2s",
            Direction::Identity => "identity",
        }
    }

    /// Suffix inserted before the extension of the default output file
    pub fn output_suffix(&self) -> &'static str {
        match self {
            Direction::S2t | Direction::S2tw | Direction::S2hk => "_繁體",
            Direction::T2s => "_简体",
            Direction::Identity => "_copy",
        }
    }

    /// Target variant tag understood by the zhconv tables
    fn variant_tag(&self) -> Option<&'static str> {
        match self {
            Direction::S2t => Some("zh-Hant"),
            Direction::S2tw => Some("zh-TW"),
            Direction::S2hk => Some("zh-HK"),
            Direction::T2s => Some("zh-Hans"),
            Direction::Identity => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability that maps text between script variants.
///
/// Implementations must be pure: the same text and direction always give the
/// same output, and characters without a mapping pass through unchanged.
pub trait ScriptConverter: Send + Sync {
    /// Convert `text` according to `direction`
    fn convert(&self, text: &str, direction: Direction) -> Result<String>;

    /// Backend description for logs
    fn backend_name(&self) -> &'static str;

    /// Probe the backend once before a run touches any file
    fn check(&self, direction: Direction) -> Result<()> {
        self.convert("", direction).map(|_| ())
    }
}

/// zhconv-backed converter (MediaWiki + OpenCC derived tables)
#[derive(Default)]
pub struct ZhConverter;

impl ZhConverter {
    pub fn new() -> Self {
        Self
    }

    fn variant(direction: Direction) -> Result<Option<Variant>> {
        let Some(tag) = direction.variant_tag() else {
            return Ok(None);
        };
        tag.parse::<Variant>()
            .map(Some)
            .map_err(|_| ConvertError::ConversionCapability {
                direction: direction.to_string(),
                reason: format!("variant {tag} not supported by zhconv"),
            })
    }
}

impl ScriptConverter for ZhConverter {
    fn convert(&self, text: &str, direction: Direction) -> Result<String> {
        match Self::variant(direction)? {
            Some(variant) => Ok(zhconv::zhconv(text, variant)),
            None => Ok(text.to_string()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "zhconv"
    }
}

/// Pass-through converter, used for the identity direction and in tests
#[derive(Default)]
pub struct IdentityConverter;

impl ScriptConverter for IdentityConverter {
    fn convert(&self, text: &str, _direction: Direction) -> Result<String> {
        Ok(text.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "identity"
    }
}

/// Pick the backend for a direction
pub fn converter_for(direction: Direction) -> Box<dyn ScriptConverter> {
    match direction {
        Direction::Identity => Box::new(IdentityConverter),
        _ => Box::new(ZhConverter::new()),
    }
}
