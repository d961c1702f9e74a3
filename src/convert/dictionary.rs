//! User term overrides applied after script conversion.
//!
//! A dictionary file holds one `original,replacement` pair per line. Pairs are
//! applied in file order, each as a global literal replacement. Text that an
//! earlier pair put in is never matched by a later one.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermPair {
    pub original: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    pairs: Vec<TermPair>,
}

/// A run of output text; `replaced` runs came from a replacement.
struct Segment {
    text: String,
    replaced: bool,
}

impl Dictionary {
    /// Load from a file. Any line that does not split into exactly two fields
    /// fails the whole load.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        let dict = Self::parse(&contents, path)?;
        tracing::info!("Loaded {} dictionary pairs from {:?}", dict.len(), path);
        Ok(dict)
    }

    /// Parse dictionary text; `origin` is only used in error reports.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self> {
        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        let mut pairs = Vec::new();
        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            let fields: Vec<&str> = line.split(',').collect();
            match fields.as_slice() {
                [original, replacement] if !original.is_empty() => pairs.push(TermPair {
                    original: original.to_string(),
                    replacement: replacement.to_string(),
                }),
                _ => {
                    return Err(ConvertError::DictionaryFormat {
                        path: PathBuf::from(origin),
                        line: idx + 1,
                        content: raw.to_string(),
                    })
                }
            }
        }
        Ok(Self::from_pairs(pairs))
    }

    pub fn from_pairs(pairs: Vec<TermPair>) -> Self {
        Self { pairs }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[TermPair] {
        &self.pairs
    }

    /// Apply every pair to `text`, one after another in file order.
    pub fn apply(&self, text: &str) -> String {
        if self.pairs.is_empty() {
            return text.to_string();
        }
        let mut segments = vec![Segment {
            text: text.to_string(),
            replaced: false,
        }];
        for pair in &self.pairs {
            segments = replace_in_segments(segments, pair);
        }
        segments.into_iter().map(|s| s.text).collect()
    }
}

/// Replace `pair.original` inside the segments no earlier pair produced.
fn replace_in_segments(segments: Vec<Segment>, pair: &TermPair) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.replaced || !segment.text.contains(pair.original.as_str()) {
            out.push(segment);
            continue;
        }
        let mut pieces = segment.text.split(pair.original.as_str());
        if let Some(first) = pieces.next() {
            push_plain(&mut out, first);
        }
        for piece in pieces {
            out.push(Segment {
                text: pair.replacement.clone(),
                replaced: true,
            });
            push_plain(&mut out, piece);
        }
    }
    out
}

fn push_plain(out: &mut Vec<Segment>, text: &str) {
    if !text.is_empty() {
        out.push(Segment {
            text: text.to_string(),
            replaced: false,
        });
    }
}
