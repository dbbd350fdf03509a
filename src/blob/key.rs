// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use crate::error::BlobError;

/// Required suffix for uploaded audio objects
const AUDIO_SUFFIX: &str = ".mp3";

/// Check if a character is allowed in object keys (whitelist approach)
fn is_valid_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// A validated audio object key such as `2024-01-15-episode.mp3`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey(String);

impl BlobKey {
    /// Validate a client-supplied filename.
    ///
    /// Accepts one or more of `[A-Za-z0-9_.-]` followed by `.mp3`. Path
    /// separators can never appear, so a key always names a single file.
    pub fn parse(filename: &str) -> Result<Self, BlobError> {
        let valid = filename
            .strip_suffix(AUDIO_SUFFIX)
            .is_some_and(|stem| !stem.is_empty())
            && filename.chars().all(is_valid_key_char);

        if valid {
            Ok(Self(filename.to_string()))
        } else {
            Err(BlobError::InvalidKey(filename.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
