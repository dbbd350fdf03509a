// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CatalogError;

/// The catalog document: every episode, newest first.
///
/// Episodes are held as the JSON they were read as. Only the episode a
/// mutation targets is interpreted, so every other record is written back
/// exactly as found, including fields this server does not know about,
/// explicit nulls and records it could not decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub episodes: Vec<EpisodeRecord>,
    /// Top-level fields this server does not interpret, preserved on write
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One stored episode, kept as raw JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeRecord(Value);

/// The typed view of an episode, used to validate records on the way in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub play_count: Option<u64>,
    /// Chronological, oldest first
    #[serde(default)]
    pub comments: Option<Vec<Comment>>,
    #[serde(default)]
    pub likes: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A listener comment on an episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub date: String,
    /// Client-generated identity used to authorize deletion. Not authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Catalog {
    /// Parse a catalog document
    pub fn from_slice(content: &[u8]) -> Result<Self, CatalogError> {
        serde_json::from_slice(content).map_err(CatalogError::Corrupt)
    }

    /// Serialize as two-space indented JSON, keeping revision diffs readable
    pub fn to_pretty_json(&self) -> Result<Bytes, CatalogError> {
        let mut json = serde_json::to_vec_pretty(self).map_err(CatalogError::SerializeFailed)?;
        json.push(b'\n');
        Ok(Bytes::from(json))
    }

    pub fn episode(&self, id: &str) -> Option<&EpisodeRecord> {
        self.episodes.iter().find(|e| e.id() == Some(id))
    }

    pub fn episode_mut(&mut self, id: &str) -> Option<&mut EpisodeRecord> {
        self.episodes.iter_mut().find(|e| e.id() == Some(id))
    }
}

impl EpisodeRecord {
    /// Accept a client-supplied episode, checking it decodes as an [`Episode`]
    /// with a non-empty id. The record is stored as given.
    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        let episode: Episode = serde_json::from_value(value.clone())
            .map_err(|e| CatalogError::InvalidInput(format!("invalid episode: {e}")))?;
        if episode.id.is_empty() {
            return Err(CatalogError::InvalidInput("episode id must not be empty".into()));
        }
        Ok(Self(value))
    }

    /// The record's `id`, if it has a string one
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn title(&self) -> &str {
        self.text("title")
    }

    pub fn description(&self) -> &str {
        self.text("description")
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Decode the typed view of this record
    pub fn decode(&self) -> Result<Episode, CatalogError> {
        serde_json::from_value(self.0.clone()).map_err(|e| self.malformed(e.to_string()))
    }

    fn text(&self, field: &str) -> &str {
        self.0.get(field).and_then(Value::as_str).unwrap_or_default()
    }

    fn fields_mut(&mut self) -> Result<&mut Map<String, Value>, CatalogError> {
        let id = self.id().unwrap_or_default().to_string();
        self.0
            .as_object_mut()
            .ok_or_else(|| malformed_episode(id, "not a JSON object"))
    }

    fn malformed(&self, reason: impl Into<String>) -> CatalogError {
        malformed_episode(self.id().unwrap_or_default(), reason)
    }

    /// Read a non-negative counter. Absent or null counts as zero.
    pub(crate) fn counter(&self, field: &str) -> Result<u64, CatalogError> {
        match self.0.get(field) {
            None | Some(Value::Null) => Ok(0),
            Some(value) => value.as_u64().ok_or_else(|| {
                self.malformed(format!("'{field}' is not a non-negative integer"))
            }),
        }
    }

    pub(crate) fn set_counter(&mut self, field: &str, value: u64) -> Result<(), CatalogError> {
        self.fields_mut()?.insert(field.to_string(), Value::from(value));
        Ok(())
    }

    /// The raw comment list, created empty when absent or null
    pub(crate) fn comments_mut(&mut self) -> Result<&mut Vec<Value>, CatalogError> {
        let id = self.id().unwrap_or_default().to_string();
        let slot = self
            .fields_mut()?
            .entry("comments")
            .or_insert_with(|| Value::Array(Vec::new()));
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(comments) => Ok(comments),
            _ => Err(malformed_episode(id, "'comments' is not an array")),
        }
    }
}

/// A shallow partial update for one episode, addressed by `id`.
///
/// Fields present in the patch replace the episode's fields wholesale; all
/// other fields are kept as they are.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodePatch {
    id: String,
    fields: Map<String, Value>,
}

impl EpisodePatch {
    /// Build a patch from a JSON object carrying a non-empty string `id`
    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        let Value::Object(fields) = value else {
            return Err(CatalogError::InvalidInput(
                "episode update must be a JSON object".into(),
            ));
        };

        let id = match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            _ => {
                return Err(CatalogError::InvalidInput(
                    "episode update requires a non-empty string 'id'".into(),
                ));
            }
        };

        Ok(Self { id, fields })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Produce the merged record without modifying `record`.
    ///
    /// Only the patched fields change; the result must still decode as an
    /// [`Episode`].
    pub fn merge_into(&self, record: &EpisodeRecord) -> Result<EpisodeRecord, CatalogError> {
        let mut merged = record.clone();
        let target = merged.fields_mut()?;
        for (key, value) in &self.fields {
            target.insert(key.clone(), value.clone());
        }

        serde_json::from_value::<Episode>(merged.0.clone()).map_err(|e| {
            CatalogError::InvalidInput(format!("episode update for '{}' is invalid: {e}", self.id))
        })?;
        Ok(merged)
    }
}

fn malformed_episode(id: impl Into<String>, reason: impl Into<String>) -> CatalogError {
    CatalogError::MalformedEpisode {
        id: id.into(),
        reason: reason.into(),
    }
}
