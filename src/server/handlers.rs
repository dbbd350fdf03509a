// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Json;
use axum::body::Bytes;
use axum::extract::Request;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use chrono::{SecondsFormat, Utc};
use futures::TryStreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::warn;

use crate::blob::BlobKey;
use crate::catalog::{Comment, EpisodePatch, EpisodeRecord, Mutation};
use crate::error::ApiError;
use crate::notify::EpisodeSummary;
use crate::subscription::Subscription;

use super::operation::Operation;
use super::response::{self, preflight, success};
use super::state::Backend;

const FILENAME_HEADER: &str = "x-custom-filename";
const DEFAULT_AUDIO_TYPE: &str = "audio/mpeg";
const ANONYMOUS: &str = "anonymous";

static COMMENT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeRef {
    episode_id: String,
}

#[derive(Debug, Deserialize)]
struct ReplaceEpisodesRequest {
    episodes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteCommentRequest {
    episode_id: String,
    comment_id: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCommentRequest {
    episode_id: String,
    comment: NewComment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewComment {
    text: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikeRequest {
    episode_id: String,
    liked: bool,
}

/// Run `operation` for `request`
pub async fn handle(
    backend: &Backend,
    operation: Operation,
    request: Request,
) -> Result<Response, ApiError> {
    let limit = backend.max_body_bytes;
    match operation {
        Operation::Preflight => Ok(preflight(request.headers())),
        Operation::ListBlobs => list_blobs(backend).await,
        Operation::UploadBlob => upload_blob(backend, request).await,
        Operation::CreateEpisode => {
            create_episode(backend, &read_body(request, limit).await?).await
        }
        Operation::UpdateEpisode => {
            update_episode(backend, &read_body(request, limit).await?).await
        }
        Operation::ReplaceEpisodes => {
            replace_episodes(backend, &read_body(request, limit).await?).await
        }
        Operation::TrackPlay => track_play(backend, &read_body(request, limit).await?).await,
        Operation::DeleteComment => {
            delete_comment(backend, &read_body(request, limit).await?).await
        }
        Operation::AddComment => add_comment(backend, &read_body(request, limit).await?).await,
        Operation::LikeEpisode => {
            like_episode(backend, &read_body(request, limit).await?).await
        }
        Operation::Subscribe => subscribe(backend, &read_body(request, limit).await?).await,
        Operation::Notify => notify(backend, &read_body(request, limit).await?).await,
    }
}

async fn read_body(request: Request, limit: usize) -> Result<Bytes, ApiError> {
    axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| ApiError::InvalidInput(format!("could not read request body: {e}")))
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidInput(format!("malformed request body: {e}")))
}

fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("'{field}' must not be empty")));
    }
    Ok(())
}

async fn apply(backend: &Backend, mutation: Mutation) -> Result<Response, ApiError> {
    let outcome = backend.catalog.apply(mutation).await?;
    Ok(success(response::mutation(&outcome)))
}

async fn list_blobs(backend: &Backend) -> Result<Response, ApiError> {
    let objects = backend.blobs.list().await?;
    Ok(Json(objects).into_response())
}

async fn upload_blob(backend: &Backend, request: Request) -> Result<Response, ApiError> {
    let headers = request.headers();
    let filename = header_str(headers, FILENAME_HEADER).ok_or_else(|| {
        ApiError::InvalidInput("a valid X-Custom-Filename header is required".into())
    })?;
    let key = BlobKey::parse(filename)?;
    let content_type = header_str(headers, header::CONTENT_TYPE.as_str())
        .filter(|ct| ct.starts_with("audio/"))
        .unwrap_or(DEFAULT_AUDIO_TYPE)
        .to_string();

    let stream = request
        .into_body()
        .into_data_stream()
        .map_err(io::Error::other);
    let object = backend
        .blobs
        .put(&key, Box::pin(stream), &content_type)
        .await?;

    Ok(success(json!({
        "message": "File uploaded successfully!",
        "filename": object.key,
        "size": object.size,
    })))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn create_episode(backend: &Backend, body: &[u8]) -> Result<Response, ApiError> {
    let episode = EpisodeRecord::from_value(parse(body)?)?;
    apply(backend, Mutation::CreateEpisode(episode)).await
}

async fn update_episode(backend: &Backend, body: &[u8]) -> Result<Response, ApiError> {
    let patch = EpisodePatch::from_value(parse(body)?)?;
    apply(backend, Mutation::UpdateEpisode(patch)).await
}

async fn replace_episodes(backend: &Backend, body: &[u8]) -> Result<Response, ApiError> {
    let request: ReplaceEpisodesRequest = parse(body)?;
    let episodes = request
        .episodes
        .into_iter()
        .map(EpisodeRecord::from_value)
        .collect::<Result<Vec<_>, _>>()?;
    apply(backend, Mutation::ReplaceEpisodes(episodes)).await
}

async fn track_play(backend: &Backend, body: &[u8]) -> Result<Response, ApiError> {
    let request: EpisodeRef = parse(body)?;
    require(&request.episode_id, "episodeId")?;
    apply(
        backend,
        Mutation::IncrementPlayCount {
            episode_id: request.episode_id,
        },
    )
    .await
}

async fn delete_comment(backend: &Backend, body: &[u8]) -> Result<Response, ApiError> {
    let request: DeleteCommentRequest = parse(body)?;
    require(&request.episode_id, "episodeId")?;
    require(&request.comment_id, "commentId")?;
    apply(
        backend,
        Mutation::DeleteComment {
            episode_id: request.episode_id,
            comment_id: request.comment_id,
            requester: request.user_id,
        },
    )
    .await
}

async fn add_comment(backend: &Backend, body: &[u8]) -> Result<Response, ApiError> {
    let request: AddCommentRequest = parse(body)?;
    require(&request.episode_id, "episodeId")?;
    let comment = complete_comment(request.comment);

    let outcome = backend
        .catalog
        .apply(Mutation::AddComment {
            episode_id: request.episode_id,
            comment: comment.clone(),
        })
        .await?;

    let mut body = response::mutation(&outcome);
    if let Value::Object(fields) = &mut body {
        fields.insert("comment".into(), json!(comment));
    }
    Ok(success(body))
}

/// Fill in the fields the server owns when the client left them out
fn complete_comment(new: NewComment) -> Comment {
    let now = Utc::now();
    let id = new.id.filter(|id| !id.trim().is_empty()).unwrap_or_else(|| {
        let seq = COMMENT_SEQ.fetch_add(1, Ordering::Relaxed);
        format!("comment_{}_{seq}", now.timestamp_millis())
    });
    let author = new
        .author
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string());
    let date = new
        .date
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true));

    Comment {
        id,
        text: new.text,
        author,
        date,
        user_id: new.user_id.filter(|u| !u.is_empty()),
        extra: new.extra,
    }
}

async fn like_episode(backend: &Backend, body: &[u8]) -> Result<Response, ApiError> {
    let request: LikeRequest = parse(body)?;
    require(&request.episode_id, "episodeId")?;
    apply(
        backend,
        Mutation::SetLike {
            episode_id: request.episode_id,
            liked: request.liked,
        },
    )
    .await
}

async fn subscribe(backend: &Backend, body: &[u8]) -> Result<Response, ApiError> {
    let subscription: Subscription = parse(body)?;
    subscription.validate()?;
    backend.subscriptions.put(&subscription).await?;
    Ok(success(Value::Null))
}

async fn notify(backend: &Backend, body: &[u8]) -> Result<Response, ApiError> {
    let request: EpisodeRef = parse(body)?;
    require(&request.episode_id, "episodeId")?;

    let summary = episode_summary(backend, &request.episode_id).await;
    let report = backend.notifier.notify_all(&summary).await?;

    Ok(success(json!({
        "successCount": report.success_count,
        "errorCount": report.error_count,
        "expiredCount": report.expired_count,
    })))
}

/// Look the episode up in the catalog, falling back to generic text
async fn episode_summary(backend: &Backend, episode_id: &str) -> EpisodeSummary {
    match backend.catalog.load().await {
        Ok((catalog, _)) => match catalog.episode(episode_id) {
            Some(episode) => EpisodeSummary::from(episode),
            None => {
                warn!(episode_id, "episode not in catalog, using generic notification");
                EpisodeSummary::fallback(episode_id)
            }
        },
        Err(e) => {
            warn!(episode_id, error = %e, "catalog unavailable, using generic notification");
            EpisodeSummary::fallback(episode_id)
        }
    }
}
