// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, StoreError};
use crate::http::{HttpClient, HttpRequest, HttpResponse};

use super::{DocumentStore, Revision, VersionedDocument};

const USER_AGENT: &str = concat!("podrelay/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github.v3+json";

/// Maximum number of response body characters kept in error messages
const MAX_ERROR_BODY: usize = 200;

/// Where the catalog file lives in a GitHub repository
#[derive(Debug, Clone)]
pub struct GithubLocation {
    pub api_base: Url,
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
}

impl GithubLocation {
    /// URL of the contents API resource for this file
    pub fn contents_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ConfigError::Invalid {
                name: "GITHUB_API_URL",
                reason: format!("'{}' cannot be used as a base URL", self.api_base),
            })?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str(), "contents"])
            .extend(self.path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

/// Document store backed by a file in a GitHub repository.
///
/// The file's blob sha is the revision token; GitHub rejects an update whose
/// sha is stale with `409 Conflict`.
pub struct GithubDocumentStore<C: HttpClient> {
    client: C,
    contents_url: Url,
    branch: String,
    token: String,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

#[derive(Deserialize)]
struct UpdateResponse {
    content: UpdatedContent,
}

#[derive(Deserialize)]
struct UpdatedContent {
    sha: String,
}

impl<C: HttpClient> GithubDocumentStore<C> {
    pub fn new(
        client: C,
        location: &GithubLocation,
        token: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            contents_url: location.contents_url()?,
            branch: location.branch.clone(),
            token: token.into(),
        })
    }

    fn request(&self, method: Method, url: &Url) -> HttpRequest {
        HttpRequest::new(method, url.as_str())
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StoreError> {
        let url = request.url.clone();
        self.client
            .send(request)
            .await
            .map_err(|e| StoreError::RequestFailed { url, source: e })
    }
}

fn status_error(response: &HttpResponse) -> StoreError {
    let message: String = String::from_utf8_lossy(&response.body)
        .chars()
        .take(MAX_ERROR_BODY)
        .collect();
    StoreError::HttpStatus {
        status: response.status,
        message,
    }
}

fn decode_content(response: ContentsResponse) -> Result<VersionedDocument, StoreError> {
    if let Some(encoding) = response.encoding.as_deref()
        && encoding != "base64"
    {
        return Err(StoreError::MalformedResponse(format!(
            "unsupported content encoding '{encoding}'"
        )));
    }

    // GitHub wraps base64 content at 60 columns
    let compact: String = response
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let content = STANDARD
        .decode(compact)
        .map_err(|e| StoreError::MalformedResponse(format!("invalid base64 content: {e}")))?;

    Ok(VersionedDocument {
        content: Bytes::from(content),
        revision: Revision::new(response.sha),
    })
}

#[async_trait]
impl<C: HttpClient> DocumentStore for GithubDocumentStore<C> {
    async fn read(&self) -> Result<VersionedDocument, StoreError> {
        let mut url = self.contents_url.clone();
        url.query_pairs_mut().append_pair("ref", &self.branch);

        let response = self.send(self.request(Method::GET, &url)).await?;
        if !response.is_success() {
            return Err(status_error(&response));
        }

        let parsed: ContentsResponse = serde_json::from_slice(&response.body)
            .map_err(|e| StoreError::MalformedResponse(e.to_string()))?;
        decode_content(parsed)
    }

    async fn write(
        &self,
        content: Bytes,
        expected: &Revision,
        message: &str,
    ) -> Result<Revision, StoreError> {
        let body = UpdateRequest {
            message,
            content: STANDARD.encode(&content),
            sha: expected.as_str(),
            branch: &self.branch,
        };
        let body = serde_json::to_vec(&body).map_err(StoreError::SerializeFailed)?;

        let request = self
            .request(Method::PUT, &self.contents_url)
            .header("Content-Type", "application/json")
            .body(body);
        let response = self.send(request).await?;

        match response.status {
            409 => Err(StoreError::Conflict {
                expected: expected.to_string(),
            }),
            _ if !response.is_success() => Err(status_error(&response)),
            _ => {
                let parsed: UpdateResponse = serde_json::from_slice(&response.body)
                    .map_err(|e| StoreError::MalformedResponse(e.to_string()))?;
                Ok(Revision::new(parsed.content.sha))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct MockHttpClient {
        responses: Mutex<VecDeque<HttpResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl MockHttpClient {
        fn new(responses: Vec<(u16, &str)>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|(status, body)| HttpResponse {
                            status,
                            body: Bytes::from(body.to_string()),
                        })
                        .collect(),
                ),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for &MockHttpClient {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, reqwest::Error> {
            self.requests.lock().unwrap().push(request);
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected request"))
        }
    }

    fn location() -> GithubLocation {
        GithubLocation {
            api_base: Url::parse("https://api.github.com").unwrap(),
            owner: "acme".to_string(),
            repo: "radio".to_string(),
            path: "data/episodes.json".to_string(),
            branch: "main".to_string(),
        }
    }

    fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn contents_url_joins_repository_and_path() {
        let url = location().contents_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/radio/contents/data/episodes.json"
        );
    }

    #[tokio::test]
    async fn read_decodes_wrapped_base64_content() {
        let encoded = STANDARD.encode(r#"{"episodes":[]}"#);
        let (head, tail) = encoded.split_at(8);
        let body = format!(r#"{{"sha":"abc123","encoding":"base64","content":"{head}\n{tail}\n"}}"#);
        let client = MockHttpClient::new(vec![(200, body.as_str())]);
        let store = GithubDocumentStore::new(&client, &location(), "secret").unwrap();

        let doc = store.read().await.unwrap();

        assert_eq!(&doc.content[..], br#"{"episodes":[]}"#);
        assert_eq!(doc.revision, Revision::new("abc123"));

        let requests = client.requests();
        assert_eq!(requests[0].method, Method::GET);
        assert!(requests[0].url.ends_with("/contents/data/episodes.json?ref=main"));
        assert_eq!(header(&requests[0], "Authorization"), Some("token secret"));
    }

    #[tokio::test]
    async fn read_reports_non_success_status() {
        let client = MockHttpClient::new(vec![(503, "Service Unavailable")]);
        let store = GithubDocumentStore::new(&client, &location(), "secret").unwrap();

        match store.read().await.unwrap_err() {
            StoreError::HttpStatus { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Service Unavailable");
            }
            other => panic!("Expected HttpStatus error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_rejects_unencoded_large_files() {
        let client = MockHttpClient::new(vec![(
            200,
            r#"{"sha":"abc","encoding":"none","content":""}"#,
        )]);
        let store = GithubDocumentStore::new(&client, &location(), "secret").unwrap();

        assert!(matches!(
            store.read().await.unwrap_err(),
            StoreError::MalformedResponse(_)
        ));
    }

    #[tokio::test]
    async fn write_sends_expected_sha_and_returns_new_revision() {
        let client = MockHttpClient::new(vec![(200, r#"{"content":{"sha":"def456"},"commit":{}}"#)]);
        let store = GithubDocumentStore::new(&client, &location(), "secret").unwrap();

        let revision = store
            .write(
                Bytes::from_static(b"{}"),
                &Revision::new("abc123"),
                "Create new episode: Pilot",
            )
            .await
            .unwrap();

        assert_eq!(revision, Revision::new("def456"));

        let requests = client.requests();
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(header(&requests[0], "Content-Type"), Some("application/json"));
        let sent: serde_json::Value =
            serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent["sha"], "abc123");
        assert_eq!(sent["branch"], "main");
        assert_eq!(sent["message"], "Create new episode: Pilot");
        assert_eq!(sent["content"], STANDARD.encode("{}"));
    }

    #[tokio::test]
    async fn write_maps_409_to_conflict() {
        let client = MockHttpClient::new(vec![(409, r#"{"message":"does not match"}"#)]);
        let store = GithubDocumentStore::new(&client, &location(), "secret").unwrap();

        let err = store
            .write(Bytes::from_static(b"{}"), &Revision::new("stale"), "msg")
            .await
            .unwrap_err();

        match err {
            StoreError::Conflict { expected } => assert_eq!(expected, "stale"),
            other => panic!("Expected Conflict error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_maps_other_failures_to_http_status() {
        let client = MockHttpClient::new(vec![(422, "Unprocessable")]);
        let store = GithubDocumentStore::new(&client, &location(), "secret").unwrap();

        let err = store
            .write(Bytes::from_static(b"{}"), &Revision::new("abc"), "msg")
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::HttpStatus { status: 422, .. }));
    }
}
