// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Args;
use url::Url;

use crate::document::GithubLocation;
use crate::error::ConfigError;

pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// How long push services hold an undelivered notification (seconds)
pub const DEFAULT_PUSH_TTL: u32 = 24 * 60 * 60;

/// Raw server settings as given on the command line or in the environment.
///
/// Nothing here is checked until [`Settings::validate`] runs, so a
/// misconfigured server can still start and report the problem per request.
#[derive(Args, Debug, Clone, Default)]
pub struct Settings {
    /// Directory holding uploaded audio objects
    #[arg(long, env = "RADIO_APP_BUCKET")]
    pub blob_dir: Option<PathBuf>,

    /// Directory holding push subscription records
    #[arg(long, env = "SUBSCRIPTIONS_KV")]
    pub subscriptions_dir: Option<PathBuf>,

    /// VAPID private key (url-safe base64)
    #[arg(long, env = "VAPID_PRIVATE_KEY", hide_env_values = true)]
    pub vapid_private_key: Option<String>,

    /// Contact URI sent in the VAPID `sub` claim
    #[arg(long, env = "VAPID_SUBJECT", default_value = "mailto:podcast@localhost")]
    pub vapid_subject: String,

    /// GitHub token with contents write access to the catalog repository
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Catalog repository as `owner/name`
    #[arg(long, env = "CATALOG_REPO")]
    pub catalog_repo: Option<String>,

    /// Path of the catalog file inside the repository
    #[arg(long, env = "CATALOG_PATH", default_value = "episodes.json")]
    pub catalog_path: String,

    #[arg(long, env = "CATALOG_BRANCH", default_value = "main")]
    pub catalog_branch: String,

    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub github_api_url: String,

    /// Public site URL used as the notification click target
    #[arg(long, env = "SITE_URL", default_value = "http://localhost:8080/")]
    pub site_url: String,

    /// Icon shown with push notifications
    #[arg(
        long,
        env = "NOTIFICATION_ICON",
        default_value = "./icons/icon-192x192.png"
    )]
    pub notification_icon: String,

    /// Maximum size of a JSON request body in bytes
    #[arg(long, env = "PODRELAY_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Seconds a push service keeps an undelivered notification
    #[arg(long, env = "PODRELAY_PUSH_TTL", default_value_t = DEFAULT_PUSH_TTL)]
    pub push_ttl: u32,
}

/// Validated server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub blob_dir: PathBuf,
    pub subscriptions_dir: PathBuf,
    pub vapid_private_key: String,
    pub vapid_subject: String,
    pub github_token: String,
    pub catalog: GithubLocation,
    pub site_url: Url,
    pub notification_icon: String,
    pub max_body_bytes: usize,
    pub push_ttl: u32,
}

impl Settings {
    /// Check the required items and parse the typed ones.
    ///
    /// Fails with the first missing or invalid item.
    pub fn validate(&self) -> Result<Config, ConfigError> {
        let blob_dir = required_path(&self.blob_dir, "RADIO_APP_BUCKET")?;
        let subscriptions_dir = required_path(&self.subscriptions_dir, "SUBSCRIPTIONS_KV")?;
        let vapid_private_key = required(&self.vapid_private_key, "VAPID_PRIVATE_KEY")?;
        let github_token = required(&self.github_token, "GITHUB_TOKEN")?;
        let repo = required(&self.catalog_repo, "CATALOG_REPO")?;

        let (owner, name) = repo
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
            .ok_or_else(|| ConfigError::Invalid {
                name: "CATALOG_REPO",
                reason: format!("expected 'owner/name', got '{repo}'"),
            })?;

        let api_base = parse_url(&self.github_api_url, "GITHUB_API_URL")?;
        let site_url = parse_url(&self.site_url, "SITE_URL")?;

        if self.catalog_path.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid {
                name: "CATALOG_PATH",
                reason: "path must not be empty".into(),
            });
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid {
                name: "PODRELAY_MAX_BODY_BYTES",
                reason: "must be greater than zero".into(),
            });
        }

        let catalog = GithubLocation {
            api_base,
            owner: owner.to_string(),
            repo: name.to_string(),
            path: self.catalog_path.clone(),
            branch: self.catalog_branch.clone(),
        };
        // Surface an unusable API base now rather than on the first request
        catalog.contents_url()?;

        Ok(Config {
            blob_dir,
            subscriptions_dir,
            vapid_private_key,
            vapid_subject: self.vapid_subject.clone(),
            github_token,
            catalog,
            site_url,
            notification_icon: self.notification_icon.clone(),
            max_body_bytes: self.max_body_bytes,
            push_ttl: self.push_ttl,
        })
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing(name))
}

fn required_path(value: &Option<PathBuf>, name: &'static str) -> Result<PathBuf, ConfigError> {
    value
        .clone()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_url(value: &str, name: &'static str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("'{value}' is not a valid URL: {e}"),
    })
}
