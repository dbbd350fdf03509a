// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::str::FromStr;

use axum::http::Method;

use crate::error::ApiError;

/// Header selecting the operation for a method
pub const ACTION_HEADER: &str = "x-action";

/// Values accepted in the `X-Action` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Subscribe,
    Notify,
    UpdateEpisode,
    UpdateEpisodes,
    TrackPlay,
    DeleteComment,
    AddComment,
    LikeEpisode,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Subscribe => "subscribe",
            Action::Notify => "notify",
            Action::UpdateEpisode => "update_episode",
            Action::UpdateEpisodes => "update_episodes",
            Action::TrackPlay => "track_play",
            Action::DeleteComment => "delete_comment",
            Action::AddComment => "add_comment",
            Action::LikeEpisode => "like_episode",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "subscribe" => Action::Subscribe,
            "notify" => Action::Notify,
            "update_episode" => Action::UpdateEpisode,
            "update_episodes" => Action::UpdateEpisodes,
            "track_play" => Action::TrackPlay,
            "delete_comment" => Action::DeleteComment,
            "add_comment" => Action::AddComment,
            "like_episode" => Action::LikeEpisode,
            _ => return Err(()),
        })
    }
}

/// Everything the backend can do for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Preflight,
    ListBlobs,
    UploadBlob,
    CreateEpisode,
    UpdateEpisode,
    ReplaceEpisodes,
    TrackPlay,
    DeleteComment,
    AddComment,
    LikeEpisode,
    Subscribe,
    Notify,
}

impl Operation {
    /// Map (method, action header) to an operation.
    ///
    /// An empty action header counts as absent.
    pub fn resolve(method: &Method, action: Option<&str>) -> Result<Self, ApiError> {
        if *method == Method::OPTIONS {
            return Ok(Operation::Preflight);
        }
        if ![Method::GET, Method::PUT, Method::POST].contains(method) {
            return Err(ApiError::MethodNotAllowed(method.clone()));
        }

        let action = match action.map(str::trim).filter(|a| !a.is_empty()) {
            None => None,
            Some(raw) => Some(raw.parse::<Action>().map_err(|_| unknown(method, raw))?),
        };

        let operation = match (method.clone(), action) {
            (Method::GET, None) => Operation::ListBlobs,

            (Method::PUT, None) => Operation::CreateEpisode,
            (Method::PUT, Some(Action::UpdateEpisodes)) => Operation::ReplaceEpisodes,

            (Method::POST, None) => Operation::UploadBlob,
            (Method::POST, Some(action)) => match action {
                Action::Subscribe => Operation::Subscribe,
                Action::Notify => Operation::Notify,
                Action::UpdateEpisode => Operation::UpdateEpisode,
                Action::UpdateEpisodes => Operation::ReplaceEpisodes,
                Action::TrackPlay => Operation::TrackPlay,
                Action::DeleteComment => Operation::DeleteComment,
                Action::AddComment => Operation::AddComment,
                Action::LikeEpisode => Operation::LikeEpisode,
            },

            (_, Some(action)) => return Err(unknown(method, action.as_str())),
            (other, None) => return Err(ApiError::MethodNotAllowed(other)),
        };

        Ok(operation)
    }
}

fn unknown(method: &Method, action: &str) -> ApiError {
    ApiError::UnknownAction {
        method: method.clone(),
        action: action.to_string(),
    }
}
