// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::CatalogError;

use super::model::{Catalog, Comment, EpisodePatch, EpisodeRecord};

/// One in-memory transform of the catalog
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Prepend a new episode (newest first)
    CreateEpisode(EpisodeRecord),
    /// Shallow-merge fields into an existing episode
    UpdateEpisode(EpisodePatch),
    /// Replace the whole episode list
    ReplaceEpisodes(Vec<EpisodeRecord>),
    /// Add one play; a missing episode is a soft no-op
    IncrementPlayCount { episode_id: String },
    /// Remove one comment, checking the requester against the comment owner
    DeleteComment {
        episode_id: String,
        comment_id: String,
        requester: Option<String>,
    },
    /// Append a comment
    AddComment { episode_id: String, comment: Comment },
    /// Adjust the like counter by one; a missing episode is a soft no-op
    SetLike { episode_id: String, liked: bool },
}

/// Result of applying a mutation to an in-memory catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The catalog changed; `message` describes it for the revision history
    Changed { message: String },
    /// Nothing to write
    Unchanged,
}

impl Mutation {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::CreateEpisode(_) => "create_episode",
            Mutation::UpdateEpisode(_) => "update_episode",
            Mutation::ReplaceEpisodes(_) => "update_episodes",
            Mutation::IncrementPlayCount { .. } => "track_play",
            Mutation::DeleteComment { .. } => "delete_comment",
            Mutation::AddComment { .. } => "add_comment",
            Mutation::SetLike { .. } => "like_episode",
        }
    }

    /// Apply the transform. On error the catalog is left untouched.
    pub fn apply(self, catalog: &mut Catalog) -> Result<Applied, CatalogError> {
        match self {
            Mutation::CreateEpisode(episode) => create_episode(catalog, episode),
            Mutation::UpdateEpisode(patch) => update_episode(catalog, &patch),
            Mutation::ReplaceEpisodes(episodes) => replace_episodes(catalog, episodes),
            Mutation::IncrementPlayCount { episode_id } => {
                increment_play_count(catalog, &episode_id)
            }
            Mutation::DeleteComment {
                episode_id,
                comment_id,
                requester,
            } => delete_comment(catalog, &episode_id, &comment_id, requester.as_deref()),
            Mutation::AddComment {
                episode_id,
                comment,
            } => add_comment(catalog, &episode_id, comment),
            Mutation::SetLike { episode_id, liked } => set_like(catalog, &episode_id, liked),
        }
    }
}

fn changed(message: String) -> Result<Applied, CatalogError> {
    Ok(Applied::Changed { message })
}

fn ensure_unique_ids(episodes: &[EpisodeRecord]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for episode in episodes {
        let id = episode.id().filter(|id| !id.is_empty()).ok_or_else(|| {
            CatalogError::InvalidInput("episode id must not be empty".into())
        })?;
        if !seen.insert(id) {
            return Err(CatalogError::InvalidInput(format!(
                "duplicate episode id '{id}'"
            )));
        }
    }
    Ok(())
}

fn create_episode(catalog: &mut Catalog, episode: EpisodeRecord) -> Result<Applied, CatalogError> {
    let id = episode
        .id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CatalogError::InvalidInput("episode id must not be empty".into()))?;
    if catalog.episode(id).is_some() {
        return Err(CatalogError::InvalidInput(format!(
            "episode '{id}' already exists"
        )));
    }

    let message = format!("Create new episode: {}", episode.title());
    catalog.episodes.insert(0, episode);
    changed(message)
}

fn update_episode(catalog: &mut Catalog, patch: &EpisodePatch) -> Result<Applied, CatalogError> {
    let episode = catalog
        .episode_mut(patch.id())
        .ok_or_else(|| CatalogError::EpisodeNotFound(patch.id().to_string()))?;

    let merged = patch.merge_into(episode)?;
    let message = format!("Update episode: {}", merged.title());
    *episode = merged;
    changed(message)
}

fn replace_episodes(
    catalog: &mut Catalog,
    episodes: Vec<EpisodeRecord>,
) -> Result<Applied, CatalogError> {
    ensure_unique_ids(&episodes)?;

    let message = format!("Update episode list ({} episodes)", episodes.len());
    catalog.episodes = episodes;
    changed(message)
}

fn increment_play_count(catalog: &mut Catalog, episode_id: &str) -> Result<Applied, CatalogError> {
    // Tolerates a concurrent deletion of the episode
    let Some(episode) = catalog.episode_mut(episode_id) else {
        return Ok(Applied::Unchanged);
    };

    let plays = episode.counter("playCount")?.saturating_add(1);
    episode.set_counter("playCount", plays)?;
    changed(format!("Track play: {} ({plays} plays)", episode.title()))
}

fn comment_id(comment: &Value) -> Option<&str> {
    comment.get("id").and_then(Value::as_str)
}

fn delete_comment(
    catalog: &mut Catalog,
    episode_id: &str,
    comment_id_to_delete: &str,
    requester: Option<&str>,
) -> Result<Applied, CatalogError> {
    let episode = catalog
        .episode_mut(episode_id)
        .ok_or_else(|| CatalogError::EpisodeNotFound(episode_id.to_string()))?;
    let title = episode.title().to_string();
    let comments = episode.comments_mut()?;

    let position = comments
        .iter()
        .position(|c| comment_id(c) == Some(comment_id_to_delete))
        .ok_or_else(|| CatalogError::CommentNotFound {
            episode_id: episode_id.to_string(),
            comment_id: comment_id_to_delete.to_string(),
        })?;

    if let Some(requester) = requester.filter(|r| !r.is_empty())
        && comments[position].get("userId").and_then(Value::as_str) != Some(requester)
    {
        return Err(CatalogError::Unauthorized {
            comment_id: comment_id_to_delete.to_string(),
        });
    }

    comments.remove(position);
    changed(format!(
        "Delete comment {comment_id_to_delete} from episode: {title}"
    ))
}

fn add_comment(
    catalog: &mut Catalog,
    episode_id: &str,
    comment: Comment,
) -> Result<Applied, CatalogError> {
    if comment.text.trim().is_empty() {
        return Err(CatalogError::InvalidInput("comment text must not be empty".into()));
    }

    let episode = catalog
        .episode_mut(episode_id)
        .ok_or_else(|| CatalogError::EpisodeNotFound(episode_id.to_string()))?;
    let message = format!("Add comment to episode: {}", episode.title());
    let comments = episode.comments_mut()?;

    if comments.iter().any(|c| comment_id(c) == Some(comment.id.as_str())) {
        return Err(CatalogError::InvalidInput(format!(
            "comment '{}' already exists",
            comment.id
        )));
    }

    comments.push(serde_json::to_value(&comment).map_err(CatalogError::SerializeFailed)?);
    changed(message)
}

fn set_like(catalog: &mut Catalog, episode_id: &str, liked: bool) -> Result<Applied, CatalogError> {
    let Some(episode) = catalog.episode_mut(episode_id) else {
        return Ok(Applied::Unchanged);
    };

    let current = episode.counter("likes")?;
    let next = if liked {
        current.saturating_add(1)
    } else {
        current.saturating_sub(1)
    };
    episode.set_counter("likes", next)?;

    let verb = if liked { "Like" } else { "Unlike" };
    changed(format!("{verb} episode: {} ({next} likes)", episode.title()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn make_episode(id: &str, title: &str) -> EpisodeRecord {
        EpisodeRecord::from_value(json!({
            "id": id,
            "title": title,
            "description": format!("About {title}"),
            "audioUrl": format!("https://cdn.example.com/{id}.mp3"),
            "publishedAt": "2024-01-15T12:00:00Z",
            "duration": "30:00",
        }))
        .unwrap()
    }

    fn make_comment(id: &str, user_id: Option<&str>) -> Comment {
        Comment {
            id: id.to_string(),
            text: format!("comment {id}"),
            author: "anonymous".to_string(),
            date: "2024-01-16T08:00:00Z".to_string(),
            user_id: user_id.map(String::from),
            extra: Map::new(),
        }
    }

    fn catalog_with(episodes: Vec<EpisodeRecord>) -> Catalog {
        Catalog {
            episodes,
            extra: Map::new(),
        }
    }

    fn commented_catalog() -> Catalog {
        let mut value = make_episode("ep1", "First").as_value().clone();
        value["comments"] = json!([
            make_comment("c1", Some("user_a")),
            make_comment("c2", Some("user_b")),
            make_comment("c3", Some("user_a")),
        ]);
        catalog_with(vec![EpisodeRecord::from_value(value).unwrap()])
    }

    fn comment_ids(catalog: &Catalog) -> Vec<String> {
        let episode = catalog.episodes[0].decode().unwrap();
        episode.comments.unwrap().into_iter().map(|c| c.id).collect()
    }

    fn ids(catalog: &Catalog) -> Vec<&str> {
        catalog.episodes.iter().filter_map(EpisodeRecord::id).collect()
    }

    #[test]
    fn create_prepends_and_preserves_order() {
        let mut catalog = catalog_with(vec![make_episode("b", "B"), make_episode("a", "A")]);

        let applied = Mutation::CreateEpisode(make_episode("c", "Pilot"))
            .apply(&mut catalog)
            .unwrap();

        assert_eq!(ids(&catalog), vec!["c", "b", "a"]);
        assert_eq!(
            applied,
            Applied::Changed {
                message: "Create new episode: Pilot".to_string()
            }
        );
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);
        let before = catalog.clone();

        let err = Mutation::CreateEpisode(make_episode("a", "Again"))
            .apply(&mut catalog)
            .unwrap_err();

        assert!(matches!(err, CatalogError::InvalidInput(_)));
        assert_eq!(catalog, before);
    }

    #[test]
    fn update_changes_only_patched_fields() {
        let mut catalog = catalog_with(vec![make_episode("b", "B"), make_episode("a", "A")]);
        let before = catalog.clone();
        let patch =
            EpisodePatch::from_value(json!({"id": "a", "title": "Renamed", "duration": "31:00"}))
                .unwrap();

        Mutation::UpdateEpisode(patch).apply(&mut catalog).unwrap();

        let mut expected = before.episodes[1].as_value().clone();
        expected["title"] = json!("Renamed");
        expected["duration"] = json!("31:00");
        assert_eq!(catalog.episodes[1].as_value(), &expected);
        assert_eq!(catalog.episodes[0], before.episodes[0]);
    }

    #[test]
    fn update_missing_episode_fails() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);
        let patch = EpisodePatch::from_value(json!({"id": "zzz", "title": "x"})).unwrap();

        let err = Mutation::UpdateEpisode(patch).apply(&mut catalog).unwrap_err();

        assert!(matches!(err, CatalogError::EpisodeNotFound(id) if id == "zzz"));
    }

    #[test]
    fn replace_swaps_entire_list() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);
        let list = vec![make_episode("x", "X"), make_episode("y", "Y")];

        Mutation::ReplaceEpisodes(list.clone())
            .apply(&mut catalog)
            .unwrap();

        assert_eq!(catalog.episodes, list);
    }

    #[test]
    fn replace_rejects_duplicate_ids() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);
        let list = vec![make_episode("x", "X"), make_episode("x", "Y")];

        let err = Mutation::ReplaceEpisodes(list).apply(&mut catalog).unwrap_err();

        assert!(matches!(err, CatalogError::InvalidInput(_)));
        assert_eq!(ids(&catalog), vec!["a"]);
    }

    #[test]
    fn replace_with_empty_list_deletes_everything() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);
        Mutation::ReplaceEpisodes(Vec::new())
            .apply(&mut catalog)
            .unwrap();
        assert!(catalog.episodes.is_empty());
    }

    #[test]
    fn play_count_increments_n_times() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);
        catalog.episodes[0].set_counter("playCount", 5).unwrap();

        for _ in 0..3 {
            Mutation::IncrementPlayCount {
                episode_id: "a".into(),
            }
            .apply(&mut catalog)
            .unwrap();
        }

        assert_eq!(catalog.episodes[0].counter("playCount").unwrap(), 8);
    }

    #[test]
    fn play_count_on_missing_episode_is_soft_noop() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);
        let before = catalog.clone();

        let applied = Mutation::IncrementPlayCount {
            episode_id: "gone".into(),
        }
        .apply(&mut catalog)
        .unwrap();

        assert_eq!(applied, Applied::Unchanged);
        assert_eq!(catalog, before);
    }

    #[test]
    fn play_count_ignores_malformed_siblings() {
        let mut catalog = Catalog::from_slice(
            br#"{"episodes":[
                {"id":"broken","playCount":"n/a","comments":{"id":"c"}},
                {"id":"fine","title":"Fine","playCount":null}
            ]}"#,
        )
        .unwrap();
        let broken = catalog.episodes[0].clone();

        let applied = Mutation::IncrementPlayCount {
            episode_id: "fine".into(),
        }
        .apply(&mut catalog)
        .unwrap();

        assert_eq!(
            applied,
            Applied::Changed {
                message: "Track play: Fine (1 plays)".to_string()
            }
        );
        assert_eq!(catalog.episodes[0], broken);
        assert_eq!(catalog.episodes[1].counter("playCount").unwrap(), 1);
    }

    #[test]
    fn malformed_target_is_reported() {
        let mut catalog =
            Catalog::from_slice(br#"{"episodes":[{"id":"broken","playCount":"n/a"}]}"#).unwrap();

        let err = Mutation::IncrementPlayCount {
            episode_id: "broken".into(),
        }
        .apply(&mut catalog)
        .unwrap_err();

        assert!(matches!(err, CatalogError::MalformedEpisode { id, .. } if id == "broken"));
    }

    #[test]
    fn delete_comment_by_owner_preserves_order() {
        let mut catalog = commented_catalog();

        Mutation::DeleteComment {
            episode_id: "ep1".into(),
            comment_id: "c2".into(),
            requester: Some("user_b".into()),
        }
        .apply(&mut catalog)
        .unwrap();

        assert_eq!(comment_ids(&catalog), vec!["c1", "c3"]);
    }

    #[test]
    fn delete_comment_without_requester_is_unconditional() {
        for requester in [None, Some(String::new())] {
            let mut catalog = commented_catalog();

            Mutation::DeleteComment {
                episode_id: "ep1".into(),
                comment_id: "c1".into(),
                requester,
            }
            .apply(&mut catalog)
            .unwrap();

            assert_eq!(comment_ids(&catalog), vec!["c2", "c3"]);
        }
    }

    #[test]
    fn delete_comment_by_other_user_is_unauthorized() {
        let mut catalog = commented_catalog();
        let before = catalog.clone();

        let err = Mutation::DeleteComment {
            episode_id: "ep1".into(),
            comment_id: "c1".into(),
            requester: Some("user_b".into()),
        }
        .apply(&mut catalog)
        .unwrap_err();

        assert!(matches!(err, CatalogError::Unauthorized { .. }));
        assert_eq!(catalog, before);
    }

    #[test]
    fn delete_comment_reports_missing_targets() {
        let mut catalog = commented_catalog();

        let missing_episode = Mutation::DeleteComment {
            episode_id: "nope".into(),
            comment_id: "c1".into(),
            requester: None,
        }
        .apply(&mut catalog)
        .unwrap_err();
        assert!(matches!(missing_episode, CatalogError::EpisodeNotFound(_)));

        let missing_comment = Mutation::DeleteComment {
            episode_id: "ep1".into(),
            comment_id: "c9".into(),
            requester: None,
        }
        .apply(&mut catalog)
        .unwrap_err();
        assert!(matches!(missing_comment, CatalogError::CommentNotFound { .. }));
    }

    #[test]
    fn add_comment_appends_in_order() {
        let mut catalog = commented_catalog();

        Mutation::AddComment {
            episode_id: "ep1".into(),
            comment: make_comment("c4", None),
        }
        .apply(&mut catalog)
        .unwrap();

        assert_eq!(comment_ids(&catalog), vec!["c1", "c2", "c3", "c4"]);
    }

    #[test]
    fn add_comment_to_episode_without_comments() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);

        Mutation::AddComment {
            episode_id: "a".into(),
            comment: make_comment("c1", Some("user_a")),
        }
        .apply(&mut catalog)
        .unwrap();

        assert_eq!(
            catalog.episodes[0].as_value()["comments"][0]["userId"],
            "user_a"
        );
    }

    #[test]
    fn add_comment_validates_input() {
        let mut catalog = commented_catalog();

        let mut blank = make_comment("c9", None);
        blank.text = "   ".into();
        let err = Mutation::AddComment {
            episode_id: "ep1".into(),
            comment: blank,
        }
        .apply(&mut catalog)
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput(_)));

        let err = Mutation::AddComment {
            episode_id: "ep1".into(),
            comment: make_comment("c1", None),
        }
        .apply(&mut catalog)
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput(_)));

        let err = Mutation::AddComment {
            episode_id: "missing".into(),
            comment: make_comment("c9", None),
        }
        .apply(&mut catalog)
        .unwrap_err();
        assert!(matches!(err, CatalogError::EpisodeNotFound(_)));
    }

    #[test]
    fn likes_are_clamped_at_zero() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);

        let like = |liked| Mutation::SetLike {
            episode_id: "a".into(),
            liked,
        };

        like(false).apply(&mut catalog).unwrap();
        assert_eq!(catalog.episodes[0].as_value()["likes"], 0);

        like(true).apply(&mut catalog).unwrap();
        like(true).apply(&mut catalog).unwrap();
        like(false).apply(&mut catalog).unwrap();
        assert_eq!(catalog.episodes[0].as_value()["likes"], 1);
    }

    #[test]
    fn like_on_missing_episode_is_soft_noop() {
        let mut catalog = catalog_with(vec![make_episode("a", "A")]);
        let applied = Mutation::SetLike {
            episode_id: "gone".into(),
            liked: true,
        }
        .apply(&mut catalog)
        .unwrap();
        assert_eq!(applied, Applied::Unchanged);
    }
}
