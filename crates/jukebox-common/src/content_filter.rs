use serde::{Deserialize, Serialize};

use crate::types::{ContentFilterConfig, Track};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl FilterDecision {
    fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    fn block(reason: String) -> Self {
        Self { allowed: false, reason: Some(reason) }
    }
}

/// Track predicate over the parental content rules.
///
/// Names are compared case-insensitively. Genre rules only apply to tracks that
/// carry genre data, since Spotify only reports genres per artist.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    explicit_blocked: bool,
    blocked_artists: Vec<String>,
    blocked_songs: Vec<String>,
    blocked_albums: Vec<String>,
    allowed_genres: Vec<String>,
    blocked_genres: Vec<String>,
}

impl ContentFilter {
    pub fn new(config: &ContentFilterConfig) -> Self {
        Self {
            explicit_blocked: config.explicit_blocked,
            blocked_artists: normalize(&config.blocked_artists),
            blocked_songs: normalize(&config.blocked_songs),
            blocked_albums: normalize(&config.blocked_albums),
            allowed_genres: normalize(&config.allowed_genres),
            blocked_genres: normalize(&config.blocked_genres),
        }
    }

    pub fn is_allowed(&self, track: &Track) -> bool {
        self.check(track).allowed
    }

    pub fn check(&self, track: &Track) -> FilterDecision {
        if self.explicit_blocked && track.explicit {
            return FilterDecision::block("Explicit content is blocked".to_string());
        }

        if let Some(artist) =
            track.artists.iter().find(|a| self.blocked_artists.contains(&a.to_lowercase()))
        {
            return FilterDecision::block(format!("Artist '{}' is blocked", artist));
        }

        if self.blocked_songs.contains(&track.name.to_lowercase()) {
            return FilterDecision::block(format!("Song '{}' is blocked", track.name));
        }

        if let Some(album) = &track.album {
            if self.blocked_albums.contains(&album.to_lowercase()) {
                return FilterDecision::block(format!("Album '{}' is blocked", album));
            }
        }

        if !track.genres.is_empty() {
            let genres = normalize(&track.genres);

            if let Some(genre) = genres.iter().find(|g| self.blocked_genres.contains(g)) {
                return FilterDecision::block(format!("Genre '{}' is blocked", genre));
            }

            if !self.allowed_genres.is_empty()
                && !genres.iter().any(|g| self.allowed_genres.contains(g))
            {
                return FilterDecision::block("Genre is not in the allowed list".to_string());
            }
        }

        FilterDecision::allow()
    }
}

fn normalize(names: &[String]) -> Vec<String> {
    names.iter().map(|n| n.trim().to_lowercase()).filter(|n| !n.is_empty()).collect()
}
