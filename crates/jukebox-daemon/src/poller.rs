use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use jukebox_common::{PlaybackSnapshot, Track};
use jukebox_proto::Event;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::service::KioskService;

/// Refreshes the shared playback snapshot and turns transitions into
/// session and song-play bookkeeping.
pub struct PlaybackPoller {
    service: Arc<KioskService>,
}

impl PlaybackPoller {
    pub fn new(service: Arc<KioskService>) -> Self {
        Self { service }
    }

    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Playback poller started ({:?} interval)", period);

            loop {
                ticker.tick().await;
                if let Err(e) = self.poll_once(Local::now()).await {
                    debug!("Playback poll failed: {:#}", e);
                }
            }
        })
    }

    pub async fn poll_once(&self, now: DateTime<Local>) -> Result<()> {
        if !self.service.music().is_authorized().await {
            return Ok(());
        }

        let snapshot = self
            .service
            .music()
            .current_playback()
            .await
            .context("Failed to fetch current playback")?;
        self.apply(snapshot, now).await
    }

    /// Store `snapshot` and react to what changed since the previous one
    pub async fn apply(&self, snapshot: PlaybackSnapshot, now: DateTime<Local>) -> Result<()> {
        let previous = self.service.replace_playback(snapshot.clone()).await;

        if previous.as_ref().map_or(true, |p| differs(p, &snapshot)) {
            self.service.publish(Event::PlaybackChanged { snapshot: snapshot.clone() });
        }

        let has_session = self.service.has_open_session().await;
        if snapshot.is_playing && !has_session {
            self.service.begin_session(now).await;
        } else if !snapshot.is_playing && has_session {
            self.service.finish_session(now).await;
        }

        if !snapshot.is_playing {
            return Ok(());
        }

        let Some(track) = &snapshot.track else {
            return Ok(());
        };
        let previous_id = previous.as_ref().and_then(|p| p.track_id());
        if previous_id != Some(track.id.as_str()) {
            self.on_new_track(track.clone(), now).await?;
        }
        Ok(())
    }

    async fn on_new_track(&self, mut track: Track, now: DateTime<Local>) -> Result<()> {
        if !track.id.is_empty() && self.service.genre_rules_active().await {
            match self.service.music().track_genres(&track.id).await {
                Ok(genres) => track.genres = genres,
                Err(e) => debug!("Genre lookup for '{}' failed: {}", track.name, e),
            }
        }

        let decision = self.service.check_track(&track).await;
        if !decision.allowed {
            let reason = decision.reason.unwrap_or_else(|| "Blocked by content filter".to_string());
            info!("Skipping blocked track '{}': {}", track.name, reason);
            self.service.publish(Event::TrackBlocked {
                track_name: track.name.clone(),
                reason,
                timestamp: Utc::now(),
            });

            if let Err(e) = self.service.music().next().await {
                warn!("Failed to skip blocked track: {}", e);
            }
            return Ok(());
        }

        debug!("Now playing '{}'", track.favorite_key());
        self.service.record_song_play(&track, now).await;
        Ok(())
    }
}

/// Progress alone does not count as a change
fn differs(a: &PlaybackSnapshot, b: &PlaybackSnapshot) -> bool {
    a.is_playing != b.is_playing
        || a.track_id() != b.track_id()
        || a.volume_percent != b.volume_percent
        || a.device_name != b.device_name
}
