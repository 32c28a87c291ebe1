mod common;

use chrono::{Duration, Local};
use jukebox_common::{ListeningLimits, ParentalConfig, ScheduleConfig};
use jukebox_daemon::enforcement_task::ListeningEnforcementTask;
use jukebox_daemon::poller::PlaybackPoller;
use jukebox_proto::Event;

use common::{paused, playing, track, Harness, MockMusic};

#[tokio::test]
async fn test_play_and_pause_open_and_close_sessions() {
    let harness = Harness::new();
    let poller = PlaybackPoller::new(harness.service.clone());
    let mut events = harness.service.subscribe();
    let start = Local::now();

    poller.apply(playing(track("t1", "Song One", "Band")), start).await.unwrap();
    assert!(harness.service.has_open_session().await);

    poller
        .apply(paused(track("t1", "Song One", "Band")), start + Duration::minutes(3))
        .await
        .unwrap();
    assert!(!harness.service.has_open_session().await);

    let report = harness.service.usage_report(start + Duration::minutes(3)).await;
    assert_eq!(report.sessions_today.len(), 1);
    assert_eq!(report.top_favorites[0].title, "Song One - Band");

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(serde_json::to_value(&event).unwrap()["type"].as_str().unwrap().to_string());
    }
    assert!(kinds.contains(&"playback_changed".to_string()));
    assert!(kinds.contains(&"session_started".to_string()));
    assert!(kinds.contains(&"session_ended".to_string()));
}

#[tokio::test]
async fn test_track_change_counts_a_play_but_progress_does_not() {
    let harness = Harness::new();
    let poller = PlaybackPoller::new(harness.service.clone());
    let now = Local::now();

    poller.apply(playing(track("t1", "Song One", "Band")), now).await.unwrap();
    let mut later = playing(track("t1", "Song One", "Band"));
    later.progress_ms = 30_000;
    poller.apply(later, now).await.unwrap();
    poller.apply(playing(track("t2", "Song Two", "Band")), now).await.unwrap();

    let stats = harness.service.usage_report(now).await;
    let plays: u32 = stats.top_favorites.iter().map(|f| f.plays).sum();
    assert_eq!(plays, 2);
}

#[tokio::test]
async fn test_blocked_track_is_skipped() {
    let harness = Harness::new();
    let mut config = ParentalConfig::default();
    config.content_filter.blocked_artists.push("Bad Band".to_string());
    harness.service.update_parental_config(config).await.unwrap();

    let poller = PlaybackPoller::new(harness.service.clone());
    let mut events = harness.service.subscribe();
    poller.apply(playing(track("t9", "Loud", "Bad Band")), Local::now()).await.unwrap();

    assert_eq!(harness.music.count("next"), 1);
    let blocked = std::iter::from_fn(|| events.try_recv().ok())
        .any(|e| matches!(e, Event::TrackBlocked { ref track_name, .. } if track_name == "Loud"));
    assert!(blocked);

    // Not counted as a favorite
    let report = harness.service.usage_report(Local::now()).await;
    assert!(report.top_favorites.is_empty());
}

#[tokio::test]
async fn test_genre_rules_use_artist_genres() {
    let music = MockMusic::authorized();
    music.state.lock().unwrap().genres.insert("t5".to_string(), vec!["death metal".to_string()]);
    let harness = Harness::with_music(music);

    let mut config = ParentalConfig::default();
    config.content_filter.blocked_genres.push("Death Metal".to_string());
    harness.service.update_parental_config(config).await.unwrap();

    let poller = PlaybackPoller::new(harness.service.clone());
    poller.apply(playing(track("t5", "Growl", "Anyone")), Local::now()).await.unwrap();

    assert_eq!(harness.music.count("genres:t5"), 1);
    assert_eq!(harness.music.count("next"), 1);
}

#[tokio::test]
async fn test_poll_once_without_authorization_is_a_no_op() {
    let harness = Harness::with_music(MockMusic::default());
    let poller = PlaybackPoller::new(harness.service.clone());

    poller.poll_once(Local::now()).await.unwrap();
    assert!(harness.service.current_playback().await.is_none());
}

#[tokio::test]
async fn test_enforcement_pauses_when_daily_limit_reached() {
    let harness = Harness::new();
    let config = ParentalConfig {
        limits: ListeningLimits { daily_limit_minutes: 10, ..Default::default() },
        ..Default::default()
    };
    harness.service.update_parental_config(config).await.unwrap();

    let start = Local::now();
    let poller = PlaybackPoller::new(harness.service.clone());
    poller.apply(playing(track("t1", "Song One", "Band")), start).await.unwrap();

    let task = ListeningEnforcementTask::new(harness.service.clone(), 5);
    let mut events = harness.service.subscribe();

    task.check_and_enforce(start + Duration::minutes(2)).await.unwrap();
    assert_eq!(harness.music.count("pause"), 0);

    task.check_and_enforce(start + Duration::minutes(11)).await.unwrap();
    assert_eq!(harness.music.count("pause"), 1);
    assert!(!harness.service.has_open_session().await);

    let blocked = std::iter::from_fn(|| events.try_recv().ok())
        .any(|e| matches!(e, Event::ListeningBlocked { .. }));
    assert!(blocked);
}

#[tokio::test]
async fn test_enforcement_warns_once_before_limit() {
    let harness = Harness::new();
    let config = ParentalConfig {
        limits: ListeningLimits { daily_limit_minutes: 10, ..Default::default() },
        ..Default::default()
    };
    harness.service.update_parental_config(config).await.unwrap();

    let start = Local::now();
    let poller = PlaybackPoller::new(harness.service.clone());
    poller.apply(playing(track("t1", "Song One", "Band")), start).await.unwrap();

    let task = ListeningEnforcementTask::new(harness.service.clone(), 5);
    let mut events = harness.service.subscribe();

    task.check_and_enforce(start + Duration::minutes(6)).await.unwrap();
    task.check_and_enforce(start + Duration::minutes(7)).await.unwrap();

    let warnings = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, Event::TimeLimitWarning { .. }))
        .count();
    assert_eq!(warnings, 1);
}

#[tokio::test]
async fn test_enforcement_ignores_idle_player_outside_schedule() {
    let harness = Harness::new();
    let schedule = ScheduleConfig {
        enabled: true,
        weekday: Default::default(),
        weekend: Default::default(),
    };
    harness.service.update_schedule(schedule).await.unwrap();

    let task = ListeningEnforcementTask::new(harness.service.clone(), 5);
    task.check_and_enforce(Local::now()).await.unwrap();

    assert_eq!(harness.music.count("pause"), 0);
}

#[tokio::test]
async fn test_shutdown_closes_open_session() {
    let harness = Harness::new();
    let poller = PlaybackPoller::new(harness.service.clone());
    poller.apply(playing(track("t1", "Song One", "Band")), Local::now()).await.unwrap();

    harness.service.shutdown().await;
    assert!(!harness.service.has_open_session().await);
}
