use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use jukebox_proto::Event;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::service::KioskService;
use crate::system_control::NotificationLevel;

/// Periodic schedule and time-limit enforcement
pub struct ListeningEnforcementTask {
    service: Arc<KioskService>,
    warning_minutes: u32,
    last_warning_sent: RwLock<bool>,
    blocked: RwLock<bool>,
}

impl ListeningEnforcementTask {
    pub fn new(service: Arc<KioskService>, warning_minutes: u32) -> Self {
        Self {
            service,
            warning_minutes,
            last_warning_sent: RwLock::new(false),
            blocked: RwLock::new(false),
        }
    }

    pub fn spawn(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            info!("Listening enforcement started ({:?} interval)", period);

            loop {
                ticker.tick().await;
                if let Err(e) = self.check_and_enforce(Local::now()).await {
                    warn!("Listening enforcement error: {:#}", e);
                }
            }
        })
    }

    /// Run one iteration of the enforcement check
    pub async fn check_and_enforce(&self, now: DateTime<Local>) -> Result<()> {
        let decision = self.service.evaluate(now).await;

        if decision.allowed {
            let mut blocked = self.blocked.write().await;
            if *blocked {
                info!("Listening allowed again");
                *blocked = false;
            }
            drop(blocked);

            match self.service.upcoming_warning(now, self.warning_minutes).await {
                Some(message) => {
                    let mut warning_sent = self.last_warning_sent.write().await;
                    if !*warning_sent {
                        self.send_warning(&message).await;
                        *warning_sent = true;
                    }
                }
                None => *self.last_warning_sent.write().await = false,
            }
            return Ok(());
        }

        let reason =
            decision.reason.unwrap_or_else(|| "Listening is not allowed right now".to_string());

        if self.service.is_playing().await {
            warn!("Stopping playback: {}", reason);
            self.service.music().pause().await.context("Failed to pause playback")?;
            let event = Event::listening_blocked(reason.clone(), decision.next_window.clone());
            self.service.publish(event);
        }

        if self.service.finish_session(now).await.is_some() {
            debug!("Closed listening session after block");
        }

        let mut blocked = self.blocked.write().await;
        if !*blocked {
            self.send_block_notification(&reason, decision.next_window.as_deref()).await;
            *blocked = true;
        }
        Ok(())
    }

    async fn send_warning(&self, message: &str) {
        info!("Sending listening time warning: {}", message);
        self.service.publish(Event::TimeLimitWarning {
            message: message.to_string(),
            timestamp: Utc::now(),
        });
        self.service
            .system()
            .notify_user("Music time ending soon", message, NotificationLevel::Warning)
            .await;
    }

    async fn send_block_notification(&self, reason: &str, next_window: Option<&str>) {
        let message = match next_window {
            Some(next) => format!("{}\n\nMusic is back at {}", reason, next),
            None => reason.to_string(),
        };
        self.service
            .system()
            .notify_user("Music time is over", &message, NotificationLevel::Blocked)
            .await;
    }
}
