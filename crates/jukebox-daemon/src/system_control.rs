use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use jukebox_proto::api::{CommandReport, PlayerConfigRequest, RepairCommand};
use notify_rust::{Notification as SystemNotification, Timeout, Urgency};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bluetooth::BluetoothControl;
use crate::command::{CommandOutput, CommandRunner};
use crate::config::{PlayerConfig, SystemConfig};

const SYSTEMCTL_TIMEOUT: Duration = Duration::from_secs(15);
const APT_TIMEOUT: Duration = Duration::from_secs(600);
const IPTABLES_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on `-D` repetitions when clearing duplicated rules
const MAX_RULE_COPIES: usize = 16;
const APP_NAME: &str = "Family Jukebox";

/// How insistent a desktop notification is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Listening time is about to run out
    Warning,
    /// Playback was stopped
    Blocked,
}

impl NotificationLevel {
    fn urgency(self) -> Urgency {
        match self {
            NotificationLevel::Warning => Urgency::Normal,
            NotificationLevel::Blocked => Urgency::Critical,
        }
    }

    fn timeout(self) -> Timeout {
        match self {
            NotificationLevel::Warning => Timeout::Milliseconds(8000),
            NotificationLevel::Blocked => Timeout::Milliseconds(15000),
        }
    }

    fn icon(self) -> &'static str {
        match self {
            NotificationLevel::Warning => "appointment-soon",
            NotificationLevel::Blocked => "dialog-warning",
        }
    }
}

/// Something that executes `iptables` with the given arguments
#[async_trait]
trait RuleTable: Send + Sync {
    async fn iptables(&self, args: &[&str]) -> Result<CommandOutput>;
}

#[async_trait]
impl RuleTable for CommandRunner {
    async fn iptables(&self, args: &[&str]) -> Result<CommandOutput> {
        self.run("iptables", args, IPTABLES_TIMEOUT).await
    }
}

/// OS integration for the kiosk: player service, bluetooth, updates, network
/// lockdown and desktop notifications.
pub struct SystemControl {
    runner: CommandRunner,
    bluetooth: BluetoothControl,
    player_service: String,
    player_config_path: PathBuf,
    kiosk_user: String,
}

/// spotifyd configuration file layout
#[derive(Debug, Serialize)]
struct SpotifydFile {
    global: SpotifydGlobal,
}

#[derive(Debug, Serialize)]
struct SpotifydGlobal {
    device_name: String,
    bitrate: u16,
    backend: String,
    device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    initial_volume: Option<String>,
    volume_normalisation: bool,
}

impl SystemControl {
    pub fn new(system: &SystemConfig, player: &PlayerConfig) -> Self {
        info!("Initializing system control (dry_run: {})", system.dry_run);
        let runner = CommandRunner::new(system.dry_run);
        Self {
            bluetooth: BluetoothControl::new(runner.clone()),
            runner,
            player_service: player.service_name.clone(),
            player_config_path: PathBuf::from(&player.config_path),
            kiosk_user: system.kiosk_user.trim().to_string(),
        }
    }

    pub fn bluetooth(&self) -> &BluetoothControl {
        &self.bluetooth
    }

    pub fn is_dry_run(&self) -> bool {
        self.runner.is_dry_run()
    }

    pub async fn repair(&self, command: RepairCommand) -> Result<CommandReport> {
        info!("Running repair command: {}", command);

        let (program, args): (&str, Vec<&str>) = match command {
            RepairCommand::RestartPlayer => {
                ("systemctl", vec!["restart", self.player_service.as_str()])
            }
            RepairCommand::RestartBluetooth => ("systemctl", vec!["restart", "bluetooth"]),
            RepairCommand::RestartNetwork => ("systemctl", vec!["restart", "NetworkManager"]),
            RepairCommand::Reboot => ("systemctl", vec!["reboot"]),
        };

        let output = self.runner.run(program, &args, SYSTEMCTL_TIMEOUT).await?;
        Ok(report(&command.to_string(), &output))
    }

    pub async fn restart_player(&self) -> Result<()> {
        self.runner
            .run_checked("systemctl", &["restart", self.player_service.as_str()], SYSTEMCTL_TIMEOUT)
            .await?;
        Ok(())
    }

    /// `apt-get update` followed by a non-interactive upgrade
    pub async fn update_system(&self) -> Result<CommandReport> {
        info!("Starting system update");

        let update = self.runner.run("apt-get", &["update"], APT_TIMEOUT).await?;
        if !update.success {
            return Ok(report("apt-get update", &update));
        }

        let upgrade = self.runner.run("apt-get", &["upgrade", "-y"], APT_TIMEOUT).await?;
        let mut result = report("apt-get upgrade -y", &upgrade);
        result.output = format!("{}\n{}", update.combined(), result.output).trim().to_string();

        info!("System update finished (success: {})", result.success);
        Ok(result)
    }

    /// Reject outbound traffic from the kiosk user except DNS, HTTPS and
    /// loopback, or remove those rules again. Safe to repeat in either direction.
    pub async fn set_internet_lockdown(&self, enabled: bool) -> Result<CommandReport> {
        info!("Setting internet lockdown for user {}: {}", self.kiosk_user, enabled);

        let (success, outputs) =
            apply_lockdown(&self.runner, &self.kiosk_user, enabled, self.runner.is_dry_run())
                .await?;

        Ok(CommandReport {
            command: format!("internet_lockdown={}", enabled),
            success,
            output: outputs.into_iter().filter(|o| !o.is_empty()).collect::<Vec<_>>().join("\n"),
        })
    }

    /// Best effort, failures are logged
    pub async fn notify_user(&self, title: &str, message: &str, level: NotificationLevel) {
        info!("Sending notification: {} - {}", title, message);

        if self.runner.is_dry_run() {
            warn!("DRY RUN: Would show {:?} notification '{}'", level, title);
            return;
        }

        let mut notification = SystemNotification::new();
        notification
            .appname(APP_NAME)
            .summary(title)
            .body(message)
            .icon(level.icon())
            .urgency(level.urgency())
            .timeout(level.timeout());

        let shown = tokio::task::spawn_blocking(move || {
            notification.show().map(|_| ()).map_err(|e| e.to_string())
        })
        .await;

        match shown {
            Ok(Ok(())) => debug!("Notification sent successfully"),
            Ok(Err(e)) => warn!("Failed to send notification: {}", e),
            Err(e) => warn!("Notification task failed: {}", e),
        }
    }

    /// Rewrite the spotifyd config and restart the player
    pub async fn write_player_config(
        &self,
        request: &PlayerConfigRequest,
    ) -> Result<CommandReport> {
        let content = render_spotifyd_config(request)?;

        if self.runner.is_dry_run() {
            warn!("DRY RUN: Would write {:?}:\n{}", self.player_config_path, content);
        } else {
            if let Some(parent) = self.player_config_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            tokio::fs::write(&self.player_config_path, &content)
                .await
                .with_context(|| format!("Failed to write {:?}", self.player_config_path))?;
            info!("Wrote player config to {:?}", self.player_config_path);
        }

        let output = self
            .runner
            .run("systemctl", &["restart", self.player_service.as_str()], SYSTEMCTL_TIMEOUT)
            .await?;
        Ok(report("restart player", &output))
    }
}

fn report(command: &str, output: &CommandOutput) -> CommandReport {
    CommandReport {
        command: command.to_string(),
        success: output.success,
        output: output.combined(),
    }
}

/// Append each rule unless `-C` finds it, or delete every copy of it.
/// Returns overall success and the collected command output.
async fn apply_lockdown<T: RuleTable>(
    table: &T,
    user: &str,
    enabled: bool,
    dry_run: bool,
) -> Result<(bool, Vec<String>)> {
    let mut outputs = Vec::new();
    let mut success = true;

    for rule in &lockdown_rules(user) {
        if enabled {
            if !dry_run && table.iptables(&rule_args("-C", rule)).await?.success {
                debug!("Lockdown rule already installed: {}", rule.join(" "));
                continue;
            }
            let output = table.iptables(&rule_args("-A", rule)).await?;
            success &= output.success;
            outputs.push(output.combined());
        } else {
            // A failing -D means no copy is left, which is not an error
            for _ in 0..MAX_RULE_COPIES {
                let output = table.iptables(&rule_args("-D", rule)).await?;
                if !output.success {
                    break;
                }
                outputs.push(output.combined());
                if dry_run {
                    break;
                }
            }
        }
    }

    Ok((success, outputs))
}

fn rule_args<'a>(action: &'a str, rule: &[&'a str]) -> Vec<&'a str> {
    let mut args = vec![action, "OUTPUT"];
    args.extend_from_slice(rule);
    args
}

fn lockdown_rules(user: &str) -> Vec<Vec<&str>> {
    vec![
        vec!["-m", "owner", "--uid-owner", user, "-p", "udp", "--dport", "53", "-j", "ACCEPT"],
        vec!["-m", "owner", "--uid-owner", user, "-p", "tcp", "--dport", "443", "-j", "ACCEPT"],
        vec!["-m", "owner", "--uid-owner", user, "-o", "lo", "-j", "ACCEPT"],
        vec!["-m", "owner", "--uid-owner", user, "-j", "REJECT"],
    ]
}

pub fn render_spotifyd_config(request: &PlayerConfigRequest) -> Result<String> {
    let device_name = request.device_name.trim();
    if device_name.is_empty() {
        anyhow::bail!("Device name must not be empty");
    }
    if ![96, 160, 320].contains(&request.bitrate) {
        anyhow::bail!("Bitrate must be one of 96, 160 or 320");
    }
    if matches!(request.initial_volume, Some(v) if v > 100) {
        anyhow::bail!("Initial volume must be between 0 and 100");
    }

    let file = SpotifydFile {
        global: SpotifydGlobal {
            device_name: device_name.to_string(),
            bitrate: request.bitrate,
            backend: "alsa".to_string(),
            device_type: "speaker".to_string(),
            initial_volume: request.initial_volume.map(|v| v.to_string()),
            volume_normalisation: true,
        },
    };
    toml::to_string_pretty(&file).context("Failed to render player configuration")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// In-memory OUTPUT chain that answers `-C`, `-A` and `-D` like iptables
    #[derive(Default)]
    struct FakeTable {
        rules: Mutex<Vec<Vec<String>>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeTable {
        fn installed(&self) -> usize {
            self.rules.lock().unwrap().len()
        }

        fn actions(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|c| c[0].clone()).collect()
        }
    }

    #[async_trait]
    impl RuleTable for FakeTable {
        async fn iptables(&self, args: &[&str]) -> Result<CommandOutput> {
            let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            self.calls.lock().unwrap().push(args.clone());

            let rule = args[1..].to_vec();
            let mut rules = self.rules.lock().unwrap();
            let position = rules.iter().position(|r| *r == rule);
            let success = match args[0].as_str() {
                "-C" => position.is_some(),
                "-A" => {
                    rules.push(rule);
                    true
                }
                "-D" => match position {
                    Some(index) => {
                        rules.remove(index);
                        true
                    }
                    None => false,
                },
                other => panic!("unexpected iptables action {}", other),
            };
            Ok(CommandOutput { success, stdout: String::new(), stderr: String::new() })
        }
    }

    fn dry_run_control() -> SystemControl {
        SystemControl::new(
            &SystemConfig { dry_run: true, kiosk_user: "kiosk".to_string() },
            &PlayerConfig::default(),
        )
    }

    #[test]
    fn test_render_spotifyd_config() {
        let request = PlayerConfigRequest {
            device_name: "Kids Room".to_string(),
            bitrate: 320,
            initial_volume: Some(40),
        };
        let content = render_spotifyd_config(&request).unwrap();

        assert!(content.contains("[global]"));
        assert!(content.contains("device_name = \"Kids Room\""));
        assert!(content.contains("bitrate = 320"));
        assert!(content.contains("initial_volume = \"40\""));
    }

    #[test]
    fn test_render_rejects_bad_bitrate() {
        let request = PlayerConfigRequest {
            device_name: "x".to_string(),
            bitrate: 128,
            initial_volume: None,
        };
        assert!(render_spotifyd_config(&request).is_err());
    }

    #[test]
    fn test_lockdown_rules_target_user() {
        let rules = lockdown_rules("kiosk");
        assert_eq!(rules.len(), 4);
        assert!(rules.iter().all(|r| r.contains(&"kiosk")));
        assert_eq!(rules.last().unwrap().last(), Some(&"REJECT"));
    }

    #[test]
    fn test_rule_args_target_output_chain() {
        let rule = ["-m", "owner", "--uid-owner", "kiosk", "-j", "REJECT"];
        assert_eq!(
            rule_args("-C", &rule),
            vec!["-C", "OUTPUT", "-m", "owner", "--uid-owner", "kiosk", "-j", "REJECT"]
        );
    }

    #[tokio::test]
    async fn test_lockdown_enable_twice_then_disable() {
        let table = FakeTable::default();

        let (success, _) = apply_lockdown(&table, "kiosk", true, false).await.unwrap();
        assert!(success);
        assert_eq!(table.installed(), 4);

        table.calls.lock().unwrap().clear();
        let (success, _) = apply_lockdown(&table, "kiosk", true, false).await.unwrap();
        assert!(success);
        assert_eq!(table.installed(), 4);
        assert!(table.actions().iter().all(|a| a == "-C"));

        let (success, _) = apply_lockdown(&table, "kiosk", false, false).await.unwrap();
        assert!(success);
        assert_eq!(table.installed(), 0);
    }

    #[tokio::test]
    async fn test_lockdown_disable_removes_duplicate_rules() {
        let table = FakeTable::default();
        for rule in lockdown_rules("kiosk") {
            let copy: Vec<String> =
                rule_args("-A", &rule)[1..].iter().map(|a| a.to_string()).collect();
            table.rules.lock().unwrap().extend([copy.clone(), copy]);
        }
        assert_eq!(table.installed(), 8);

        apply_lockdown(&table, "kiosk", false, false).await.unwrap();
        assert_eq!(table.installed(), 0);
    }

    #[test]
    fn test_notification_levels() {
        assert_eq!(NotificationLevel::Warning.urgency(), Urgency::Normal);
        assert_eq!(NotificationLevel::Blocked.urgency(), Urgency::Critical);
        assert_eq!(NotificationLevel::Warning.timeout(), Timeout::Milliseconds(8000));
        assert_eq!(NotificationLevel::Blocked.timeout(), Timeout::Milliseconds(15000));
    }

    #[tokio::test]
    async fn test_dry_run_repair_reports_success() {
        let control = dry_run_control();
        let report = control.repair(RepairCommand::RestartPlayer).await.unwrap();
        assert!(report.success);
        assert_eq!(report.command, "restart_player");
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write_player_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spotifyd.conf");
        let player = PlayerConfig {
            config_path: path.to_string_lossy().to_string(),
            ..Default::default()
        };
        let control = SystemControl::new(
            &SystemConfig { dry_run: true, kiosk_user: "kiosk".to_string() },
            &player,
        );

        let request = PlayerConfigRequest {
            device_name: "Jukebox".to_string(),
            bitrate: 160,
            initial_volume: None,
        };
        assert!(control.write_player_config(&request).await.unwrap().success);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_dry_run_lockdown_and_update() {
        let control = dry_run_control();
        assert!(control.set_internet_lockdown(true).await.unwrap().success);
        assert!(control.update_system().await.unwrap().success);
        assert!(control.set_internet_lockdown(false).await.unwrap().success);
        control.notify_user("Title", "Body", NotificationLevel::Blocked).await;
    }
}
