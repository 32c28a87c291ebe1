use anyhow::Result;
use clap::ValueEnum;
use jukebox_proto::api::{
    CommandReport, LockdownRequest, PlayerConfigRequest, RepairCommand, RepairRequest,
};

use crate::client::ApiClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RepairTarget {
    Player,
    Bluetooth,
    Network,
    Reboot,
}

impl From<RepairTarget> for RepairCommand {
    fn from(target: RepairTarget) -> Self {
        match target {
            RepairTarget::Player => RepairCommand::RestartPlayer,
            RepairTarget::Bluetooth => RepairCommand::RestartBluetooth,
            RepairTarget::Network => RepairCommand::RestartNetwork,
            RepairTarget::Reboot => RepairCommand::Reboot,
        }
    }
}

pub async fn repair(client: &ApiClient, target: RepairTarget) -> Result<()> {
    let request = RepairRequest { command: target.into() };
    let report: CommandReport = client.post("/admin/system/repair", &request).await?;
    print_report(&report);
    Ok(())
}

pub async fn update(client: &ApiClient) -> Result<()> {
    println!("Updating system packages, this can take a few minutes...");
    let report: CommandReport = client.post("/admin/system/update", &serde_json::json!({})).await?;
    print_report(&report);
    Ok(())
}

pub async fn lockdown(client: &ApiClient, enabled: bool) -> Result<()> {
    let report: CommandReport =
        client.post("/admin/system/lockdown", &LockdownRequest { enabled }).await?;
    print_report(&report);
    Ok(())
}

pub async fn player_config(
    client: &ApiClient,
    device_name: &str,
    bitrate: u16,
    initial_volume: Option<u8>,
) -> Result<()> {
    let request =
        PlayerConfigRequest { device_name: device_name.to_string(), bitrate, initial_volume };
    let report: CommandReport = client.post("/admin/player-config", &request).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &CommandReport) {
    let outcome = if report.success { "succeeded" } else { "FAILED" };
    println!("{} {}", report.command, outcome);
    if !report.output.trim().is_empty() {
        println!();
        println!("{}", report.output.trim_end());
    }
}
