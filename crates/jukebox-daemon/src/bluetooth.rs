// Bluetooth speaker management through `bluetoothctl`

use std::time::Duration;

use anyhow::{Context, Result};
use jukebox_common::BluetoothDevice;
use tracing::{debug, info, warn};

use crate::command::CommandRunner;

const BLUETOOTHCTL: &str = "bluetoothctl";
const QUICK_TIMEOUT: Duration = Duration::from_secs(10);
const PAIR_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SCAN_SECS: u64 = 10;
const MAX_SCAN_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct BluetoothControl {
    runner: CommandRunner,
}

impl BluetoothControl {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    /// Known devices with their paired/connected/trusted flags
    pub async fn list_devices(&self) -> Result<Vec<BluetoothDevice>> {
        let output = self.runner.run_checked(BLUETOOTHCTL, &["devices"], QUICK_TIMEOUT).await?;
        let mut devices = parse_device_list(&output.stdout);

        for device in &mut devices {
            match self.device_info(&device.address).await {
                Ok(info) => {
                    device.paired = info.paired;
                    device.connected = info.connected;
                    device.trusted = info.trusted;
                }
                Err(e) => debug!("No info for {}: {}", device.address, e),
            }
        }

        debug!("Found {} bluetooth devices", devices.len());
        Ok(devices)
    }

    /// Discover nearby devices for `secs` seconds, then list everything known
    pub async fn scan(&self, secs: u64) -> Result<Vec<BluetoothDevice>> {
        let secs = secs.clamp(1, MAX_SCAN_SECS);
        info!("Scanning for bluetooth devices for {}s", secs);

        let timeout_arg = secs.to_string();
        self.runner
            .run(
                BLUETOOTHCTL,
                &["--timeout", &timeout_arg, "scan", "on"],
                Duration::from_secs(secs + 5),
            )
            .await
            .context("Bluetooth scan failed")?;

        self.list_devices().await
    }

    pub async fn pair(&self, address: &str) -> Result<()> {
        validate_address(address)?;
        info!("Pairing bluetooth device {}", address);

        self.runner.run_checked(BLUETOOTHCTL, &["pair", address], PAIR_TIMEOUT).await?;
        // Trusted devices reconnect on their own after a reboot
        let trust_args = ["trust", address];
        if let Err(e) = self.runner.run_checked(BLUETOOTHCTL, &trust_args, QUICK_TIMEOUT).await {
            warn!("Paired {} but failed to trust it: {}", address, e);
        }
        Ok(())
    }

    pub async fn connect(&self, address: &str) -> Result<()> {
        validate_address(address)?;
        info!("Connecting bluetooth device {}", address);
        self.runner.run_checked(BLUETOOTHCTL, &["connect", address], PAIR_TIMEOUT).await?;
        Ok(())
    }

    pub async fn disconnect(&self, address: &str) -> Result<()> {
        validate_address(address)?;
        info!("Disconnecting bluetooth device {}", address);
        self.runner.run_checked(BLUETOOTHCTL, &["disconnect", address], QUICK_TIMEOUT).await?;
        Ok(())
    }

    pub async fn remove(&self, address: &str) -> Result<()> {
        validate_address(address)?;
        info!("Removing bluetooth device {}", address);
        self.runner.run_checked(BLUETOOTHCTL, &["remove", address], QUICK_TIMEOUT).await?;
        Ok(())
    }

    pub async fn device_info(&self, address: &str) -> Result<BluetoothDevice> {
        validate_address(address)?;
        let output =
            self.runner.run_checked(BLUETOOTHCTL, &["info", address], QUICK_TIMEOUT).await?;
        Ok(parse_device_info(address, &output.stdout))
    }
}

/// Parse `bluetoothctl devices` lines of the form `Device <MAC> <name>`
pub fn parse_device_list(output: &str) -> Vec<BluetoothDevice> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("Device ")?;
            let (address, name) = match rest.split_once(' ') {
                Some((address, name)) => (address, name.trim()),
                None => (rest, ""),
            };
            if !is_valid_address(address) {
                return None;
            }
            Some(BluetoothDevice {
                address: address.to_uppercase(),
                name: if name.is_empty() { address.to_string() } else { name.to_string() },
                paired: false,
                connected: false,
                trusted: false,
            })
        })
        .collect()
}

/// Parse the indented `Key: value` block printed by `bluetoothctl info`
pub fn parse_device_info(address: &str, output: &str) -> BluetoothDevice {
    let mut device = BluetoothDevice {
        address: address.to_uppercase(),
        name: address.to_string(),
        paired: false,
        connected: false,
        trusted: false,
    };

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "Name" => device.name = value.to_string(),
            "Alias" if device.name == address => device.name = value.to_string(),
            "Paired" => device.paired = value == "yes",
            "Connected" => device.connected = value == "yes",
            "Trusted" => device.trusted = value == "yes",
            _ => {}
        }
    }

    device
}

pub fn is_valid_address(address: &str) -> bool {
    let parts: Vec<&str> = address.split(':').collect();
    parts.len() == 6
        && parts.iter().all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

pub fn validate_address(address: &str) -> Result<()> {
    if !is_valid_address(address) {
        anyhow::bail!("Invalid bluetooth address: {}", address);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_list() {
        let output = "Device 00:1A:7D:DA:71:13 JBL Flip 5\n\
                      Device AA:BB:CC:DD:EE:FF\n\
                      [CHG] Controller 11:22:33:44:55:66 Discovering: yes\n\
                      Device not-a-mac Broken\n";
        let devices = parse_device_list(output);

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].address, "00:1A:7D:DA:71:13");
        assert_eq!(devices[0].name, "JBL Flip 5");
        assert_eq!(devices[1].name, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_parse_device_info() {
        let output = "Device 00:1A:7D:DA:71:13 (public)\n\
                      \tName: JBL Flip 5\n\
                      \tAlias: Kitchen speaker\n\
                      \tPaired: yes\n\
                      \tTrusted: yes\n\
                      \tConnected: no\n\
                      \tUUID: Audio Sink (0000110b-0000-1000-8000-00805f9b34fb)\n";
        let device = parse_device_info("00:1A:7D:DA:71:13", output);

        assert_eq!(device.name, "JBL Flip 5");
        assert!(device.paired);
        assert!(device.trusted);
        assert!(!device.connected);
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("00:1a:7D:da:71:13"));
        assert!(!is_valid_address("00:1A:7D:DA:71"));
        assert!(!is_valid_address("00:1A:7D:DA:71:1G"));
        assert!(!is_valid_address("00:1A:7D:DA:71:13; rm -rf /"));
    }

    #[tokio::test]
    async fn test_dry_run_operations_succeed() {
        let bluetooth = BluetoothControl::new(CommandRunner::new(true));
        assert!(bluetooth.connect("00:1A:7D:DA:71:13").await.is_ok());
        assert!(bluetooth.list_devices().await.unwrap().is_empty());
        assert!(bluetooth.pair("bogus").await.is_err());
    }
}
