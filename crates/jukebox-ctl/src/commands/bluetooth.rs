use anyhow::Result;
use jukebox_common::BluetoothDevice;
use jukebox_proto::api::{BluetoothAddressRequest, BluetoothDevicesResponse, ScanRequest};

use crate::client::ApiClient;

pub async fn list(client: &ApiClient) -> Result<()> {
    let response: BluetoothDevicesResponse = client.get("/admin/bluetooth/devices").await?;
    print_devices(&response.devices);
    Ok(())
}

pub async fn scan(client: &ApiClient, duration_secs: Option<u64>) -> Result<()> {
    println!("Scanning for Bluetooth devices...");
    let response: BluetoothDevicesResponse =
        client.post("/admin/bluetooth/scan", &ScanRequest { duration_secs }).await?;
    print_devices(&response.devices);
    Ok(())
}

/// pair, connect, disconnect or remove
pub async fn device_action(client: &ApiClient, action: &str, address: &str) -> Result<()> {
    let request = BluetoothAddressRequest { address: address.to_string() };
    client.post_action(&format!("/admin/bluetooth/{}", action), &request).await?;
    println!("OK: {} {}", action, address);
    Ok(())
}

fn print_devices(devices: &[BluetoothDevice]) {
    if devices.is_empty() {
        println!("No devices found");
        return;
    }

    for device in devices {
        let mut flags = Vec::new();
        if device.paired {
            flags.push("paired");
        }
        if device.trusted {
            flags.push("trusted");
        }
        if device.connected {
            flags.push("connected");
        }
        println!("  {}  {:<28} {}", device.address, device.name, flags.join(", "));
    }
}
