use chrono::{DateTime, Utc};
use jukebox_common::{
    BluetoothDevice, ListeningDecision, PlaybackSnapshot, Redemption, Reward, Track,
};
use serde::{Deserialize, Serialize};

/// Envelope wrapped around every REST response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(message.into()) }
    }

    /// Unwrap the envelope into a plain result
    pub fn into_result(self) -> Result<Option<T>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.error.unwrap_or_else(|| "unknown error".to_string()))
        }
    }
}

impl ApiResponse<()> {
    pub fn empty() -> Self {
        Self { success: true, data: None, error: None }
    }
}

// ============================================================================
// Status and player
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub spotify_authorized: bool,
    pub playback: Option<PlaybackSnapshot>,
    pub listening: ListeningDecision,
    pub remaining_minutes: Option<f64>,
    pub within_schedule: bool,
    pub points: f64,
    pub rewards_enabled: bool,
    /// False until a parent password has been set
    pub admin_configured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRequest {
    pub volume_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeResponse {
    /// Volume actually applied after the parental cap
    pub volume_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayTrackRequest {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub tracks: Vec<Track>,
    /// Results dropped by the content filter
    pub filtered_out: usize,
}

// ============================================================================
// Rewards
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardsResponse {
    pub enabled: bool,
    pub points: f64,
    pub rewards_available: Vec<Reward>,
    pub redeemed_today: Vec<Redemption>,
    pub points_per_minute: f64,
    pub daily_login_bonus: f64,
    pub no_skip_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemResponse {
    pub redemption: Redemption,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustPointsRequest {
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsResponse {
    pub points: f64,
}

// ============================================================================
// Admin authentication
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Spotify
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyStatus {
    pub configured: bool,
    pub authorized: bool,
    pub client_id: Option<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeUrlResponse {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyDevice {
    pub id: Option<String>,
    pub name: String,
    pub device_type: String,
    pub is_active: bool,
    pub volume_percent: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyDevicesResponse {
    pub devices: Vec<SpotifyDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPlaybackRequest {
    pub device_id: String,
}

/// Query string Spotify appends to the OAuth redirect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// ============================================================================
// Bluetooth and system
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BluetoothDevicesResponse {
    pub devices: Vec<BluetoothDevice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BluetoothAddressRequest {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScanRequest {
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairCommand {
    RestartPlayer,
    RestartBluetooth,
    RestartNetwork,
    Reboot,
}

impl std::fmt::Display for RepairCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RepairCommand::RestartPlayer => "restart_player",
            RepairCommand::RestartBluetooth => "restart_bluetooth",
            RepairCommand::RestartNetwork => "restart_network",
            RepairCommand::Reboot => "reboot",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairRequest {
    pub command: RepairCommand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockdownRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfigRequest {
    pub device_name: String,
    pub bitrate: u16,
    #[serde(default)]
    pub initial_volume: Option<u8>,
}

/// Outcome of an OS command run on the parent's behalf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReport {
    pub command: String,
    pub success: bool,
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_omits_data() {
        let response: ApiResponse<()> = ApiResponse::err("Daily listening limit reached");
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"Daily listening limit reached"}"#);
    }

    #[test]
    fn test_envelope_without_data_parses() {
        let parsed: ApiResponse<PointsResponse> =
            serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(parsed.into_result(), Ok(None));

        let failed: ApiResponse<PointsResponse> =
            serde_json::from_str(r#"{"success":false,"error":"nope"}"#).unwrap();
        assert_eq!(failed.into_result(), Err("nope".to_string()));
    }

    #[test]
    fn test_repair_command_wire_names() {
        let request: RepairRequest =
            serde_json::from_str(r#"{"command":"restart_bluetooth"}"#).unwrap();
        assert_eq!(request.command, RepairCommand::RestartBluetooth);
        assert_eq!(request.command.to_string(), "restart_bluetooth");
        assert!(serde_json::from_str::<RepairRequest>(r#"{"command":"format_disk"}"#).is_err());
    }

    #[test]
    fn test_spotify_credentials_redirect_optional() {
        let creds: SpotifyCredentials =
            serde_json::from_str(r#"{"client_id":"abc","client_secret":"xyz"}"#).unwrap();
        assert!(creds.redirect_uri.is_none());
    }
}
