use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use jukebox_proto::api::{
    BluetoothAddressRequest, BluetoothDevicesResponse, CommandReport, LockdownRequest,
    PlayerConfigRequest, RepairRequest, ScanRequest,
};
use tracing::info;

use super::{done, ok, ApiResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bluetooth/devices", get(bluetooth_devices))
        .route("/bluetooth/scan", post(bluetooth_scan))
        .route("/bluetooth/pair", post(bluetooth_pair))
        .route("/bluetooth/connect", post(bluetooth_connect))
        .route("/bluetooth/disconnect", post(bluetooth_disconnect))
        .route("/bluetooth/remove", post(bluetooth_remove))
        .route("/system/repair", post(repair))
        .route("/system/update", post(update))
        .route("/system/lockdown", post(lockdown))
        .route("/player-config", post(player_config))
}

pub async fn bluetooth_devices(
    State(service): State<AppState>,
) -> ApiResult<BluetoothDevicesResponse> {
    ok(service.bluetooth_devices().await?)
}

pub async fn bluetooth_scan(
    State(service): State<AppState>,
    request: Option<Json<ScanRequest>>,
) -> ApiResult<BluetoothDevicesResponse> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    info!("POST /api/admin/bluetooth/scan - {:?}s", request.duration_secs);
    ok(service.bluetooth_scan(request.duration_secs).await?)
}

pub async fn bluetooth_pair(
    State(service): State<AppState>,
    Json(request): Json<BluetoothAddressRequest>,
) -> ApiResult<()> {
    info!("POST /api/admin/bluetooth/pair - {}", request.address);
    service.bluetooth_pair(&request.address).await?;
    done()
}

pub async fn bluetooth_connect(
    State(service): State<AppState>,
    Json(request): Json<BluetoothAddressRequest>,
) -> ApiResult<()> {
    info!("POST /api/admin/bluetooth/connect - {}", request.address);
    service.bluetooth_connect(&request.address).await?;
    done()
}

pub async fn bluetooth_disconnect(
    State(service): State<AppState>,
    Json(request): Json<BluetoothAddressRequest>,
) -> ApiResult<()> {
    info!("POST /api/admin/bluetooth/disconnect - {}", request.address);
    service.bluetooth_disconnect(&request.address).await?;
    done()
}

pub async fn bluetooth_remove(
    State(service): State<AppState>,
    Json(request): Json<BluetoothAddressRequest>,
) -> ApiResult<()> {
    info!("POST /api/admin/bluetooth/remove - {}", request.address);
    service.bluetooth_remove(&request.address).await?;
    done()
}

pub async fn repair(
    State(service): State<AppState>,
    Json(request): Json<RepairRequest>,
) -> ApiResult<CommandReport> {
    info!("POST /api/admin/system/repair - {}", request.command);
    ok(service.repair(request.command).await?)
}

pub async fn update(State(service): State<AppState>) -> ApiResult<CommandReport> {
    info!("POST /api/admin/system/update");
    ok(service.update_system().await?)
}

pub async fn lockdown(
    State(service): State<AppState>,
    Json(request): Json<LockdownRequest>,
) -> ApiResult<CommandReport> {
    info!("POST /api/admin/system/lockdown - enabled: {}", request.enabled);
    ok(service.set_internet_lockdown(request.enabled).await?)
}

pub async fn player_config(
    State(service): State<AppState>,
    Json(request): Json<PlayerConfigRequest>,
) -> ApiResult<CommandReport> {
    info!("POST /api/admin/player-config - device: {}", request.device_name);
    ok(service.write_player_config(request).await?)
}
