use anyhow::Result;
use clap::{Parser, Subcommand};
use jukebox_common::Reward;
use tracing_subscriber::EnvFilter;

mod auth;
mod client;
mod commands;

use client::{ApiClient, DEFAULT_URL};
use commands::limits::{LimitChanges, ListKind};
use commands::rewards::RewardKind;
use commands::schedule::DayKind;
use commands::system::RepairTarget;

#[derive(Parser)]
#[command(name = "jukebox-ctl")]
#[command(about = "Family Jukebox parent control tool", long_about = None)]
struct Cli {
    #[arg(long, global = true, env = "JUKEBOX_URL", default_value = DEFAULT_URL)]
    url: String,

    #[arg(long, global = true, env = "JUKEBOX_TOKEN", help = "Admin session token")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listening status and what is playing
    Status,

    Player {
        #[command(subcommand)]
        action: PlayerAction,
    },

    Rewards {
        #[command(subcommand)]
        action: RewardsAction,
    },

    /// Set the parent password on a fresh install
    Setup,
    Login,
    Logout,
    Password,

    Usage {
        #[command(subcommand)]
        action: Option<UsageAction>,
    },

    Schedule {
        #[command(subcommand)]
        action: Option<ScheduleAction>,
    },

    /// Time limits, volume cap and content filter
    Limits {
        #[command(subcommand)]
        action: Option<LimitsAction>,
    },

    Spotify {
        #[command(subcommand)]
        action: SpotifyAction,
    },

    Bluetooth {
        #[command(subcommand)]
        action: BluetoothAction,
    },

    /// Restart a service or reboot the kiosk
    Repair {
        #[arg(value_enum)]
        target: RepairTarget,
    },

    /// Install OS updates
    Update,

    /// Restrict network traffic to Spotify while on
    Lockdown {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },

    /// Write the spotifyd configuration and restart the player
    PlayerConfig {
        device_name: String,
        #[arg(long, default_value_t = 320)]
        bitrate: u16,
        #[arg(long)]
        initial_volume: Option<u8>,
    },
}

#[derive(Subcommand)]
enum PlayerAction {
    Current,
    Play,
    Pause,
    Next,
    Previous,
    Volume {
        percent: u8,
    },
    Track {
        #[arg(help = "Spotify track URI, e.g. spotify:track:4uLU6hMCjMI75M1A2tKUQC")]
        uri: String,
    },
    Search {
        query: String,
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum RewardsAction {
    Show,
    Redeem {
        name: String,
    },
    Adjust {
        #[arg(allow_negative_numbers = true)]
        delta: f64,
    },
    Reset,
    Enable,
    Disable,
    Rates {
        #[arg(long)]
        per_minute: Option<f64>,
        #[arg(long)]
        daily_bonus: Option<f64>,
        #[arg(long)]
        no_skip_bonus: Option<f64>,
    },
    Add {
        name: String,
        #[arg(long)]
        cost: u32,
        #[arg(long, value_enum)]
        kind: RewardKind,
        #[arg(long, default_value_t = 0)]
        value: u32,
    },
    Remove {
        name: String,
    },
}

#[derive(Subcommand)]
enum UsageAction {
    Show,
    Reset,
}

#[derive(Subcommand)]
enum ScheduleAction {
    Show,
    Enable,
    Disable,
    Set {
        #[arg(value_enum)]
        day: DayKind,
        name: String,
        start: String,
        end: String,
    },
    Remove {
        #[arg(value_enum)]
        day: DayKind,
        name: String,
    },
}

#[derive(Subcommand)]
enum LimitsAction {
    Show,
    Set(LimitChanges),
    Block {
        #[arg(value_enum)]
        kind: ListKind,
        value: String,
    },
    Unblock {
        #[arg(value_enum)]
        kind: ListKind,
        value: String,
    },
}

#[derive(Subcommand)]
enum SpotifyAction {
    Status,
    Configure {
        client_id: String,
        client_secret: String,
        #[arg(long)]
        redirect_uri: Option<String>,
    },
    Authorize,
    Devices,
    Transfer {
        device_id: String,
    },
}

#[derive(Subcommand)]
enum BluetoothAction {
    List,
    Scan {
        #[arg(long)]
        seconds: Option<u64>,
    },
    Pair {
        address: String,
    },
    Connect {
        address: String,
    },
    Disconnect {
        address: String,
    },
    Remove {
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut client = ApiClient::new(&cli.url)?.with_token(cli.token);

    if needs_admin(&cli.command) {
        auth::require_auth(&mut client).await?;
    }

    run(cli.command, &mut client).await
}

fn needs_admin(command: &Commands) -> bool {
    match command {
        Commands::Status
        | Commands::Player { .. }
        | Commands::Setup
        | Commands::Login
        | Commands::Logout
        | Commands::Password => false,
        Commands::Rewards { action } => {
            !matches!(action, RewardsAction::Show | RewardsAction::Redeem { .. })
        }
        _ => true,
    }
}

async fn run(command: Commands, client: &mut ApiClient) -> Result<()> {
    match command {
        Commands::Status => commands::status::show(client).await?,
        Commands::Player { action } => match action {
            PlayerAction::Current => commands::player::current(client).await?,
            PlayerAction::Play => commands::player::transport(client, "play").await?,
            PlayerAction::Pause => commands::player::transport(client, "pause").await?,
            PlayerAction::Next => commands::player::transport(client, "next").await?,
            PlayerAction::Previous => commands::player::transport(client, "previous").await?,
            PlayerAction::Volume { percent } => commands::player::volume(client, percent).await?,
            PlayerAction::Track { uri } => commands::player::play_track(client, &uri).await?,
            PlayerAction::Search { query, limit } => {
                commands::player::search(client, &query, limit).await?
            }
        },
        Commands::Rewards { action } => rewards(client, action).await?,
        Commands::Setup => commands::account::setup(client).await?,
        Commands::Login => commands::account::login(client).await?,
        Commands::Logout => commands::account::logout(client).await?,
        Commands::Password => commands::account::change_password(client).await?,
        Commands::Usage { action } => match action.unwrap_or(UsageAction::Show) {
            UsageAction::Show => commands::usage::show(client).await?,
            UsageAction::Reset => commands::usage::reset(client).await?,
        },
        Commands::Schedule { action } => match action.unwrap_or(ScheduleAction::Show) {
            ScheduleAction::Show => commands::schedule::show(client).await?,
            ScheduleAction::Enable => commands::schedule::set_enabled(client, true).await?,
            ScheduleAction::Disable => commands::schedule::set_enabled(client, false).await?,
            ScheduleAction::Set { day, name, start, end } => {
                commands::schedule::set_window(client, day, &name, &start, &end).await?
            }
            ScheduleAction::Remove { day, name } => {
                commands::schedule::remove_window(client, day, &name).await?
            }
        },
        Commands::Limits { action } => match action.unwrap_or(LimitsAction::Show) {
            LimitsAction::Show => commands::limits::show(client).await?,
            LimitsAction::Set(changes) => commands::limits::set(client, &changes).await?,
            LimitsAction::Block { kind, value } => {
                commands::limits::edit_list(client, kind, &value, true).await?
            }
            LimitsAction::Unblock { kind, value } => {
                commands::limits::edit_list(client, kind, &value, false).await?
            }
        },
        Commands::Spotify { action } => match action {
            SpotifyAction::Status => commands::spotify::status(client).await?,
            SpotifyAction::Configure { client_id, client_secret, redirect_uri } => {
                commands::spotify::configure(client, &client_id, &client_secret, redirect_uri)
                    .await?
            }
            SpotifyAction::Authorize => commands::spotify::authorize(client).await?,
            SpotifyAction::Devices => commands::spotify::devices(client).await?,
            SpotifyAction::Transfer { device_id } => {
                commands::spotify::transfer(client, &device_id).await?
            }
        },
        Commands::Bluetooth { action } => match action {
            BluetoothAction::List => commands::bluetooth::list(client).await?,
            BluetoothAction::Scan { seconds } => commands::bluetooth::scan(client, seconds).await?,
            BluetoothAction::Pair { address } => {
                commands::bluetooth::device_action(client, "pair", &address).await?
            }
            BluetoothAction::Connect { address } => {
                commands::bluetooth::device_action(client, "connect", &address).await?
            }
            BluetoothAction::Disconnect { address } => {
                commands::bluetooth::device_action(client, "disconnect", &address).await?
            }
            BluetoothAction::Remove { address } => {
                commands::bluetooth::device_action(client, "remove", &address).await?
            }
        },
        Commands::Repair { target } => commands::system::repair(client, target).await?,
        Commands::Update => commands::system::update(client).await?,
        Commands::Lockdown { enabled } => commands::system::lockdown(client, enabled).await?,
        Commands::PlayerConfig { device_name, bitrate, initial_volume } => {
            commands::system::player_config(client, &device_name, bitrate, initial_volume).await?
        }
    }

    Ok(())
}

async fn rewards(client: &ApiClient, action: RewardsAction) -> Result<()> {
    use commands::rewards;

    match action {
        RewardsAction::Show => rewards::show(client).await,
        RewardsAction::Redeem { name } => rewards::redeem(client, &name).await,
        RewardsAction::Adjust { delta } => rewards::adjust(client, delta).await,
        RewardsAction::Reset => rewards::reset(client).await,
        RewardsAction::Enable => {
            rewards::update(client, |s| {
                s.enabled = true;
                Ok(())
            })
            .await
        }
        RewardsAction::Disable => {
            rewards::update(client, |s| {
                s.enabled = false;
                Ok(())
            })
            .await
        }
        RewardsAction::Rates { per_minute, daily_bonus, no_skip_bonus } => {
            rewards::update(client, |s| {
                s.points_per_minute = per_minute.unwrap_or(s.points_per_minute);
                s.daily_login_bonus = daily_bonus.unwrap_or(s.daily_login_bonus);
                s.no_skip_bonus = no_skip_bonus.unwrap_or(s.no_skip_bonus);
                Ok(())
            })
            .await
        }
        RewardsAction::Add { name, cost, kind, value } => {
            let reward = Reward { name, cost, reward_type: kind.into(), value };
            rewards::update(client, |s| rewards::add_reward(s, reward)).await
        }
        RewardsAction::Remove { name } => {
            rewards::update(client, |s| rewards::remove_reward(s, &name)).await
        }
    }
}
