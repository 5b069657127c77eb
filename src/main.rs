//! EchoNative command-line client
//!
//! Composition root: wires the config, credential store, HTTP client,
//! router, and session controller together and drives one full
//! record → submit → render cycle, plus the account and catalogue
//! operations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use echonative::api::{ApiClient, ApiError, AuthClient};
use echonative::audio::{self, MicrophoneCapture};
use echonative::catalog::ClipCatalogClient;
use echonative::config;
use echonative::credentials::CredentialStore;
use echonative::profile::ProfileClient;
use echonative::result::ModeResult;
use echonative::router::{Mode, ModeRouter};
use echonative::session::{SessionController, SessionError};

#[derive(Parser)]
#[command(name = "echonative", version, about = "Voice-practice client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Log in and store the access token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the stored access token
    Logout,
    /// List audio input devices
    Devices,
    /// List the clips available for magic-clip dubbing
    Clips,
    /// Show the user's progress counters
    Profile,
    /// Record an utterance and submit it
    Record {
        /// Interaction mode
        #[arg(long, value_enum, default_value_t = ModeArg::Practice)]
        mode: ModeArg,
        /// Free-form context for the correction model
        #[arg(long, default_value = "")]
        context: String,
        /// Clip template id (required in magic-clip mode)
        #[arg(long)]
        clip_id: Option<String>,
        /// Recording length in seconds
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Practice,
    Panic,
    MagicClip,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Practice => Mode::Practice,
            ModeArg::Panic => Mode::Panic,
            ModeArg::MagicClip => Mode::MagicClip,
        }
    }
}

/// Set up logging to stderr and ~/.echonative/logs/ (local time for
/// readability)
fn init_logging() {
    use tracing_subscriber::prelude::*;

    /// Format timestamps using the system's local time via chrono
    struct LocalTimer;
    impl tracing_subscriber::fmt::time::FormatTime for LocalTimer {
        fn format_time(
            &self,
            w: &mut tracing_subscriber::fmt::format::Writer<'_>,
        ) -> std::fmt::Result {
            use std::fmt::Write as _;
            write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
        }
    }

    let log_dir = config::data_dir().join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("echonative.log"))
        .ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(file) = log_file {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_timer(LocalTimer)
            .with_ansi(false);
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(LocalTimer);
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::fmt().with_timer(LocalTimer).init();
    }
}

/// Single place that reacts to a rejected credential
fn check_unauthorized<T>(
    result: std::result::Result<T, ApiError>,
    credentials: &CredentialStore,
) -> Result<T> {
    match result {
        Err(ApiError::Unauthorized) => {
            credentials.invalidate();
            bail!("credential missing or rejected; log in again with `echonative login`")
        }
        other => other.context("backend request failed"),
    }
}

fn render_result(result: &ModeResult) {
    match result {
        ModeResult::Practice(practice) => {
            if practice.is_perfect() {
                println!("Perfect! No corrections needed.");
                println!("You said: {}", practice.original_text);
            } else {
                println!("Correction: {}", practice.rendered_correction());
                println!("You said:   {}", practice.original_text);
            }
            if let Some(url) = &practice.audio_url {
                println!("Echo audio: {}", url);
            }
            if !practice.pitch.is_empty() {
                let end = practice.pitch.last().map(|p| p.time).unwrap_or_default();
                println!("Pitch contour: {} points over {:.2}s", practice.pitch.len(), end);
            }
        }
        ModeResult::Panic(panic) => {
            println!("Translation: {}", panic.translated_text);
            println!("You said:    {}", panic.original_text);
            if let Some(url) = &panic.audio_url {
                println!("Audio: {}", url);
            }
        }
        ModeResult::MagicClip(clip) => {
            if clip.is_ready() {
                println!("Your clip is ready: {}", clip.video_url);
            } else {
                println!("Video generation failed.");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let cfg = config::get_config();
    let credentials = Arc::new(CredentialStore::new());
    let api = Arc::new(
        ApiClient::new(
            &cfg.server.base_url,
            cfg.server.request_timeout_secs,
            credentials.clone(),
        )
        .context("failed to build backend client")?,
    );

    match cli.command {
        Command::Register { username, password } => {
            let auth = AuthClient::new(api, credentials.clone());
            auth.register(&username, &password)
                .await
                .context("registration failed")?;
            println!("Account created. Log in with `echonative login`.");
        }
        Command::Login { username, password } => {
            let auth = AuthClient::new(api, credentials.clone());
            auth.login(&username, &password)
                .await
                .context("login failed")?;
            println!("Logged in as {}.", username);
        }
        Command::Logout => {
            let auth = AuthClient::new(api, credentials.clone());
            auth.logout();
            println!("Logged out.");
        }
        Command::Devices => {
            let devices = audio::list_input_devices();
            if devices.is_empty() {
                println!("No audio input devices found.");
            }
            for device in devices {
                let marker = if device.is_default { " (default)" } else { "" };
                println!("{}{}\n    id: {}", device.name, marker, device.id);
            }
        }
        Command::Clips => {
            let catalog = ClipCatalogClient::new(api);
            let clips = check_unauthorized(catalog.list_clips().await, &credentials)?;
            if clips.is_empty() {
                println!("No clips available.");
            }
            for clip in clips {
                println!("{} — \"{}\" (id: {})", clip.title, clip.quote, clip.id);
            }
        }
        Command::Profile => {
            let profile = ProfileClient::new(api);
            let user = check_unauthorized(profile.fetch().await, &credentials)?;
            println!("{}", user.username);
            println!("  streak: {} days", user.streak_count);
            println!("  processed today: {}", user.daily_process_count);
        }
        Command::Record {
            mode,
            context,
            clip_id,
            seconds,
        } => {
            let mode = Mode::from(mode);
            let actor_id = credentials
                .username()
                .unwrap_or_else(|| cfg.account.actor_id.clone());

            let router = Arc::new(ModeRouter::new(api.clone()));
            let profile = Arc::new(ProfileClient::new(api.clone()));
            let session = SessionController::new(
                actor_id,
                Box::new(MicrophoneCapture::new(cfg.audio.device_id.clone())),
                router,
            )
            .with_profile(profile);

            session.switch_mode(mode);
            session.set_context_text(context);

            if mode == Mode::MagicClip {
                let clip_id =
                    clip_id.context("--clip-id is required in magic-clip mode")?;
                let catalog = ClipCatalogClient::new(api.clone());
                let clip = check_unauthorized(catalog.find_clip(&clip_id).await, &credentials)?
                    .with_context(|| format!("clip '{}' not found in the catalogue", clip_id))?;
                println!("Dubbing over {}: \"{}\"", clip.title, clip.quote);
                session.select_clip(clip);
            }

            session.begin_recording()?;
            println!("Recording for {} seconds — speak now...", seconds);
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            println!("Processing...");

            match session.end_recording().await {
                Ok(result) => render_result(&result),
                Err(SessionError::Api(ApiError::Unauthorized)) => {
                    credentials.invalidate();
                    bail!("credential missing or rejected; log in again with `echonative login`")
                }
                Err(err) => return Err(err).context("submission failed"),
            }
        }
    }

    Ok(())
}
