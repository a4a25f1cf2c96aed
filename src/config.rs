//! Command line flags and derived configuration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use rand::RngCore;

use crate::connection::ControllerSettings;
use crate::indicator::PinMap;
use crate::session::{DialTarget, TlsOptions};

/// Consecutive connection failures before giving up
pub const MAX_CONNECT_ATTEMPTS: u32 = 100;

/// Wait between a failure and the next dial
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Quiet period before sampling channel membership
pub const PRESENCE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Pause between destroying and reopening the audio stream
pub const AUDIO_RESET_PAUSE: Duration = Duration::from_millis(50);

/// Which indicator hardware is wired up
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IndicatorBackend {
    /// One LED per signal on GPIO pins
    Gpio,
    /// Addressable RGB strip on a serial port
    Strip,
}

#[derive(Debug, Parser)]
#[command(
    name = "walkie-daemon",
    version,
    about = "Headless push-to-talk voice client with status lights"
)]
pub struct Cli {
    /// The server to connect to
    #[arg(long, default_value = "mywalki.projectable.me:64738")]
    pub server: String,

    /// The username of the client (random when empty)
    #[arg(long, default_value = "")]
    pub username: String,

    /// The password of the server
    #[arg(long, env = "WALKIE_PASSWORD", default_value = "")]
    pub password: String,

    /// Skip server certificate verification
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub insecure: bool,

    /// PEM encoded certificate and private key
    #[arg(long)]
    pub certificate: Option<PathBuf>,

    /// Channel to join by default (empty to stay put)
    #[arg(long, default_value = "mywalki")]
    pub channel: String,

    /// Indicator hardware
    #[arg(long, value_enum, default_value_t = IndicatorBackend::Gpio)]
    pub indicator: IndicatorBackend,

    #[arg(long, default_value_t = 17)]
    pub online_pin: u8,

    #[arg(long, default_value_t = 27)]
    pub participants_pin: u8,

    #[arg(long, default_value_t = 22)]
    pub transmit_pin: u8,

    /// Serial device of the LED strip
    #[arg(long, default_value = "/dev/ttyUSB0")]
    pub strip_device: PathBuf,

    /// GPIO input of the push-to-talk button
    #[arg(long)]
    pub ptt_pin: Option<u8>,

    /// Audio capture device
    #[arg(long, default_value = "/dev/snd")]
    pub audio_device: PathBuf,

    /// IPC socket path
    #[arg(long)]
    pub socket: Option<PathBuf>,
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub target: DialTarget,
    pub channel: Option<String>,
    pub indicator: IndicatorBackend,
    pub pins: PinMap,
    pub strip_device: PathBuf,
    pub ptt_pin: Option<u8>,
    pub audio_device: PathBuf,
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,
}

impl Config {
    /// Resolve flags into a configuration
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let username = if cli.username.is_empty() {
            random_username()
        } else {
            cli.username
        };

        if let Some(cert) = &cli.certificate {
            if !cert.is_file() {
                bail!("certificate {} not found", cert.display());
            }
        }

        let socket_path = match cli.socket {
            Some(path) => path,
            None => default_data_dir()?.join("daemon.sock"),
        };

        Ok(Self {
            target: DialTarget {
                address: cli.server,
                username,
                password: cli.password,
                tls: TlsOptions {
                    insecure_skip_verify: cli.insecure,
                    certificate: cli.certificate,
                },
            },
            channel: Some(cli.channel).filter(|c| !c.is_empty()),
            indicator: cli.indicator,
            pins: PinMap {
                online: cli.online_pin,
                participants: cli.participants_pin,
                transmit: cli.transmit_pin,
            },
            strip_device: cli.strip_device,
            ptt_pin: cli.ptt_pin,
            audio_device: cli.audio_device,
            socket_path,
        })
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        let mut settings = ControllerSettings::new(self.target.clone());
        settings.channel = self.channel.clone();
        settings
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("mywalki"))
}

/// `mywalki-` followed by six random bytes in hex
fn random_username() -> String {
    let mut buf = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut buf);
    buf[0] |= 2;
    let hex: String = buf.iter().map(|b| format!("{b:02x}")).collect();
    format!("mywalki-{hex}")
}
