//! walkie-daemon: headless push-to-talk voice client
//!
//! Keeps a session to the voice server alive and shows its state on
//! status lights:
//! - Connection controller with bounded, cancellable reconnects
//! - Push-to-talk from a GPIO button or the IPC socket
//! - Online / Participants / Transmit indicators on discrete LEDs or an
//!   addressable strip
//!
//! Exits with status 1 when the retry ceiling is reached or the audio
//! stream cannot be opened.

mod audio;
mod config;
mod connection;
mod events;
mod indicator;
mod ipc;
mod lifecycle;
mod presence;
mod ptt;
mod session;
mod transmit;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::audio::DeviceAudio;
use crate::config::{Cli, Config, IndicatorBackend};
use crate::connection::{Controller, ControllerHandle};
use crate::indicator::{AddressableStrip, DiscreteLeds, IndicatorSink, StatusMapper, SysfsGpio};
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::ptt::{PttEvent, PttListener};
use crate::session::TcpDialer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "walkie-daemon starting");

    let config = Config::from_cli(Cli::parse())?;
    info!(
        server = %config.target.address,
        user = %config.target.username,
        indicator = ?config.indicator,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;

    let sink = open_indicators(&config)?;
    let (indicators, _indicator_task) = StatusMapper::spawn(sink);

    let (controller, handle) = Controller::new(
        TcpDialer::default(),
        DeviceAudio::new(&config.audio_device),
        config.controller_settings(),
        indicators,
    );
    let mut controller_task = tokio::spawn(controller.run());

    // Push-to-talk button -> controller
    let (ptt_tx, ptt_rx) = mpsc::channel(16);
    let ptt_listener = config.ptt_pin.map(|pin| PttListener::new(pin, ptt_tx));
    let ptt_rx = match &ptt_listener {
        Some(listener) => match listener.start() {
            Ok(()) => {
                info!("ptt listener started");
                Some(ptt_rx)
            }
            Err(e) => {
                error!(?e, "failed to start ptt listener");
                warn!("continuing without push-to-talk button - use the IPC socket");
                None
            }
        },
        None => None,
    };

    let server = Server::new(&config.socket_path, handle.clone())?;
    let mut controller_events = handle.subscribe();

    handle.start();
    info!("daemon initialized, entering main loop");

    let finished = tokio::select! {
        joined = &mut controller_task => Some(joined),

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
            None
        }

        _ = forward_ptt(ptt_rx, handle.clone()) => None,

        // Lifecycle events for the log
        _ = async {
            loop {
                match controller_events.recv().await {
                    Ok(event) => info!(%event, "controller event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "controller event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => None,

        _ = shutdown.wait() => {
            info!("shutdown signal received");
            None
        }
    };

    info!("shutting down...");

    handle.shutdown().await;
    if let Some(listener) = ptt_listener.as_ref().filter(|l| l.is_running()) {
        listener.stop();
        info!("ptt listener stopping");
    }
    server.shutdown().await;

    let outcome = match finished {
        Some(joined) => joined,
        None => controller_task.await,
    };

    match outcome.context("connection controller panicked")? {
        Ok(()) => {
            info!("walkie-daemon stopped");
            Ok(())
        }
        Err(e) => {
            error!(%e, "fatal");
            Err(e.into())
        }
    }
}

fn open_indicators(config: &Config) -> Result<Box<dyn IndicatorSink>> {
    let sink: Box<dyn IndicatorSink> = match config.indicator {
        IndicatorBackend::Gpio => {
            let gpio = SysfsGpio::open(&config.pins.pins()).context("failed to set up LED pins")?;
            Box::new(DiscreteLeds::new(config.pins, gpio))
        }
        IndicatorBackend::Strip => Box::new(
            AddressableStrip::open(&config.strip_device)
                .with_context(|| format!("failed to open {}", config.strip_device.display()))?,
        ),
    };
    Ok(sink)
}

/// Feed button edges to the controller; never returns
async fn forward_ptt(rx: Option<mpsc::Receiver<PttEvent>>, handle: ControllerHandle) {
    if let Some(mut rx) = rx {
        while let Some(event) = rx.recv().await {
            match event {
                PttEvent::Pressed => handle.start_transmit(),
                PttEvent::Released => handle.stop_transmit(),
            }
        }
        warn!("ptt input closed, button disabled");
        handle.stop_transmit();
    }
    std::future::pending::<()>().await;
}
