//! Application entry point.
//!
//! # Usage
//!
//! ```text
//! kws-runner [settings.toml]     listen and print keywords, one per line
//! kws-runner --list-devices      print the available input devices
//! ```
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (the given file, or the platform default).
//! 3. Build and initialise the [`Session`].
//! 4. Attach session and queue to a [`Runner`] and start it.
//! 5. Poll the queue until the capture thread ends on its own.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use kws_runner::{
    audio::CpalAudioDevice,
    config::AppConfig,
    pipeline::{KeywordQueue, Runner},
    session::Session,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let arg = std::env::args_os().nth(1);
    if arg.as_deref().is_some_and(|a| a == "--list-devices") {
        for name in CpalAudioDevice::list_devices()? {
            println!("{name}");
        }
        return Ok(());
    }

    log::info!("kws-runner starting up");

    // 2. Configuration
    let config = match arg.map(PathBuf::from) {
        Some(path) => AppConfig::load_from(&path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    // 3. Session
    let mut session = Session::from_config(&config.session, &config.audio);
    session.set_transcribe_params(config.engine.transcribe_params());
    session.init().context("failed to initialise session")?;

    // 4. Runner
    let queue = KeywordQueue::shared(config.queue.capacity);
    let mut runner = Runner::new();
    if !runner.set_buffer_size(config.runner.buffer_size) {
        log::warn!(
            "runner.buffer_size = {} ignored, reading {} frames at a time",
            config.runner.buffer_size,
            runner.buffer_size()
        );
    }
    runner.set_session(Some(session.into_shared()));
    runner.set_queue(Some(queue.clone()));
    runner.start().context("failed to start capture")?;
    log::info!("Listening for keywords");

    // 5. Poll
    while runner.running() {
        for keyword in queue.drain() {
            println!("{keyword}");
        }
        thread::sleep(POLL_INTERVAL);
    }
    runner.stop();
    for keyword in queue.drain() {
        println!("{keyword}");
    }

    match runner.last_error() {
        Some(kind) => Err(anyhow::Error::new(kind).context("capture stopped")),
        None => Ok(()),
    }
}
