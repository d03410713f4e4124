//! Stream intensity matrices from a live acoustic camera.
//!
//! Connects to the device, subscribes to its beamforming event and logs a
//! short summary of every rendered matrix until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # From a YAML session config
//! cargo run --example live_overlay -- session.yaml
//!
//! # Straight to a device with default settings
//! cargo run --example live_overlay -- --address 10.1.5.33 --user admin --password admin
//!
//! # More detail from the session driver
//! RUST_LOG=acoustic_overlay=debug cargo run --example live_overlay -- session.yaml
//! ```

use std::time::Duration;

use acoustic_overlay::{Credentials, SessionConfig, StreamSession, UpdateRate};
use anyhow::{Context, bail};
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = parse_args(&args)?;

    let session = StreamSession::start(&config).context("failed to start session")?;
    info!(endpoint = session.endpoint(), "Waiting for frames, press Ctrl-C to stop");

    let mut frames = session.subscribe(UpdateRate::Max(10));
    let mut states = session.state_updates();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, closing session");
                session.close();
                break;
            }
            Some(state) = states.next() => {
                info!(%state, "Session state changed");
            }
            frame = frames.next() => {
                let Some(frame) = frame else { break };
                info!(
                    sequence = frame.sequence,
                    event_id = frame.event_id,
                    gain = frame.gain,
                    peak = frame.matrix.max(),
                    lit = frame.matrix.count_nonzero(),
                    "Rendered frame"
                );
            }
        }
    }

    let stats = session.stats();
    tokio::time::timeout(Duration::from_secs(5), session.join())
        .await
        .context("session did not stop in time")??;

    if stats.frames_dropped > 0 {
        warn!(dropped = stats.frames_dropped, "Some frames were dropped under load");
    }
    info!(?stats, "Session finished");
    Ok(())
}

fn parse_args(args: &[String]) -> anyhow::Result<SessionConfig> {
    match args {
        [path] if !path.starts_with("--") => {
            SessionConfig::load(path).with_context(|| format!("failed to load {path}"))
        }
        _ => {
            let mut address = None;
            let mut credentials = Credentials::default();
            let mut event_id = 0;

            let mut iter = args.iter();
            while let Some(flag) = iter.next() {
                let value = iter.next().with_context(|| format!("missing value for {flag}"))?;
                match flag.as_str() {
                    "--address" => address = Some(value.clone()),
                    "--user" => credentials.username = value.clone(),
                    "--password" => credentials.password = value.clone(),
                    "--event" => event_id = value.parse().context("--event must be an integer")?,
                    other => bail!("unknown argument {other}"),
                }
            }

            let address = address.context("usage: live_overlay <config.yaml> | --address <ip>")?;
            let config = SessionConfig::new(address, credentials, event_id);
            config.validate()?;
            Ok(config)
        }
    }
}
