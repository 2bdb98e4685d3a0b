//! `tether echo`: one query across an in-process loopback bridge.
//!
//! Two messengers are wired back to back, the same way a host and its page
//! are. The page side answers `echo` with its payload, so the command shows
//! the full path a query takes: launch gate, evaluation queue, entry call,
//! inbound dispatch and response correlation.

use std::sync::Arc;

use anyhow::{Context, Result};
use tether_config::Config;
use tether_core::{Payload, Query, json_text};
use tether_messenger::{FnHandler, Messenger, MessengerConfig};
use tether_test::LoopbackSurface;
use tracing::debug;

/// Query type the page side answers.
pub(crate) const ECHO: &str = "echo";

/// Send `payload` (JSON text, empty for void) as a `query_type` query and
/// print the reply.
pub(crate) async fn run_echo(config: &Config, query_type: &str, payload: &str) -> Result<()> {
    let payload = json_text::from_json_text(payload.trim()).context("payload is not valid JSON")?;
    let reply = round_trip(config, query_type, payload).await?;
    println!("{}", json_text::pretty(&reply));
    Ok(())
}

async fn round_trip(config: &Config, query_type: &str, payload: Payload) -> Result<Payload> {
    let messenger_config = MessengerConfig::from(&config.messenger);
    let (host_surface, page_surface) = LoopbackSurface::pair_with_entry_points(
        &messenger_config.query_entry_point,
        &messenger_config.response_entry_point,
    );

    let host = Messenger::new(host_surface, messenger_config.clone())?;
    let page = Messenger::new(page_surface, messenger_config)?;
    // Raw handler so void echoes as void and `null` as `null`.
    let _echo = page.register_query_handler(
        ECHO,
        Arc::new(FnHandler::new(|query: Query| async move { Ok(query.payload) })),
    );

    page.signal_launch_succeeded();
    host.signal_launch_succeeded();
    debug!(query_type, "Sending query over loopback");

    let reply = host
        .send_query_raw(query_type, payload)
        .await
        .with_context(|| format!("'{query_type}' query failed"))?;
    Ok(reply)
}
