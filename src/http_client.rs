use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

// Bounded so a stalled source file fetch fails the unit instead of hanging
// the whole run.
const DEFAULT_TIMEOUT_SECS: u64 = 20;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(request_timeout())
            .build()
            .context("failed to build http client")
    })
}

fn request_timeout() -> Duration {
    let secs = std::env::var("SLAM_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|val| val.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
        .clamp(1, 120);
    Duration::from_secs(secs)
}
