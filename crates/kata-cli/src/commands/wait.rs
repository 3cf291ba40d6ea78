//! Wait command - poll a scan until it reaches a verdict

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use kata_client::{KataClient, ScanId, ScanItem, WaitOptions};
use std::time::Duration;

use crate::output::{verdict, OutputContext, ScanRow};

/// Polling options shared by `wait` and `submit --wait`
#[derive(Debug, Clone, Default, Args)]
pub struct WaitArgs {
    /// Pause between polls in milliseconds (default: from config)
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Give up after this many milliseconds (default: from config)
    #[arg(long)]
    pub wait_ms: Option<u64>,
}

impl WaitArgs {
    /// Overlay these arguments on the client's configured wait options
    pub fn to_options(&self, client: &KataClient, sensor_instance: Option<&str>) -> WaitOptions {
        let mut options = client.default_wait_options();
        if let Some(ms) = self.poll_interval_ms {
            options = options.poll_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.wait_ms {
            options = options.budget(Duration::from_millis(ms));
        }
        if let Some(instance) = sensor_instance {
            options = options.sensor_instance_id(instance);
        }
        options
    }
}

/// Scan IDs in canonical integer form are numeric, everything else is text
///
/// `007` or `+7` stay text so the id goes out exactly as typed.
pub fn parse_scan_id(raw: &str) -> ScanId {
    match raw.parse::<i64>() {
        Ok(n) if n.to_string() == raw => ScanId::Integer(n),
        _ => ScanId::Text(raw.to_string()),
    }
}

/// Wait for a verdict on an existing scan
///
/// Returns `Ok(false)` when the wait budget ran out without a verdict.
pub async fn wait(
    client: &KataClient,
    scan_id: &str,
    sensor_instance: Option<String>,
    args: &WaitArgs,
    ctx: &OutputContext,
) -> Result<bool> {
    let scan_id = parse_scan_id(scan_id);
    let options = args.to_options(client, sensor_instance.as_deref());
    let result = wait_with_spinner(client, &scan_id, &options, ctx).await?;
    Ok(report(&scan_id, result.as_ref(), ctx))
}

/// Run the wait loop behind a spinner
pub async fn wait_with_spinner(
    client: &KataClient,
    scan_id: &ScanId,
    options: &WaitOptions,
    ctx: &OutputContext,
) -> Result<Option<ScanItem>> {
    let pb = if ctx.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };
    pb.set_message(format!("Waiting for scan {}...", scan_id));

    let result = client
        .wait_for_result(scan_id, options)
        .await
        .with_context(|| format!("Failed while waiting for scan {}", scan_id));
    pb.finish_and_clear();

    result
}

/// Print the outcome of a wait; returns whether a verdict arrived
pub fn report(scan_id: &ScanId, result: Option<&ScanItem>, ctx: &OutputContext) -> bool {
    match result {
        Some(item) => {
            match verdict(&item.state) {
                "malicious" => ctx.warn(&format!("Scan {} detected a threat", scan_id)),
                "clean" => ctx.success(&format!("Scan {} is clean", scan_id)),
                other => ctx.warn(&format!("Scan {} finished: {}", scan_id, other)),
            }
            ctx.print_one(&ScanRow::from(item));
            true
        }
        None => {
            ctx.error(&format!(
                "Scan {} did not reach a verdict before the deadline",
                scan_id
            ));
            false
        }
    }
}
