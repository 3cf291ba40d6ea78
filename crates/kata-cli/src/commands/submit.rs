//! Submit command - send a file to the scanner

use anyhow::{Context, Result};
use kata_client::{KataClient, SubmitRequest};
use std::path::Path;

use super::wait::{parse_scan_id, report, wait_with_spinner, WaitArgs};
use crate::output::{OutputContext, SubmitRow};

/// Options of the submit command
#[derive(Debug, Default)]
pub struct SubmitOptions {
    pub filename: Option<String>,
    pub scan_id: Option<String>,
    pub sensor_instance: Option<String>,
    /// Wait for a verdict after an accepted submission
    pub wait: Option<WaitArgs>,
}

/// Submit a file; returns whether the scanner accepted it (and, with
/// `--wait`, whether a verdict arrived)
pub async fn submit(
    client: &KataClient,
    file_path: &Path,
    options: SubmitOptions,
    ctx: &OutputContext,
) -> Result<bool> {
    ctx.info(&format!("Reading {}...", file_path.display()));
    let content = std::fs::read(file_path)
        .with_context(|| format!("Failed to read file: {}", file_path.display()))?;

    let filename = options.filename.clone().or_else(|| {
        file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    });

    let mut request = SubmitRequest::new(content);
    if let Some(filename) = filename {
        request = request.filename(filename);
    }
    if let Some(scan_id) = &options.scan_id {
        request = request.scan_id(parse_scan_id(scan_id));
    }
    if let Some(instance) = &options.sensor_instance {
        request = request.sensor_instance_id(instance.clone());
    }

    let result = client
        .submit_scan(request)
        .await
        .context("Failed to submit file")?;

    if result.ok {
        ctx.success(&format!("Submitted scan {}", result.scan_id));
    } else {
        ctx.error(&format!(
            "Scanner rejected scan {} (HTTP {})",
            result.scan_id, result.status
        ));
    }
    ctx.print_one(&SubmitRow::from(&result));

    if !result.ok {
        return Ok(false);
    }

    match &options.wait {
        Some(args) => {
            let wait_options = args.to_options(client, options.sensor_instance.as_deref());
            let item = wait_with_spinner(client, &result.scan_id, &wait_options, ctx).await?;
            Ok(report(&result.scan_id, item.as_ref(), ctx))
        }
        None => Ok(true),
    }
}
