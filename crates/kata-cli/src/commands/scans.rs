//! Scans command - list scan states

use anyhow::{Context, Result};
use kata_client::{GetScansParams, KataClient, ScanState};

use crate::output::{OutputContext, ScanRow};

/// List scans, optionally filtered by state and sensor instance
pub async fn scans(
    client: &KataClient,
    states: Vec<ScanState>,
    sensor_instance: Option<String>,
    ctx: &OutputContext,
) -> Result<()> {
    let mut params = GetScansParams::default().with_states(states);
    if let Some(instance) = sensor_instance {
        params = params.with_sensor_instance(instance);
    }

    let items = client
        .get_scans(&params)
        .await
        .context("Failed to query scan states")?;

    let rows: Vec<ScanRow> = items.iter().map(ScanRow::from).collect();
    ctx.print(&rows);

    Ok(())
}
