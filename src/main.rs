mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{CliConfig, Config};
use flow_engine::{
    account::AccountRow,
    action::{group_into_batches, ActionRecord},
    compute_financial_history,
};
use std::io;
use tracing::{info, warn};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = CliConfig::parse();

    run_simulation(&config)?;

    info!("Simulation completed successfully");

    Ok(())
}

fn run_simulation<C: Config>(config: &C) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(config.input_path())
        .context("Failed to open input file")?;

    let mut actions = Vec::new();
    let mut skipped = 0;

    for result in reader.deserialize() {
        let record: ActionRecord = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to parse action row: {e}");
                skipped += 1;

                continue;
            }
        };

        let time = record.time;
        match record.into_action() {
            Ok(action) => actions.push((time, action)),
            Err(e) => {
                warn!("Skipping invalid action row: {e}");
                skipped += 1;
            }
        }
    }

    let batches = group_into_batches(actions);
    info!(
        "Read {} actions in {} batches, skipped {skipped} invalid rows",
        batches.iter().map(|b| b.actions.len()).sum::<usize>(),
        batches.len(),
    );

    let history = compute_financial_history(batches).context("Failed to compute history")?;

    info!("Computed {} snapshots", history.snapshots.len());

    match config.output_path() {
        Some(path) => {
            let writer = csv::WriterBuilder::new()
                .from_path(path)
                .context("Failed to open output file")?;
            write_history(writer, &history)
        }
        None => {
            let stdout = io::stdout();
            write_history(csv::WriterBuilder::new().from_writer(stdout.lock()), &history)
        }
    }
}

fn write_history<W: io::Write>(
    mut writer: csv::Writer<W>,
    history: &flow_engine::FinancialHistory,
) -> Result<()> {
    for snapshot in history.iter() {
        for (id, account) in &snapshot.accounts {
            let row = AccountRow::new(snapshot.timestamp, id, account);
            writer.serialize(&row).context("Failed to serialize row")?;
        }
    }

    writer.flush().context("Failed to flush output")?;

    Ok(())
}
