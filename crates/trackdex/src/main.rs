mod config;
mod server;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trackdex_core::builder::{build_tracking_index, publish_index};
use trackdex_core::combiner::combine_manifests;
use trackdex_core::types::{BuildSummary, CombineSummary};

#[derive(Parser, Debug)]
#[command(author, version, about = "Trackdex manifest reconciliation CLI and API server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the tracking index from every manifest and publish it
    BuildIndex(BuildIndexArgs),
    /// Compact each supplier's daily manifests into its combined file
    Combine,
    /// Start the batch API server
    Serve,
}

#[derive(Args, Debug, Default)]
struct BuildIndexArgs {
    /// Build and report without publishing the artifact
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::BuildIndex(args) => {
            let store = config::connect_store().await?;
            let build = config::build_config()?;
            let outcome = build_tracking_index(store.as_ref(), &build).await?;
            print_build_summary(&outcome.summary);

            if args.dry_run {
                warn!("dry run: tracking index not published");
                return Ok(());
            }
            let url = publish_index(store.as_ref(), &build, &outcome.index)
                .await
                .context("index build succeeded but publishing failed")?;
            info!(url = %url, "done");
            Ok(())
        }
        Command::Combine => {
            let store = config::connect_store().await?;
            let combine = config::combine_config()?;
            let summary = combine_manifests(store.as_ref(), &combine).await?;
            print_combine_summary(&summary);
            Ok(())
        }
        Command::Serve => server::run().await,
    }
}

fn print_build_summary(summary: &BuildSummary) {
    let mut table = Table::new();
    table.set_header(vec!["metric", "value"]);
    table.add_row(vec![
        "manifests scanned".to_string(),
        summary.manifests_scanned.to_string(),
    ]);
    table.add_row(vec![
        "trackings indexed".to_string(),
        summary.trackings_indexed.to_string(),
    ]);
    table.add_row(vec!["enriched".to_string(), summary.enriched.to_string()]);
    table.add_row(vec![
        "order index size".to_string(),
        summary.order_index_size.to_string(),
    ]);
    for (source, count) in &summary.counts_by_source {
        table.add_row(vec![format!("{source} trackings"), count.to_string()]);
    }
    table.add_row(vec![
        "duration (ms)".to_string(),
        summary.duration_ms.to_string(),
    ]);
    println!("{table}");

    let skipped: Vec<_> = summary.skipped().collect();
    if !skipped.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["skipped file", "reason"]);
        for report in skipped {
            if let trackdex_core::types::FileOutcome::Skipped { message, .. } = &report.outcome {
                table.add_row(vec![report.path.clone(), message.clone()]);
            }
        }
        println!("{table}");
    }
}

fn print_combine_summary(summary: &CombineSummary) {
    let mut table = Table::new();
    table.set_header(vec![
        "supplier",
        "daily files",
        "rows in",
        "rows kept",
        "duplicates",
        "combined file",
    ]);
    for report in &summary.suppliers {
        table.add_row(vec![
            report.supplier.to_string(),
            report.daily_files.to_string(),
            report.rows_in.to_string(),
            report.rows_kept.to_string(),
            report.duplicates_dropped.to_string(),
            report.combined_path.clone().unwrap_or_else(|| "-".into()),
        ]);
    }
    println!("{table}");
}
