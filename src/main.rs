use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pneumoscan::analytics::{recent_first, AnalyticsSnapshot};
use pneumoscan::batch::BatchCoordinator;
use pneumoscan::config::Config;
use pneumoscan::diagnoser::Diagnoser;
use pneumoscan::heatmap::engine::HeatmapEngine;
use pneumoscan::image_codec::impl_image_rs::ImageCodecImageRs;
use pneumoscan::model_runtime::impl_burn::{DefaultBackend, ModelRuntimeBurn};
use pneumoscan::model_runtime::impl_fake::ModelRuntimeFake;
use pneumoscan::model_runtime::interface::ModelRuntime;
use pneumoscan::report::impl_text::ReportRendererText;
use pneumoscan::report::interface::{latest_report, ReportRenderer};
use pneumoscan::storage::impl_directory::ArtifactStoreDirectory;
use pneumoscan::storage::impl_jsonl::RecordStoreJsonl;
use pneumoscan::storage::interface::RecordStore;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pneumoscan")]
#[command(about = "Chest X-ray pneumonia screening with Grad-CAM heatmaps")]
#[command(version)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long, env = "PNEUMOSCAN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify images, store their heatmaps and record the results
    Classify {
        #[arg(long)]
        owner: String,

        /// Use a random-score stand-in instead of the trained model
        #[arg(long)]
        fake_model: bool,

        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Summarize prediction history
    Stats {
        /// Restrict to one owner; every owner otherwise
        #[arg(long)]
        owner: Option<String>,

        /// Print chart data as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render the report for an owner's latest prediction
    Report {
        #[arg(long)]
        owner: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pneumoscan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let records = Arc::new(RecordStoreJsonl::new(&config.records_path));
    let artifacts = Arc::new(ArtifactStoreDirectory::new(&config.artifacts_dir));
    let codec = Arc::new(ImageCodecImageRs::new());

    match args.command {
        Command::Classify {
            owner,
            fake_model,
            images,
        } => {
            let runtime = build_runtime(&config, fake_model)?;
            let diagnoser = Diagnoser::new(runtime, HeatmapEngine::new(config.heatmap.clone()));
            let coordinator = BatchCoordinator::new(diagnoser, codec, records, artifacts)
                .with_item_timeout(config.item_timeout())
                .with_timezone(config.timezone());

            let inputs = images
                .iter()
                .map(|path| {
                    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
                })
                .collect::<Result<Vec<_>>>()?;

            let report = coordinator.run_batch(&owner, inputs);
            for item in &report.items {
                let path = images[item.index].display();
                match &item.outcome {
                    Ok(success) => {
                        let region = success
                            .explanation
                            .region
                            .map(|r| format!("{}x{} at ({}, {})", r.width, r.height, r.x, r.y))
                            .unwrap_or_else(|| "none".to_string());
                        println!(
                            "{path}: {} {} (region: {region}, heatmap: {})",
                            success.result.label(),
                            success.result.confidence_text(),
                            success.record.heatmap_ref
                        );
                    }
                    Err(e) => println!("{path}: failed: {e}"),
                }
            }
        }
        Command::Stats { owner, json } => {
            let history = match &owner {
                Some(owner) => records.query_by_owner(owner)?,
                None => records.query_all()?,
            };
            let snapshot = AnalyticsSnapshot::compute(&history, &config.histogram_edges);

            if json {
                let payload = json!({
                    "snapshot": &snapshot,
                    "charts": snapshot.chart_data(),
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Total predictions: {}", snapshot.total);
                for (label, count) in &snapshot.counts {
                    println!("{label}: {count}");
                }
                println!("Healthy: {:.2}%", snapshot.healthy_percent);
                for (label, count) in snapshot.histogram_labels.iter().zip(&snapshot.histogram) {
                    println!("Confidence {label}: {count}");
                }
                for record in recent_first(history).iter().take(10) {
                    println!(
                        "{}  {}  {:.2}%  {}",
                        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        record.label,
                        record.confidence,
                        record.owner_id
                    );
                }
            }
        }
        Command::Report { owner, out } => {
            let generated_at = Utc::now().with_timezone(&config.timezone());
            let report = latest_report(
                &*records,
                &owner,
                &*artifacts,
                &*codec,
                generated_at,
            )?;
            let page = ReportRendererText::new().render(&report);

            match out {
                Some(path) => {
                    std::fs::write(&path, page)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), "report written");
                }
                None => print!("{}", String::from_utf8_lossy(&page)),
            }
        }
    }

    Ok(())
}

fn build_runtime(config: &Config, fake_model: bool) -> Result<Arc<Mutex<dyn ModelRuntime>>> {
    if fake_model {
        info!("using fake model runtime");
        return Ok(Arc::new(Mutex::new(ModelRuntimeFake::random()?)));
    }

    let runtime = ModelRuntimeBurn::<DefaultBackend>::load(
        &config.model_path,
        &config.network,
        config.pixel_scaling,
        Default::default(),
    )
    .with_context(|| format!("Failed to load model {}", config.model_path.display()))?;
    Ok(Arc::new(Mutex::new(runtime)))
}
