use anyhow::Result;
use clap::{Parser, Subcommand};
use slide_regions::{
    AnnotateOptions, OcrWorker, StopSignal, WorkerTimings, is_crop_file, result_path_for,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "slrg", about = "Slide region crop tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the OCR worker on a crop directory until Ctrl-C
    Watch {
        /// Directory holding slide_NNN_crop_K.png files
        #[arg(default_value = "latex_regions")]
        dir: PathBuf,

        /// JSON options file (only the worker timings are used)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Simulated processing time per crop in milliseconds
        #[arg(long)]
        processing_ms: Option<u64>,
    },

    /// List crops and whether each has an OCR result
    Status {
        /// Directory holding slide_NNN_crop_K.png files
        #[arg(default_value = "latex_regions")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            dir,
            config,
            processing_ms,
        } => {
            let mut timings = match config {
                Some(path) => AnnotateOptions::load(&path).await?.worker,
                None => WorkerTimings::default(),
            };
            if let Some(ms) = processing_ms {
                timings.step_ms = (ms / timings.steps as u64).max(1);
            }

            let stop = StopSignal::new();
            let worker = tokio::spawn({
                let stop = stop.clone();
                let dir = dir.clone();
                async move { OcrWorker::placeholder(timings).run(&dir, &stop).await }
            });

            tokio::signal::ctrl_c().await?;
            log::info!("Interrupted, stopping worker");
            stop.set();
            let report = worker.await?;

            println!("OCR worker on {}:", dir.display());
            println!("  Passes: {}", report.passes);
            println!("  Results written: {}", report.written);
            println!("  Failed writes: {}", report.failed);
        }

        Commands::Status { dir } => {
            let crops = list_crops(&dir)?;
            let mut done = 0;
            for crop in &crops {
                let processed = result_path_for(crop).exists();
                if processed {
                    done += 1;
                }
                println!(
                    "  [{}] {}",
                    if processed { "x" } else { " " },
                    crop.file_name().unwrap_or_default().to_string_lossy()
                );
            }
            println!(
                "{} crops, {} processed, {} pending",
                crops.len(),
                done,
                crops.len() - done
            );
        }
    }

    Ok(())
}

/// Crop files in `dir`, sorted by name
fn list_crops(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut crops = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if is_crop_file(&path) && path.is_file() {
            crops.push(path);
        }
    }
    crops.sort();
    Ok(crops)
}
