use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use custom_vision_batch::{
    config::{format_row, AppConfig, Cli},
    BatchProcessor, OutputLayout,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    println!("------------------------------------------");
    println!("Custom Vision - Batch Inference");
    println!(
        "Start time:  {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("CONFIG VALUES: ");
    for (key, value) in cli.display_rows() {
        println!("{}", format_row(key, &value));
    }

    println!("Importing Parameter File...");
    let config = AppConfig::load(&cli.parameter_file).with_context(|| {
        format!(
            "Failed to import parameter file: {}",
            cli.parameter_file.display()
        )
    })?;
    println!("Parameter file imported.");

    println!("PARAMETER FILE VALUES: ");
    for (key, value) in config.display_rows() {
        println!("{}", format_row(key, &value));
    }

    let layout = if cli.preserve_structure {
        OutputLayout::PreserveStructure
    } else {
        OutputLayout::Flatten
    };

    let processor = BatchProcessor::with_custom_vision(config)
        .context("Failed to initialise prediction client")?
        .with_output_dir(cli.output_dir.clone())
        .with_layout(layout);

    processor.process_directory().context("Batch inference failed")?;

    Ok(())
}
