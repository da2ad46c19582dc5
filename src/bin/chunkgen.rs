use chunkforge::{GeneratorOptions, RegionBuffer, ScenarioComposer};
use std::error::Error;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Usage: chunkgen [options.json]
    let options = match std::env::args().nth(1) {
        Some(path) => GeneratorOptions::from_path(Path::new(&path))?,
        None => GeneratorOptions::default(),
    };
    let region_path = options.region_path();

    let composer = ScenarioComposer::new(options)?;
    let mut region = RegionBuffer::new();
    let summary = composer.run(&mut region)?;
    region.save(&region_path)?;

    info!(
        path = %region_path.display(),
        chunks = summary.chunks_written,
        stair_states = summary.stair_states,
        "region written"
    );
    Ok(())
}
