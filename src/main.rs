use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bliss::{BlissConfig, Descriptor, Document, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: bliss <page.html> <descriptor.json> [selector]";

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let mut args = std::env::args().skip(1);
    let (Some(page), Some(descriptor)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };
    let selector = args.next().unwrap_or_else(|| String::from("body"));

    let config_path = std::env::var("BLISS_CONFIG").ok().map(PathBuf::from);
    let config = BlissConfig::load(config_path).unwrap_or_else(|err| {
        warn!("Failed to load bliss configuration: {err}. Using defaults.");
        BlissConfig::default()
    });

    let html = fs::read_to_string(&page).with_context(|| format!("failed to read {page}"))?;
    let json = fs::read_to_string(&descriptor)
        .with_context(|| format!("failed to read {descriptor}"))?;
    let descriptor = match Value::from(
        serde_json::from_str::<serde_json::Value>(&json)
            .with_context(|| format!("{descriptor} is not valid JSON"))?,
    ) {
        Value::Map(map) => map,
        _ => bail!("{descriptor} must contain a JSON object"),
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    let output = rt.block_on(apply(Document::with_config(&html, config), &selector, &descriptor))?;
    println!("{output}");
    Ok(())
}

async fn apply(document: Document, selector: &str, descriptor: &Descriptor) -> Result<String> {
    document.ready().await?;

    let targets = document
        .query_all(selector)
        .with_context(|| format!("cannot select {selector}"))?;
    if targets.is_empty() {
        warn!(selector, "selector matched nothing");
    }
    info!(selector, matches = targets.len(), keys = descriptor.len(), "applying descriptor");

    document.set(targets, descriptor)?;
    document.pump();
    Ok(document.to_html())
}
