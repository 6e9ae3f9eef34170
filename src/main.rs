// Page capture command line front end
//
// Captures one URL into a self-contained archive directory:
// <output>/<dataFolder>/<timeId>/index.html plus its resources.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kodegen_tools_pagecapture::CaptureOptions;
use serde_json::Value;

/// Capture a web page and its resources into an offline archive
#[derive(Parser, Debug)]
#[command(name = "kodegen-pagecapture", version, about)]
struct Args {
    /// URL of the page to capture
    url: String,

    /// Directory the archive folder is created in
    #[arg(long, short, default_value = ".")]
    output: PathBuf,

    /// JSON file holding a flat `capture.*` option map
    #[arg(long)]
    options: Option<PathBuf>,

    /// Override one option, e.g. `--set capture.script=remove`
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_setting)]
    settings: Vec<(String, Value)>,
}

/// `KEY=VALUE`, with VALUE read as JSON when it parses and as a string otherwise
fn parse_setting(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut options = match &args.options {
        Some(path) => CaptureOptions::load(path)
            .with_context(|| format!("failed to load options from {}", path.display()))?,
        None => CaptureOptions::default(),
    };
    for (key, value) in &args.settings {
        options
            .apply_setting(key, value)
            .with_context(|| format!("invalid setting {key}"))?;
    }

    tokio::fs::create_dir_all(&args.output)
        .await
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    let saved = kodegen_tools_pagecapture::capture(&args.url, args.output.clone(), options).await?;
    match &saved.path {
        Some(path) => println!("{}", path.display()),
        None => println!("{}/{}", saved.target_dir, saved.filename),
    }
    Ok(())
}
