use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "image-translator-rust",
    version,
    about = "Translate the text inside an image and redraw it in place"
)]
struct Cli {
    /// Image path or http(s) URL
    image_source: String,

    /// Target language (default: en)
    #[arg(short = 'l', long = "lang", default_value = "en")]
    lang: String,

    /// Write the PNG here instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Write merged line boxes (lines.png, lines.json) into this directory
    #[arg(long = "debug-boxes")]
    debug_boxes: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    image_translator_rust::logging::init(cli.verbose)?;

    let png = image_translator_rust::run(image_translator_rust::Config {
        image_source: cli.image_source,
        lang: cli.lang,
        settings_path: cli.read_settings,
        debug_boxes: cli.debug_boxes,
    })
    .await?;

    match cli.output {
        Some(path) => {
            std::fs::write(&path, &png).with_context(|| format!("failed to write {}", path))?
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&png)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
