mod cli;

use media_acquire_lib::config::AcquireConfig;
use media_acquire_lib::downloader::format_selector::{FormatSelector, MAX_PRESENTED};
use media_acquire_lib::downloader::{Acquirer, MediaInfo, TrimSpec};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug for our crates with --verbose
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "media_acquire=debug,media_acquire_lib=debug,info".to_string()
        } else {
            "info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let acquirer = Acquirer::from_config(&config).context("Invalid configuration")?;

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Info { url, json } => rt.block_on(show_info(&acquirer, &url, json)),
        Commands::Download {
            url,
            format,
            start,
            end,
        } => {
            let trim = start.zip(end).map(|(s, e)| TrimSpec::new(s, e));
            rt.block_on(download(&acquirer, &url, format.as_deref(), trim))
        }
        Commands::Stream {
            url,
            format,
            output,
        } => rt.block_on(stream(&acquirer, &url, format.as_deref(), output)),
    }
}

fn load_config(cli: &Cli) -> Result<AcquireConfig> {
    let mut config = AcquireConfig::from_env()?;

    if cli.backend.is_some() {
        config = config.with_backend_url(cli.backend.clone());
    }
    if let Some(mode) = &cli.resolver {
        config = config.with_resolver_mode(mode.parse()?);
    }
    if cli.proxy.is_some() {
        config = config.with_proxy(cli.proxy.clone());
    }

    Ok(config)
}

async fn show_info(acquirer: &Acquirer, url: &str, json: bool) -> Result<()> {
    let mut session = acquirer.session();
    let info = session
        .start(url)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(info.as_ref())?);
        return Ok(());
    }

    print_info(&info);
    Ok(())
}

fn print_info(info: &MediaInfo) {
    println!("Title:    {}", info.title);
    println!("Uploader: {}", info.uploader);
    if info.has_known_duration() {
        println!(
            "Duration: {}",
            FormatSelector::format_duration(info.duration_seconds)
        );
    }
    if !info.thumbnail_url.is_empty() {
        println!("Poster:   {}", info.thumbnail_url);
    }
    println!("\nFormats:");
    for option in FormatSelector::build_quality_options(info) {
        let marker = if option.is_default { "*" } else { " " };
        println!(
            " {} {:<12} {:<10} {}",
            marker, option.format_id, option.label, option.detail
        );
    }
    if info.encodings.len() > MAX_PRESENTED {
        println!("   ... {} more", info.encodings.len() - MAX_PRESENTED);
    }
}

async fn download(
    acquirer: &Acquirer,
    url: &str,
    format: Option<&str>,
    trim: Option<TrimSpec>,
) -> Result<()> {
    let mut session = acquirer.session();
    let info = session
        .start(url)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let format_id = match format {
        Some(f) => f.to_string(),
        None => FormatSelector::default_selection(&info)
            .map(str::to_string)
            .context("No formats available")?,
    };

    tracing::info!(title = %info.title, format = %format_id, "Submitting download");
    session
        .download_to_completion(&format_id, trim)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let result_url = session
        .check_ready()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let snap = session.snapshot();
    if let Some(name) = snap.result_filename {
        println!("{}", name);
    }
    println!("{}", result_url);
    Ok(())
}

async fn stream(
    acquirer: &Acquirer,
    url: &str,
    format: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut session = acquirer.session();
    let info = session
        .start(url)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    // fail before anything is written to disk
    session
        .direct_url(format)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let path = match output {
        Some(path) => path,
        None => {
            let dir = dirs::download_dir()
                .or_else(|| std::env::current_dir().ok())
                .context("Could not determine an output directory")?;
            dir.join(output_file_name(&info, format))
        }
    };

    let mut file = tokio::fs::File::create(&path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let bytes = match session.stream_direct(format, &mut file).await {
        Ok(bytes) => bytes,
        Err(e) => {
            drop(file);
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %rm, "Failed to remove partial file");
            }
            anyhow::bail!(e.user_message());
        }
    };

    tracing::info!(path = %path.display(), bytes, "Saved");
    println!("{}", path.display());
    Ok(())
}

/// `<title>.<container>` with path separators and control characters removed
fn output_file_name(info: &MediaInfo, format: Option<&str>) -> String {
    let container = format
        .and_then(|f| info.encoding(f))
        .or_else(|| info.encodings.first())
        .map(|e| e.container.as_str())
        .unwrap_or("mp4");

    let stem: String = info
        .title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let stem = stem.trim();
    let stem = if stem.is_empty() { "video" } else { stem };

    format!("{}.{}", stem, container)
}
