use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "media-acquire")]
#[command(author, version, about = "Resolve video pages and fetch them through a transcode backend")]
pub struct Cli {
    /// Base URL of the metadata/job backend
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Resolver strategy: scrape, service or auto
    #[arg(long, global = true)]
    pub resolver: Option<String>,

    /// SOCKS5/HTTP proxy URL
    #[arg(long, global = true)]
    pub proxy: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a page and list the available encodings
    Info {
        url: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Submit a download job and wait for the result URL
    Download {
        url: String,

        /// Encoding to request (defaults to the first offered)
        #[arg(short, long)]
        format: Option<String>,

        /// Trim start in seconds
        #[arg(long, requires = "end")]
        start: Option<f64>,

        /// Trim end in seconds
        #[arg(long, requires = "start")]
        end: Option<f64>,
    },

    /// Stream the media directly to a file, no backend job
    Stream {
        url: String,

        /// Encoding to fetch (defaults to the first offered)
        #[arg(short, long)]
        format: Option<String>,

        /// Output file (defaults to the Downloads directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
