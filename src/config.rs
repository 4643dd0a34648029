use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from flags or the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "pagecast")]
#[command(about = "Render the first page of a PDF to PNG and re-save edited page images")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "PAGECAST_ADDR", default_value = "0.0.0.0:8000")]
    pub addr: String,

    /// Path to the pdftoppm binary (or a name resolved through PATH)
    #[arg(long, env = "PAGECAST_RASTERIZER_PATH", default_value = "pdftoppm")]
    pub rasterizer_path: PathBuf,

    /// Working directory for uploaded PDFs and rendered pages
    #[arg(long, env = "PAGECAST_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Directory holding index.html, editor.html and the /static assets
    #[arg(long, env = "PAGECAST_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,

    /// Upper bound on a single rasterizer run, in seconds
    #[arg(long, env = "PAGECAST_CONVERSION_TIMEOUT_SECS", default_value_t = 120)]
    pub conversion_timeout_secs: u64,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "PAGECAST_MAX_BODY_BYTES", default_value_t = 64 * 1024 * 1024)]
    pub max_body_bytes: usize,
}

impl Config {
    /// Create the output directory if it does not exist yet
    pub fn prepare_output_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.output_dir)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }
}
