use super::Rasterizer;
use crate::error::{AppError, Result};
use crate::files::EphemeralFile;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Renders PDF pages with poppler's `pdftoppm`
pub struct PopplerRasterizer {
    /// Path to the pdftoppm executable
    binary: PathBuf,
    timeout: Duration,
}

impl PopplerRasterizer {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    fn spawn_error(&self, e: std::io::Error) -> AppError {
        match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => AppError::RasterizerUnavailable(
                format!("cannot run {}: {}", self.binary.display(), e),
            ),
            _ => AppError::IoError(e),
        }
    }

    /// Run pdftoppm once and check that it left `output` behind
    async fn run(
        &self,
        pdf: &Path,
        page: u32,
        dpi: u32,
        output_prefix: &Path,
        output: &Path,
    ) -> Result<()> {
        let mut command = Command::new(&self.binary);
        command
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg("-singlefile")
            .arg(pdf)
            .arg(output_prefix)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| AppError::ConversionTimedOut(self.timeout))?
            .map_err(|e| self.spawn_error(e))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(exit_error(result.status, stderr.trim()));
        }

        if !tokio::fs::try_exists(output).await? {
            return Err(AppError::ConversionFailed(format!(
                "pdftoppm reported success but wrote no image at {}",
                output.display()
            )));
        }

        Ok(())
    }
}

/// Map a failed pdftoppm exit to an error.
///
/// pdftoppm exits with 1 when the PDF cannot be opened, 2 when the output
/// file cannot be written and 3 on a permissions (password) problem.
fn exit_error(status: ExitStatus, stderr: &str) -> AppError {
    match status.code() {
        Some(1) => AppError::UnprocessablePdf(format!(
            "the file could not be read as a PDF ({})",
            stderr
        )),
        Some(3) => AppError::UnprocessablePdf(
            "the PDF is password-protected or does not allow rendering".to_string(),
        ),
        Some(2) => AppError::IoError(std::io::Error::other(format!(
            "rasterizer could not write its output: {}",
            stderr
        ))),
        _ => AppError::ConversionFailed(format!("pdftoppm exited with {}: {}", status, stderr)),
    }
}

/// `-singlefile` makes pdftoppm write exactly `<prefix>.png`
fn output_path(prefix: &Path) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(".png");
    PathBuf::from(name)
}

#[async_trait]
impl Rasterizer for PopplerRasterizer {
    fn name(&self) -> &'static str {
        "pdftoppm"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-v")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    async fn render_page(
        &self,
        pdf: &Path,
        page: u32,
        dpi: u32,
        output_prefix: &Path,
    ) -> Result<PathBuf> {
        // Covers partial output left behind by a failed or killed run.
        let output = EphemeralFile::new(output_path(output_prefix));

        info!(
            "Rendering page {} of {} at {} DPI using pdftoppm",
            page,
            pdf.display(),
            dpi
        );

        match self.run(pdf, page, dpi, output_prefix, output.path()).await {
            Ok(()) => {
                debug!("Rendered page written to {}", output.path().display());
                Ok(output.keep())
            }
            Err(e) => {
                output.remove().await;
                Err(e)
            }
        }
    }
}
