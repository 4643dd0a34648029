pub mod image;
mod poppler;

pub use poppler::PopplerRasterizer;

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Resolution used for every rendered page
pub const RENDER_DPI: u32 = 400;

/// Pages are numbered from 1; only the first one is served
pub const FIRST_PAGE: u32 = 1;

/// Trait that all PDF rasterizers must implement
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Human-readable name for logs and the info endpoint
    fn name(&self) -> &'static str;

    /// Check if the rasterizer can be run (binary present and executable)
    async fn is_available(&self) -> bool;

    /// Render one page of `pdf` to a PNG.
    ///
    /// The image is written to `<output_prefix>.png` and that path is
    /// returned. The caller owns the file from then on.
    async fn render_page(
        &self,
        pdf: &Path,
        page: u32,
        dpi: u32,
        output_prefix: &Path,
    ) -> Result<PathBuf>;
}
