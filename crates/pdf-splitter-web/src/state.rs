use anyhow::{Context, Result};
use pdf_splitter_core::{AppConfig, PdfSplitter};

/// Global application state
pub struct AppState {
    pub splitter: PdfSplitter,
}

impl AppState {
    /// Build the splitter and make sure its storage layout exists.
    pub async fn new(config: AppConfig) -> Result<Self> {
        let splitter = PdfSplitter::new(config).context("Invalid configuration")?;
        splitter.store().ensure_layout().await.with_context(|| {
            format!(
                "Failed to prepare data directory {}",
                splitter.store().root().display()
            )
        })?;

        Ok(Self { splitter })
    }
}
