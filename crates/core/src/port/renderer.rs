// Report Renderer Port

use crate::domain::StagingRecord;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer has no backend for this format
    #[error("Rendering not supported: {0}")]
    Unsupported(String),

    #[error("Rendering failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait ResultRenderer: Send + Sync {
    async fn render_html(&self, record: &StagingRecord) -> Result<String, RenderError>;

    async fn render_png(&self, html: &str) -> Result<Vec<u8>, RenderError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Renders a one-line summary and fake PNG bytes
    #[derive(Default)]
    pub struct StubRenderer {
        pub png_supported: bool,
    }

    impl StubRenderer {
        pub fn new() -> Self {
            Self {
                png_supported: true,
            }
        }

        pub fn html_only() -> Self {
            Self {
                png_supported: false,
            }
        }
    }

    #[async_trait]
    impl ResultRenderer for StubRenderer {
        async fn render_html(&self, record: &StagingRecord) -> Result<String, RenderError> {
            Ok(format!(
                "<html><body>{} ({} paid, {} organic)</body></html>",
                record.query,
                record.content.paid.len(),
                record.content.organic.len()
            ))
        }

        async fn render_png(&self, html: &str) -> Result<Vec<u8>, RenderError> {
            if !self.png_supported {
                return Err(RenderError::Unsupported("png".to_string()));
            }
            let mut bytes = b"\x89PNG".to_vec();
            bytes.extend_from_slice(html.as_bytes());
            Ok(bytes)
        }
    }
}
