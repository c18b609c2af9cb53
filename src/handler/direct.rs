//! Fallback handler that archives the response body as-is.

use async_trait::async_trait;

use crate::network::media::parse_media_type;

use super::{
    DownloadHandler, DownloadResponse, HandleError, HandleStep, SourceContent, infer_file_name,
};

/// Accepts any response whose media type is not excluded.
#[derive(Debug, Clone, Default)]
pub struct DirectHandler {
    exclude_media_types: Vec<String>,
}

impl DirectHandler {
    /// Creates a handler refusing the given media types.
    #[must_use]
    pub fn new(exclude_media_types: Vec<String>) -> Self {
        let exclude_media_types = exclude_media_types
            .iter()
            .filter_map(|media_type| parse_media_type(media_type))
            .collect();
        Self {
            exclude_media_types,
        }
    }
}

#[async_trait]
impl DownloadHandler for DirectHandler {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn handle(&self, response: &DownloadResponse) -> Result<HandleStep, HandleError> {
        let media_type = response.media_type();
        if self.exclude_media_types.contains(&media_type) {
            tracing::debug!(media_type = %media_type, url = %response.url, "Media type excluded");
            return Ok(HandleStep::NotHandled);
        }
        let file_name = infer_file_name(&response.url, &response.headers, &media_type);
        Ok(HandleStep::Handled(SourceContent {
            content: response.body.clone(),
            media_type,
            file_name,
        }))
    }
}
