//! Compilation options and configuration.

use crate::style::StyleCapabilities;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REFERENCE_WIDTH_PX: u32 = 600;
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Options for compiling chapter records into a document plan.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Whether figures are fetched and embedded
    pub images: bool,

    /// Whether figure captions are kept
    pub captions: bool,

    /// Which class and CSS extensions the style resolver honors
    pub style: StyleCapabilities,

    /// Widest image, in pixels; percentages scale against it
    pub reference_width_px: u32,

    /// HTTP settings for image fetches
    pub fetch: FetchOptions,
}

impl CompileOptions {
    /// Create new compile options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable image embedding.
    pub fn with_images(mut self, images: bool) -> Self {
        self.images = images;
        self
    }

    /// Drop figures without fetching them.
    pub fn without_images(mut self) -> Self {
        self.images = false;
        self
    }

    /// Enable or disable figure captions.
    pub fn with_captions(mut self, captions: bool) -> Self {
        self.captions = captions;
        self
    }

    /// Set the style resolver capabilities.
    pub fn with_style(mut self, style: StyleCapabilities) -> Self {
        self.style = style;
        self
    }

    /// Restrict styling to the class registry, `text-align` and hex colors.
    pub fn basic_css(mut self) -> Self {
        self.style = StyleCapabilities::basic();
        self
    }

    /// Set the reference image width in pixels.
    pub fn with_reference_width(mut self, px: u32) -> Self {
        self.reference_width_px = px.max(1);
        self
    }

    /// Set fetch options.
    pub fn with_fetch(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            images: true,
            captions: true,
            style: StyleCapabilities::default(),
            reference_width_px: DEFAULT_REFERENCE_WIDTH_PX,
            fetch: FetchOptions::default(),
        }
    }
}

/// HTTP client settings used by [`crate::image::HttpFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub user_agent: String,
    /// `None` disables the per-request timeout.
    pub timeout: Option<Duration>,
    /// Larger response bodies are rejected.
    pub max_bytes: u64,
}

impl FetchOptions {
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = CompileOptions::default();
        assert!(o.images && o.captions);
        assert_eq!(o.reference_width_px, 600);
        assert_eq!(o.fetch.user_agent, "Mozilla/5.0");
        assert_eq!(o.fetch.timeout, Some(Duration::from_secs(30)));
        assert_eq!(o.fetch.max_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn builder_chain() {
        let o = CompileOptions::new()
            .without_images()
            .with_captions(false)
            .basic_css()
            .with_reference_width(0)
            .with_fetch(FetchOptions::default().with_timeout(None).with_max_bytes(1024));
        assert!(!o.images && !o.captions);
        assert_eq!(o.style, StyleCapabilities::basic());
        assert_eq!(o.reference_width_px, 1);
        assert_eq!(o.fetch.timeout, None);
        assert_eq!(o.fetch.max_bytes, 1024);
    }
}
