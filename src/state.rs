use std::sync::Arc;

use crate::config::SiteConfig;
use crate::content::ContentService;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub content: ContentService,
    pub site: Arc<SiteConfig>,
}

impl AppState {
    pub fn new(content: ContentService, site: SiteConfig) -> Self {
        Self {
            content,
            site: Arc::new(site),
        }
    }
}
