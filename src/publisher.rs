use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::content::GeneratedContent;
use crate::error::Result;
use crate::integrations::IntegrationRecord;
use crate::pipeline::PagePublisher;
use crate::template::{substitute, Template};

pub const DRAFT_STATUS: &str = "draft";

/// Body of a WordPress `POST /pages` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftPage {
    pub title: String,
    pub content: String,
    pub slug: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPage {
    pub id: Option<u64>,
    pub url: String,
}

/// Merge generated copy into the template and title.
pub fn build_draft(
    template: &Template,
    content: &GeneratedContent,
    record: &IntegrationRecord,
    title_template: &str,
) -> DraftPage {
    DraftPage {
        title: substitute(title_template, |field| content.get(field)),
        content: template.render(|field| content.get(field)),
        slug: record.slug.clone(),
        status: DRAFT_STATUS.to_string(),
    }
}

/// Publisher for `--preview`: logs the draft instead of creating it.
pub struct DryRunPublisher {
    site_url: String,
}

impl DryRunPublisher {
    pub fn new(site_url: &str) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PagePublisher for DryRunPublisher {
    async fn create_draft(&self, page: &DraftPage) -> Result<PublishedPage> {
        info!(
            title = %page.title,
            slug = %page.slug,
            bytes = page.content.len(),
            "Preview: draft not sent"
        );
        Ok(PublishedPage {
            id: None,
            url: format!("{}/{}/ (preview)", self.site_url, page.slug),
        })
    }
}
