//! WordPress REST client: template fetch, draft creation and the
//! credential check used by `wp_pagegen check`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{PageGenError, Result};
use crate::http::{self, AttemptError};
use crate::pipeline::{PagePublisher, TemplateSource};
use crate::publisher::{DraftPage, PublishedPage};
use crate::settings::Settings;
use crate::template::Template;

pub struct WpClient {
    client: Client,
    site_url: String,
    api_base: String,
    username: String,
    app_password: String,
    backoff: Duration,
}

#[derive(Debug, Deserialize)]
struct Rendered {
    #[serde(default)]
    raw: Option<String>,
    #[serde(default)]
    rendered: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    id: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    link: String,
    title: Option<Rendered>,
    content: Option<Rendered>,
}

#[derive(Debug, Deserialize)]
struct WpErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct WpUser {
    pub id: u64,
    pub name: String,
}

impl WpClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = http::build_client(settings.http_timeout())
            .map_err(|e| PageGenError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self::with_client(
            client,
            &settings.wordpress_site_url,
            &settings.wordpress_username,
            &settings.wordpress_app_password,
        ))
    }

    fn with_client(client: Client, site_url: &str, username: &str, app_password: &str) -> Self {
        let site_url = site_url.trim_end_matches('/').to_string();
        Self {
            api_base: format!("{}/wp-json/wp/v2", site_url),
            site_url,
            client,
            username: username.to_string(),
            app_password: app_password.to_string(),
            backoff: http::default_backoff(),
        }
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.username, Some(&self.app_password))
    }

    /// GET the site root. Returns the HTTP status.
    pub async fn ping_site(&self) -> Result<u16> {
        let resp = self
            .client
            .get(&self.site_url)
            .send()
            .await
            .map_err(|e| PageGenError::TemplateFetch(format!("site unreachable: {}", e)))?;
        Ok(resp.status().as_u16())
    }

    pub async fn current_user(&self) -> Result<WpUser> {
        let resp = self
            .authed(self.client.get(format!("{}/users/me", self.api_base)))
            .send()
            .await
            .map_err(|e| PageGenError::TemplateFetch(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PageGenError::AuthenticationError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        resp.json()
            .await
            .map_err(|e| PageGenError::TemplateFetch(format!("unexpected users/me body: {}", e)))
    }

    pub async fn get_template(&self, page_id: u64) -> Result<Template> {
        let url = format!("{}/pages/{}", self.api_base, page_id);
        info!("Fetching template page {}", page_id);
        let resp = self
            .authed(self.client.get(&url).query(&[("context", "edit")]))
            .send()
            .await
            .map_err(|e| PageGenError::TemplateFetch(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(PageGenError::TemplateNotFound { page_id });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(PageGenError::AuthenticationError {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
            }
            return Err(PageGenError::TemplateFetch(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_message(&body)
            )));
        }

        let page: PageResponse = resp
            .json()
            .await
            .map_err(|e| PageGenError::TemplateFetch(format!("unexpected page body: {}", e)))?;
        if page.status == "trash" {
            return Err(PageGenError::TemplateNotFound { page_id });
        }

        let body = page
            .content
            .map(|c| c.raw.unwrap_or(c.rendered))
            .ok_or_else(|| PageGenError::TemplateFetch("page has no content field".into()))?;
        let title = page
            .title
            .map(|t| t.raw.unwrap_or(t.rendered))
            .unwrap_or_default();
        info!("✓ Template page {} fetched ({} bytes)", page.id, body.len());
        Ok(Template::new(page.id, title, body))
    }

    pub async fn create_page(&self, page: &DraftPage) -> Result<PublishedPage> {
        let url = format!("{}/pages", self.api_base);
        let label = format!("publish {}", page.slug);
        http::with_retry(&label, self.backoff, || self.try_create(&url, page))
            .await
            .map_err(|e| PageGenError::PublishError(e.to_string()))
    }

    async fn try_create(
        &self,
        url: &str,
        page: &DraftPage,
    ) -> std::result::Result<PublishedPage, AttemptError> {
        let resp = self
            .authed(self.client.post(url))
            .json(page)
            .send()
            .await
            .map_err(|e| {
                // A timed-out POST may still have created the page.
                if e.is_connect() {
                    AttemptError::Transient(e.to_string())
                } else {
                    AttemptError::Permanent(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let msg = format!("HTTP {}: {}", status.as_u16(), error_message(&body));
            return Err(if http::is_transient_gateway_status(status) {
                AttemptError::Transient(msg)
            } else {
                AttemptError::Permanent(msg)
            });
        }

        let created: PageResponse = resp
            .json()
            .await
            .map_err(|e| AttemptError::Permanent(format!("unexpected create body: {}", e)))?;
        debug!("Created page {} with status {}", created.id, created.status);
        Ok(PublishedPage {
            id: Some(created.id),
            url: created.link,
        })
    }
}

/// Prefer WordPress's `{code, message}` error shape, else the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<WpErrorBody>(body) {
        Ok(err) => format!("{} ({})", err.message, err.code),
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl TemplateSource for WpClient {
    async fn fetch_template(&self, page_id: u64) -> Result<Template> {
        self.get_template(page_id).await
    }
}

#[async_trait]
impl PagePublisher for WpClient {
    async fn create_draft(&self, page: &DraftPage) -> Result<PublishedPage> {
        self.create_page(page).await
    }
}
