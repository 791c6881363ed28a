//! Sequential driver: fetch the template, load the records, then generate
//! and publish one record at a time.
//!
//! The three external collaborators sit behind traits so each stage can be
//! swapped for a preview or test implementation.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};

use crate::content::{GeneratedContent, ALL_FIELDS};
use crate::error::{PageGenError, Result};
use crate::integrations::{self, IntegrationRecord};
use crate::publisher::{build_draft, DraftPage, PublishedPage};
use crate::settings::Settings;
use crate::template::Template;

/// Supplies the page template.
#[async_trait]
pub trait TemplateSource {
    async fn fetch_template(&self, page_id: u64) -> Result<Template>;
}

/// Produces copy for one integration.
#[async_trait]
pub trait ContentGenerator {
    async fn generate(&self, record: &IntegrationRecord) -> Result<GeneratedContent>;
}

/// Creates a draft page.
#[async_trait]
pub trait PagePublisher {
    async fn create_draft(&self, page: &DraftPage) -> Result<PublishedPage>;
}

/// Per-record progress. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Pending,
    Generating,
    GenerationFailed,
    Generated,
    Publishing,
    PublishFailed,
    Published,
}

impl RecordState {
    pub fn can_advance_to(self, next: RecordState) -> bool {
        use RecordState::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, GenerationFailed)
                | (Generating, Generated)
                | (Generated, Publishing)
                | (Publishing, PublishFailed)
                | (Publishing, Published)
        )
    }

    fn advance(&mut self, next: RecordState) {
        debug_assert!(
            self.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self,
            next
        );
        *self = next;
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RecordState::GenerationFailed | RecordState::PublishFailed | RecordState::Published
        )
    }

    /// Stage name for failed records.
    pub fn failed_stage(self) -> Option<&'static str> {
        match self {
            RecordState::GenerationFailed => Some("generation"),
            RecordState::PublishFailed => Some("publish"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub integration_name: String,
    pub slug: String,
    pub success: bool,
    pub url_or_error: String,
    pub state: RecordState,
}

impl PageResult {
    fn published(record: &IntegrationRecord, page: PublishedPage) -> Self {
        Self {
            integration_name: record.name.clone(),
            slug: record.slug.clone(),
            success: true,
            url_or_error: page.url,
            state: RecordState::Published,
        }
    }

    fn failed(record: &IntegrationRecord, state: RecordState, error: &PageGenError) -> Self {
        debug_assert!(state.is_terminal());
        Self {
            integration_name: record.name.clone(),
            slug: record.slug.clone(),
            success: false,
            url_or_error: error.to_string(),
            state,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<PageResult>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", "=".repeat(50));
        let _ = writeln!(
            out,
            "Summary: {}/{} pages created successfully ({} failed)",
            self.succeeded(),
            self.results.len(),
            self.failed()
        );
        let _ = writeln!(out, "{}", "=".repeat(50));
        for r in &self.results {
            match r.state.failed_stage() {
                None => {
                    let _ = writeln!(out, "  ✓ {} [{}]: {}", r.integration_name, r.slug, r.url_or_error);
                }
                Some(stage) => {
                    let _ = writeln!(
                        out,
                        "  ✗ {} [{}] ({} failed): {}",
                        r.integration_name, r.slug, stage, r.url_or_error
                    );
                }
            }
        }
        out
    }

    pub fn print(&self) {
        println!("\n{}", self.render());
    }

    /// Write the summary as JSON so failed rows can be re-run.
    pub fn write_report(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Wrote run report to {}", path.display());
        Ok(())
    }
}

pub struct RunOptions {
    pub template_page_id: u64,
    pub csv_path: PathBuf,
    pub title_template: String,
    pub limit: Option<usize>,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings, limit: Option<usize>) -> Self {
        Self {
            template_page_id: settings.wordpress_template_page_id,
            csv_path: settings.csv_file_path.clone(),
            title_template: settings.page_title_template.clone(),
            limit,
            show_progress: true,
        }
    }
}

pub struct Pipeline<'a, T, G, P> {
    source: &'a T,
    generator: &'a G,
    publisher: &'a P,
    options: RunOptions,
}

impl<'a, T, G, P> Pipeline<'a, T, G, P>
where
    T: TemplateSource + Sync,
    G: ContentGenerator + Sync,
    P: PagePublisher + Sync,
{
    pub fn new(source: &'a T, generator: &'a G, publisher: &'a P, options: RunOptions) -> Self {
        Self {
            source,
            generator,
            publisher,
            options,
        }
    }

    /// Run every record. Template and CSV failures abort with `Err`; record
    /// failures are collected into the summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = Utc::now();

        println!(
            "\n[1/4] Fetching template page (ID: {})...",
            self.options.template_page_id
        );
        let template = self
            .source
            .fetch_template(self.options.template_page_id)
            .await?;
        report_placeholders(&template);

        println!(
            "\n[2/4] Reading integrations from {}...",
            self.options.csv_path.display()
        );
        let mut records = integrations::load(&self.options.csv_path)?;
        if let Some(limit) = self.options.limit {
            records.truncate(limit);
        }

        println!("\n[3/4] Generating content and creating {} pages...\n", records.len());
        let pb = self.progress_bar(records.len());
        let mut results = Vec::with_capacity(records.len());

        for (i, record) in records.iter().enumerate() {
            pb.set_message(record.name.clone());
            pb.suspend(|| println!("Processing {}/{}: {}", i + 1, records.len(), record.name));
            let result = self.process_record(&template, record).await;
            let mark = if result.success { "✓" } else { "✗" };
            pb.suspend(|| println!("  {} {}\n", mark, result.url_or_error));
            results.push(result);
            pb.inc(1);
        }
        pb.finish_and_clear();

        println!("\n[4/4] Summary");
        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            results,
        };
        info!(
            "Run finished: {} ok, {} failed",
            summary.succeeded(),
            summary.failed()
        );
        Ok(summary)
    }

    async fn process_record(&self, template: &Template, record: &IntegrationRecord) -> PageResult {
        let mut state = RecordState::Pending;

        state.advance(RecordState::Generating);
        let content = match self.generator.generate(record).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Generation failed for {}: {}", record.name, e);
                state.advance(RecordState::GenerationFailed);
                return PageResult::failed(record, state, &e);
            }
        };
        state.advance(RecordState::Generated);

        let draft = build_draft(template, &content, record, &self.options.title_template);

        state.advance(RecordState::Publishing);
        match self.publisher.create_draft(&draft).await {
            Ok(page) => {
                state.advance(RecordState::Published);
                info!("Published {} as {} (page id {:?})", record.slug, page.url, page.id);
                PageResult::published(record, page)
            }
            Err(e) => {
                warn!("Publish failed for {}: {}", record.name, e);
                state.advance(RecordState::PublishFailed);
                PageResult::failed(record, state, &e)
            }
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    }
}

fn report_placeholders(template: &Template) {
    let placeholders = template.placeholders();
    info!(
        "Template '{}' (page {}) has {} placeholders: {:?}",
        template.title,
        template.page_id,
        placeholders.len(),
        placeholders
    );
    let unknown: Vec<&str> = placeholders
        .iter()
        .map(String::as_str)
        .filter(|p| !ALL_FIELDS.contains(p))
        .collect();
    if !unknown.is_empty() {
        warn!(
            "Template placeholders with no generated value (left as-is): {}",
            unknown.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tempfile::NamedTempFile;

    const TEMPLATE: &str = "<h1>{{HEADLINE}}</h1><h2>{{SUBHEADLINE}}</h2>\
        <img src=\"{{HERO_IMAGE}}\"><p>{{INTEGRATION_NAME}}</p><p>{{UNKNOWN_FIELD}}</p>";

    struct FakeSource {
        template: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TemplateSource for FakeSource {
        async fn fetch_template(&self, page_id: u64) -> Result<Template> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.template {
                Some(body) => Ok(Template::new(page_id, "Integration template", body.clone())),
                None => Err(PageGenError::TemplateNotFound { page_id }),
            }
        }
    }

    /// Fails for any integration named in `fail_for`.
    struct FakeGenerator {
        fail_for: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentGenerator for FakeGenerator {
        async fn generate(&self, record: &IntegrationRecord) -> Result<GeneratedContent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.iter().any(|n| *n == record.name) {
                return Err(PageGenError::GenerationApiError(
                    "Anthropic API error 500: simulated outage".into(),
                ));
            }
            Ok(GeneratedContent {
                headline: format!("{} headline", record.name),
                subheadline: "Recognition where your team works".into(),
                feature_1_title: "Shout-outs".into(),
                feature_1_desc: "Send kudos from anywhere.".into(),
                feature_2_title: "Rewards".into(),
                feature_2_desc: "Redeem points instantly.".into(),
                hero_image: "https://img.example/hero.png".into(),
                integration_name: record.name.clone(),
            })
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        pages: Mutex<Vec<DraftPage>>,
        reject_slug: Option<&'static str>,
    }

    #[async_trait]
    impl PagePublisher for FakePublisher {
        async fn create_draft(&self, page: &DraftPage) -> Result<PublishedPage> {
            if self.reject_slug == Some(page.slug.as_str()) {
                return Err(PageGenError::PublishError(
                    "HTTP 400 rest_duplicate_slug".into(),
                ));
            }
            let mut pages = self.pages.lock().unwrap();
            pages.push(page.clone());
            Ok(PublishedPage {
                id: Some(100 + pages.len() as u64),
                url: format!("https://site.example/{}/", page.slug),
            })
        }
    }

    fn csv_file(rows: &[&str]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "integration_name,category,slug").unwrap();
        for row in rows {
            writeln!(f, "{}", row).unwrap();
        }
        f
    }

    fn options(csv: &Path) -> RunOptions {
        RunOptions {
            template_page_id: 42,
            csv_path: csv.to_path_buf(),
            title_template: "Bucketlist + {{INTEGRATION_NAME}} Integration".into(),
            limit: None,
            show_progress: false,
        }
    }

    fn source() -> FakeSource {
        FakeSource {
            template: Some(TEMPLATE.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn generator(fail_for: Vec<&'static str>) -> FakeGenerator {
        FakeGenerator {
            fail_for,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn single_row_succeeds() {
        let csv = csv_file(&["Slack,Communication,bucketlist-slack-integration"]);
        let (src, gen, publ) = (source(), generator(vec![]), FakePublisher::default());

        let summary = Pipeline::new(&src, &gen, &publ, options(csv.path()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.results.len(), 1);
        let r = &summary.results[0];
        assert_eq!(r.state, RecordState::Published);
        assert_eq!(r.url_or_error, "https://site.example/bucketlist-slack-integration/");
        let text = summary.render();
        assert!(text.contains("1/1"), "{}", text);
        assert!(text.contains("https://site.example/bucketlist-slack-integration/"));

        let pages = publ.pages.lock().unwrap();
        assert_eq!(pages[0].title, "Bucketlist + Slack Integration");
        assert_eq!(pages[0].status, "draft");
        assert_eq!(pages[0].slug, "bucketlist-slack-integration");
    }

    #[tokio::test]
    async fn generation_failure_is_record_scoped() {
        let csv = csv_file(&[
            "Slack,Communication,bucketlist-slack-integration",
            "Workday,HRIS,bucketlist-workday-integration",
        ]);
        let (src, gen, publ) = (source(), generator(vec!["Workday"]), FakePublisher::default());

        let summary = Pipeline::new(&src, &gen, &publ, options(csv.path()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
        let failed = &summary.results[1];
        assert_eq!(failed.integration_name, "Workday");
        assert_eq!(failed.state, RecordState::GenerationFailed);
        assert!(failed.url_or_error.contains("simulated outage"));

        let text = summary.render();
        assert!(text.contains("1/2"), "{}", text);
        assert!(text.contains("Workday"));
        assert!(text.contains("generation failed"));
        assert_eq!(publ.pages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_template_aborts_before_records() {
        let csv = csv_file(&["Slack,Communication,bucketlist-slack-integration"]);
        let src = FakeSource {
            template: None,
            calls: AtomicUsize::new(0),
        };
        let (gen, publ) = (generator(vec![]), FakePublisher::default());

        let err = Pipeline::new(&src, &gen, &publ, options(csv.path()))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, PageGenError::TemplateNotFound { page_id: 42 }));
        assert_eq!(gen.calls.load(Ordering::SeqCst), 0);
        assert!(publ.pages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_placeholder_survives() {
        let csv = csv_file(&["Slack,Communication,bucketlist-slack-integration"]);
        let (src, gen, publ) = (source(), generator(vec![]), FakePublisher::default());

        Pipeline::new(&src, &gen, &publ, options(csv.path()))
            .run()
            .await
            .unwrap();

        let pages = publ.pages.lock().unwrap();
        let content = &pages[0].content;
        assert!(content.contains("{{UNKNOWN_FIELD}}"));
        assert!(content.contains("<h1>Slack headline</h1>"));
        assert!(content.contains("https://img.example/hero.png"));
        assert!(!content.contains("{{HEADLINE}}"));
    }

    #[tokio::test]
    async fn records_do_not_leak_into_each_other() {
        let csv = csv_file(&["Slack,Communication,slack", "Workday,HRIS,workday"]);
        let (src, gen, publ) = (source(), generator(vec![]), FakePublisher::default());

        Pipeline::new(&src, &gen, &publ, options(csv.path()))
            .run()
            .await
            .unwrap();

        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
        let pages = publ.pages.lock().unwrap();
        assert!(pages[1].content.contains("Workday headline"));
        assert!(!pages[1].content.contains("Slack"));
    }

    #[tokio::test]
    async fn publish_failure_is_record_scoped() {
        let csv = csv_file(&["Slack,Communication,slack", "Workday,HRIS,workday"]);
        let (src, gen) = (source(), generator(vec![]));
        let publ = FakePublisher {
            reject_slug: Some("slack"),
            ..Default::default()
        };

        let summary = Pipeline::new(&src, &gen, &publ, options(csv.path()))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.results[0].state, RecordState::PublishFailed);
        assert_eq!(summary.results[1].state, RecordState::Published);
        assert!(summary.render().contains("publish failed"));
    }

    #[tokio::test]
    async fn malformed_csv_aborts() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "integration_name,slug").unwrap();
        writeln!(f, "Slack,slack").unwrap();
        let (src, gen, publ) = (source(), generator(vec![]), FakePublisher::default());

        let err = Pipeline::new(&src, &gen, &publ, options(f.path()))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, PageGenError::MalformedInput(_)));
        assert_eq!(gen.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn limit_truncates_records() {
        let csv = csv_file(&["A,X,a", "B,X,b", "C,X,c"]);
        let (src, gen, publ) = (source(), generator(vec![]), FakePublisher::default());
        let mut opts = options(csv.path());
        opts.limit = Some(2);

        let summary = Pipeline::new(&src, &gen, &publ, opts).run().await.unwrap();
        assert_eq!(summary.results.len(), 2);
        assert_eq!(gen.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn report_round_trips_to_disk() {
        let csv = csv_file(&["Slack,Communication,slack"]);
        let (src, gen, publ) = (source(), generator(vec![]), FakePublisher::default());
        let summary = Pipeline::new(&src, &gen, &publ, options(csv.path()))
            .run()
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        summary.write_report(&path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["results"][0]["state"], "published");
        assert_eq!(json["results"][0]["success"], true);
    }

    #[test]
    fn state_machine_moves_forward_only() {
        use RecordState::*;
        assert!(Pending.can_advance_to(Generating));
        assert!(Generating.can_advance_to(GenerationFailed));
        assert!(Publishing.can_advance_to(Published));
        assert!(!Published.can_advance_to(Pending));
        assert!(!GenerationFailed.can_advance_to(Publishing));
        assert!(!Pending.can_advance_to(Published));
        assert!(Published.is_terminal() && PublishFailed.is_terminal());
        assert!(!Generated.is_terminal());
    }
}
