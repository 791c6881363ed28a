mod content;
mod error;
mod generator;
mod http;
mod integrations;
mod pipeline;
mod publisher;
mod settings;
mod template;
mod wordpress;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::generator::AnthropicGenerator;
use crate::pipeline::{Pipeline, RunOptions};
use crate::publisher::DryRunPublisher;
use crate::settings::Settings;
use crate::wordpress::WpClient;

#[derive(Parser)]
#[command(
    name = "wp_pagegen",
    about = "Generate WordPress integration landing pages from a CSV using an LLM"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Generate content but do not create pages
    #[arg(long)]
    preview: bool,

    /// Max rows to process (default: all)
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check site reachability, credentials and template access
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let settings = Settings::from_env().context("Failed to load configuration")?;
    info!(settings = ?settings, "Configuration loaded");

    let result = match &cli.command {
        Some(Commands::Check) => check_connection(&settings).await,
        None => generate_pages(&settings, &cli).await,
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn generate_pages(settings: &Settings, cli: &Cli) -> anyhow::Result<()> {
    println!("\n=== WordPress AI Landing Page Generator ===");
    if cli.preview {
        println!("\n*** PREVIEW MODE - No WordPress pages will be created ***");
    }

    let wp = WpClient::new(settings)?;
    let generator = AnthropicGenerator::new(settings)?;
    info!("Using model {}", generator.model_name());
    let options = RunOptions::from_settings(settings, cli.limit);

    let summary = if cli.preview {
        let dry_run = DryRunPublisher::new(&settings.wordpress_site_url);
        Pipeline::new(&wp, &generator, &dry_run, options).run().await?
    } else {
        Pipeline::new(&wp, &generator, &wp, options).run().await?
    };

    summary.print();
    if let Some(path) = &cli.report {
        summary
            .write_report(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }
    Ok(())
}

async fn check_connection(settings: &Settings) -> anyhow::Result<()> {
    println!("\n=== Testing WordPress Connection ===\n");
    println!("Site URL: {}", settings.wordpress_site_url);
    println!("Username: {}", settings.wordpress_username);
    println!("Template Page ID: {}\n", settings.wordpress_template_page_id);

    let wp = WpClient::new(settings)?;

    println!("[1/3] Checking site accessibility...");
    let status = wp.ping_site().await.context("Cannot reach site")?;
    println!("✓ Site is reachable (Status: {})\n", status);

    println!("[2/3] Testing authentication...");
    let user = wp
        .current_user()
        .await
        .context("Authentication failed; check username and application password")?;
    println!("✓ Authentication successful");
    println!("  Logged in as: {} (ID {})\n", user.name, user.id);

    println!("[3/3] Checking template page access...");
    let template = wp
        .get_template(settings.wordpress_template_page_id)
        .await
        .context("Cannot access template page; check WORDPRESS_TEMPLATE_PAGE_ID")?;
    println!("✓ Template page accessible");
    println!("  Page Title: {}", template.title);
    println!("  Placeholders: {}\n", template.placeholders().len());

    println!("=== All Tests Passed ✓ ===");
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
