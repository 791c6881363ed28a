use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PageGenError, Result};

const REQUIRED_COLUMNS: [&str; 3] = ["integration_name", "category", "slug"];

/// One CSV row: a product or service to build a landing page for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationRecord {
    pub name: String,
    pub category: String,
    pub slug: String,
}

/// Load integration records from a CSV file, preserving file order.
pub fn load(path: &Path) -> Result<Vec<IntegrationRecord>> {
    if !path.exists() {
        return Err(PageGenError::FileNotFound(path.to_path_buf()));
    }
    let file = File::open(path)
        .map_err(|e| PageGenError::MalformedInput(format!("{}: {}", path.display(), e)))?;
    let records = parse(file)?;
    info!("Loaded {} integrations from {}", records.len(), path.display());
    Ok(records)
}

/// Parse CSV with a header row. Columns beyond the required three are ignored.
pub fn parse<R: Read>(input: R) -> Result<Vec<IntegrationRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| PageGenError::MalformedInput(format!("unreadable header row: {}", e)))?
        .clone();

    let index_of = |column: &str| headers.iter().position(|h| h == column);
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| index_of(c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(PageGenError::MalformedInput(format!(
            "missing required columns: {}",
            missing.join(", ")
        )));
    }
    // Presence checked above.
    let (name_idx, category_idx, slug_idx) = (
        index_of("integration_name").unwrap_or_default(),
        index_of("category").unwrap_or_default(),
        index_of("slug").unwrap_or_default(),
    );

    let mut records = Vec::new();
    let mut seen_slugs: HashMap<String, u64> = HashMap::new();

    for row in reader.records() {
        let row = row.map_err(|e| PageGenError::MalformedInput(e.to_string()))?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let cell = |idx: usize| row.get(idx).unwrap_or_default().to_string();

        let record = IntegrationRecord {
            name: cell(name_idx),
            category: cell(category_idx),
            slug: cell(slug_idx),
        };
        if record.name.is_empty() {
            return Err(PageGenError::MalformedInput(format!(
                "line {}: empty integration_name",
                line
            )));
        }
        if record.slug.is_empty() {
            return Err(PageGenError::MalformedInput(format!(
                "line {}: empty slug for {}",
                line, record.name
            )));
        }

        if let Some(first) = seen_slugs.get(&record.slug) {
            warn!(
                "Duplicate slug '{}' on lines {} and {}; WordPress will resolve the collision",
                record.slug, first, line
            );
        } else {
            seen_slugs.insert(record.slug.clone(), line);
        }
        records.push(record);
    }

    Ok(records)
}
