use crate::types::{DigestError, FeedSnapshot, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::{debug, info};

/// Feed metadata exposed to templates under the `feed` key.
#[derive(Serialize)]
struct FeedContext<'a> {
    title: Option<&'a str>,
    updated: Option<String>,
}

/// Render the digest template for a snapshot.
///
/// Templates are resolved by name from `<templates_folder>/*.html`; the
/// template file for `template_name` is `<template_name>.html`. A missing
/// template is its own error class so the orchestrator can abort the run
/// before any output directory exists.
pub fn render_digest(
    templates_folder: &Path,
    template_name: &str,
    snapshot: &FeedSnapshot,
    now: DateTime<Local>,
) -> Result<String> {
    let pattern = format!("{}/*.html", templates_folder.display());
    let tera = Tera::new(&pattern).map_err(|e| DigestError::Render(e.to_string()))?;

    let template_file = format!("{}.html", template_name);
    if !tera.get_template_names().any(|name| name == template_file) {
        return Err(DigestError::TemplateNotFound {
            name: template_file,
        });
    }

    let mut context = Context::new();
    context.insert("date", &now.format("%Y-%m-%d").to_string());
    context.insert("posts", &snapshot.entries);
    context.insert(
        "feed",
        &FeedContext {
            title: snapshot.title.as_deref(),
            updated: snapshot.updated_at.map(|dt| dt.to_rfc3339()),
        },
    );

    debug!("Rendering template {}", template_file);
    tera.render(&template_file, &context)
        .map_err(|e| DigestError::Render(e.to_string()))
}

/// Write rendered HTML into the namespace directory, named by the render
/// timestamp at second resolution.
///
/// The directory is created on demand (idempotent), and the file lands via a
/// temp-file rename so a concurrent reader never sees a partial digest.
pub fn write_digest(namespace_dir: &Path, now: DateTime<Local>, html: &str) -> Result<PathBuf> {
    fs::create_dir_all(namespace_dir)?;

    let file_name = format!("{}.html", now.format("%Y%m%d%H%M%S"));
    let final_path = namespace_dir.join(&file_name);
    let tmp_path = namespace_dir.join(format!("{}.tmp", file_name));

    fs::write(&tmp_path, html)?;
    fs::rename(&tmp_path, &final_path)?;

    info!("Saved digest to {}", final_path.display());
    Ok(final_path)
}
