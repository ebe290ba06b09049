use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::{
    batch::{HtmlSource, TemplateJob, WorkItem},
    config::Sender,
};

const DEFAULT_TAG: &str = "general";

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("html"))
        .unwrap_or(false)
}

/// `.html` files directly inside `dir`, sorted by name. Subdirectories such as
/// `sent/` are never descended into.
pub fn find_html_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<PathBuf>>>()?
        .into_iter()
        .filter(|path| path.is_file() && is_html(path))
        .collect::<Vec<PathBuf>>();
    files.sort();
    Ok(files)
}

/// The most recently modified `.html` file in `dir`. A missing directory
/// yields `None`.
#[tracing::instrument(level = "debug")]
pub fn find_newest_html_file(dir: &Path) -> io::Result<Option<PathBuf>> {
    if !dir.is_dir() {
        tracing::debug!(message = "directory not found", dir = %dir.display());
        return Ok(None);
    }

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for path in find_html_files(dir)? {
        let modified = fs::metadata(&path)?.modified()?;
        if newest.as_ref().map_or(true, |(time, _)| modified > *time) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateInfo {
    pub name: String,
    pub subject: String,
    pub tag: String,
}

impl TemplateInfo {
    /// `welcome_email-1.html` becomes "Welcome Email 1" tagged `welcome`.
    pub fn from_file_name(file_name: &str, subject_suffix: &str) -> Self {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file_name);

        let mut name = String::with_capacity(stem.len());
        let mut prev: Option<char> = None;
        for c in stem.chars() {
            let c = if c == '_' || c == '-' { ' ' } else { c };
            if prev.map_or(true, |prev| !prev.is_alphanumeric()) {
                name.extend(c.to_uppercase());
            } else {
                name.push(c);
            }
            prev = Some(c);
        }

        let tag = stem
            .find(|c| c == '_' || c == '-')
            .map(|idx| stem[..idx].to_lowercase())
            .filter(|tag| !tag.is_empty())
            .unwrap_or_else(|| DEFAULT_TAG.to_string());

        let subject = format!("{} - {}", name, subject_suffix);

        Self { name, subject, tag }
    }
}

pub fn template_jobs(files: Vec<PathBuf>, sender: &Sender, subject_suffix: &str) -> Vec<WorkItem> {
    files
        .into_iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let TemplateInfo { name, subject, tag } =
                TemplateInfo::from_file_name(&file_name, subject_suffix);
            WorkItem::Template(TemplateJob {
                name,
                subject,
                html: HtmlSource::File(path),
                sender: sender.clone(),
                tag,
            })
        })
        .collect()
}
