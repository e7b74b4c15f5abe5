use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::Serialize;
use survey_session::{CompletionStatus, HandlerResult, PartialSaveHandler, SubmitHandler};
use survey_spec::AnswerSet;
use tracing::info;

/// On-disk shape of a stored response.
///
/// The answer fields are flattened so the file can be passed back with `--answers`.
#[derive(Debug, Serialize)]
pub struct ResponseDocument<'a> {
    pub status: CompletionStatus,
    #[serde(flatten)]
    pub answers: &'a AnswerSet,
}

impl<'a> ResponseDocument<'a> {
    pub fn new(answers: &'a AnswerSet, status: CompletionStatus) -> Self {
        Self { status, answers }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Submit collaborator backed by files.
///
/// Completed responses go to `out` (stdout when unset); drafts go to `drafts`.
#[derive(Debug, Clone, Default)]
pub struct ResponseSink {
    out: Option<PathBuf>,
    drafts: Option<PathBuf>,
}

impl ResponseSink {
    pub fn new(out: Option<PathBuf>, drafts: Option<PathBuf>) -> Self {
        Self { out, drafts }
    }
}

impl SubmitHandler for ResponseSink {
    fn submit(&self, answers: AnswerSet, status: CompletionStatus) -> BoxFuture<'_, HandlerResult> {
        let target = match status {
            CompletionStatus::Completed => self.out.clone(),
            CompletionStatus::InProgress => self.drafts.clone(),
        };
        Box::pin(store_response(target, answers, status))
    }
}

async fn store_response(
    target: Option<PathBuf>,
    answers: AnswerSet,
    status: CompletionStatus,
) -> HandlerResult {
    let document = ResponseDocument::new(&answers, status).to_json_pretty()?;
    match target {
        Some(path) => {
            write_document(path.clone(), document).await?;
            info!(%status, path = %path.display(), "response written");
        }
        None if status == CompletionStatus::Completed => println!("{document}"),
        None => return Err("no draft file configured".into()),
    }
    Ok(())
}

/// Autosave collaborator that rewrites one draft file.
#[derive(Debug, Clone)]
pub struct DraftFile {
    path: PathBuf,
}

impl DraftFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PartialSaveHandler for DraftFile {
    fn save_partial(&self, answers: AnswerSet) -> BoxFuture<'_, HandlerResult> {
        Box::pin(store_draft(self.path.clone(), answers))
    }
}

async fn store_draft(path: PathBuf, answers: AnswerSet) -> HandlerResult {
    let document = ResponseDocument::new(&answers, CompletionStatus::InProgress).to_json_pretty()?;
    write_document(path, document).await
}

async fn write_document(path: PathBuf, contents: String) -> HandlerResult {
    tokio::task::spawn_blocking(move || replace_file(&path, &contents)).await??;
    Ok(())
}

/// Writes next to the target and renames, so readers never see a half-written file.
fn replace_file(path: &Path, contents: &str) -> io::Result<()> {
    let staging = path.with_extension("partial");
    fs::write(&staging, contents)?;
    fs::rename(&staging, path)
}
