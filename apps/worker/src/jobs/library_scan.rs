//! Library scanning job
//!
//! Walks the media library (or one of its sub-directories) and queues a
//! file registration for every supported media file it finds.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::register_file::RegisterFile;
use crate::error::{WorkerError, WorkerResult};
use crate::tasks::{
    Arguments, Identifiable, ParameterKind, ParameterSet, ParameterSpec, ParameterValue, Progress,
    Task, TaskDescriptor, TaskManager, TaskMetadata,
};

/// Supported media file extensions
/// Includes common lossy and lossless formats
pub const AUDIO_EXTENSIONS: &[&str] = &[
    // Lossy formats
    "mp3", "ogg", "opus", "aac", "m4a", "wma", "mpc", "ape", // Lossless formats
    "flac", "wav", "aiff", "aif", "alac", "dsf", "dff", "wv", // Container formats
    "m4b", "m4p", "m4r", "mp4", "3gp", "webm",
];

/// Check if a file path has a supported media extension
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// A media library rooted at a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub id: i64,
    pub slug: String,
    pub root: PathBuf,
}

impl Library {
    pub fn new(id: i64, slug: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id,
            slug: slug.into(),
            root: root.into(),
        }
    }
}

impl Identifiable for Library {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn id(&self) -> i64 {
        self.id
    }
}

/// Scans a library and fans out one [`RegisterFile`] run per media file
pub struct ScanLibrary {
    library: Library,
    manager: TaskManager,
}

impl ScanLibrary {
    pub fn new(library: Library, manager: TaskManager) -> Self {
        Self { library, manager }
    }

    /// Resolve the directory to walk, refusing anything outside the library
    fn scan_root(&self, sub_path: Option<PathBuf>) -> WorkerResult<PathBuf> {
        let library_root = self.library.root.canonicalize().map_err(|e| {
            WorkerError::task_failed(format!(
                "Media library {} is not accessible: {}",
                self.library.root.display(),
                e
            ))
        })?;

        let Some(sub_path) = sub_path else {
            return Ok(library_root);
        };

        let candidate = if sub_path.is_absolute() {
            sub_path
        } else {
            library_root.join(sub_path)
        };
        let canonical = candidate.canonicalize().map_err(|e| {
            WorkerError::task_failed(format!(
                "Scan path {} is not accessible: {}",
                candidate.display(),
                e
            ))
        })?;

        // Security: the scan path must stay inside the library
        if !canonical.starts_with(&library_root) {
            return Err(WorkerError::task_failed(format!(
                "Scan path {} is outside the media library {}",
                canonical.display(),
                library_root.display()
            )));
        }

        Ok(canonical)
    }
}

#[async_trait]
impl Task for ScanLibrary {
    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::optional(
            "path",
            "Only scan this directory of the library",
            ParameterKind::Text,
        )]
    }

    async fn run(
        &self,
        args: ParameterSet,
        progress: Progress,
        cancel: CancellationToken,
    ) -> WorkerResult<()> {
        let scan_root = self.scan_root(args.value_opt::<PathBuf>("path")?)?;
        tracing::info!(
            library = %self.library.slug,
            path = %scan_root.display(),
            "Starting library scan"
        );

        let files: Vec<PathBuf> = WalkDir::new(&scan_root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| is_audio_file(path))
            .collect();

        let total = files.len();
        for (index, path) in files.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(WorkerError::Cancelled(format!(
                    "library scan stopped after {} of {} files",
                    index, total
                )));
            }

            let arguments = Arguments::from([
                (
                    "path".to_string(),
                    ParameterValue::from(path.to_string_lossy().into_owned()),
                ),
                (
                    "library".to_string(),
                    ParameterValue::resource(self.library.clone()),
                ),
            ]);
            match self
                .manager
                .start_task_of::<RegisterFile>(Progress::noop(), arguments, None)
            {
                Ok(()) => {}
                Err(WorkerError::ShuttingDown) => {
                    return Err(WorkerError::Cancelled(
                        "task manager is shutting down".to_string(),
                    ))
                }
                Err(e) => return Err(e),
            }

            progress.report((index + 1) as f32 / total as f32 * 100.0);
            tokio::task::yield_now().await;
        }

        progress.report(100.0);
        tracing::info!(
            library = %self.library.slug,
            files = total,
            "Library scan completed"
        );
        Ok(())
    }
}

impl TaskDescriptor for ScanLibrary {
    fn metadata() -> TaskMetadata {
        TaskMetadata::new("scan", "Scan libraries")
            .with_description("Look for new media files in the library")
            .with_priority(10)
            .run_on_startup()
    }
}
