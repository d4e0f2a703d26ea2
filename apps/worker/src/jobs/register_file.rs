//! Media file registration job

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use super::library_scan::is_audio_file;
use crate::error::{WorkerError, WorkerResult};
use crate::tasks::{
    ParameterKind, ParameterSet, ParameterSpec, Progress, Task, TaskDescriptor, TaskMetadata,
};

/// Registers a single media file discovered by a library scan
pub struct RegisterFile;

#[async_trait]
impl Task for RegisterFile {
    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("path", "Media file to register", ParameterKind::Text),
            ParameterSpec::optional("library", "Library the file belongs to", ParameterKind::Any),
        ]
    }

    async fn run(
        &self,
        args: ParameterSet,
        progress: Progress,
        _cancel: CancellationToken,
    ) -> WorkerResult<()> {
        let path: PathBuf = args.value("path")?;
        let library: Option<String> = args.value_opt("library")?;

        if !path.is_file() {
            return Err(WorkerError::task_failed(format!(
                "The file {} does not exist",
                path.display()
            )));
        }
        if !is_audio_file(&path) {
            return Err(WorkerError::task_failed(format!(
                "{} is not a supported media file",
                path.display()
            )));
        }

        let hash = compute_file_hash(&path)?;
        progress.report(100.0);

        tracing::info!(
            path = %path.display(),
            library = library.as_deref().unwrap_or("-"),
            hash = %hash,
            "Registered media file"
        );
        Ok(())
    }
}

impl TaskDescriptor for RegisterFile {
    fn metadata() -> TaskMetadata {
        TaskMetadata::new("register", "Register file")
            .with_description("Hash and register a single media file")
            .hidden()
    }
}

/// SHA-256 of the file contents, hex encoded
pub fn compute_file_hash(path: &Path) -> WorkerResult<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    let hash = hasher.finalize();
    Ok(format!("{:x}", hash))
}
