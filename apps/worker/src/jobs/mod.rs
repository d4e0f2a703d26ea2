//! Built-in task definitions
//!
//! - `scan`: walk the media library and queue a registration per file
//! - `register`: hash and register a single media file (hidden)

pub mod library_scan;
pub mod register_file;

pub use library_scan::{is_audio_file, Library, ScanLibrary, AUDIO_EXTENSIONS};
pub use register_file::{compute_file_hash, RegisterFile};

use crate::tasks::TaskRegistration;

/// Registrations for every built-in task, bound to `library`
pub fn registrations(library: Library) -> Vec<TaskRegistration> {
    vec![
        TaskRegistration::of::<ScanLibrary, _>(move |manager| {
            ScanLibrary::new(library.clone(), manager.clone())
        }),
        TaskRegistration::of::<RegisterFile, _>(|_| RegisterFile),
    ]
}
