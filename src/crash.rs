//! Recovery of unsaved output when the process goes down
//!
//! A panic hook and the engine-abort path both write whatever the output
//! editor holds to a crash-save file before the process exits.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::OutputMode;
use crate::output::SharedEditor;
use crate::storage::recovery::next_crash_save_path;

/// How long the panic hook waits for the editor lock
const LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct CrashGuard {
    editor: SharedEditor,
    dir: PathBuf,
}

impl CrashGuard {
    pub fn new(editor: SharedEditor, dir: PathBuf) -> Self {
        Self { editor, dir }
    }

    /// Install a panic hook persisting unsaved output, then chaining to the
    /// previous hook
    pub fn install(editor: SharedEditor, dir: PathBuf) -> Arc<Self> {
        let guard = Arc::new(Self::new(editor, dir));
        let hook_guard = guard.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            hook_guard.persist_unsaved();
            previous(panic_info);
        }));
        guard
    }

    /// Save modified output to a fresh crash-save file
    pub fn persist_unsaved(&self) -> Option<PathBuf> {
        let Some(mut editor) = self.editor.try_lock_for(LOCK_TIMEOUT) else {
            error!("Output editor is locked, unsaved output is lost");
            return None;
        };
        if !editor.is_modified() {
            return None;
        }

        let extension = match editor.mode() {
            OutputMode::Text => "txt",
            OutputMode::Hocr => "html",
        };
        let path = next_crash_save_path(&self.dir, extension);
        match editor.save(&path) {
            Ok(()) => {
                info!("Unsaved output written to {:?}", path);
                Some(path)
            }
            Err(e) => {
                error!("Failed to write crash save {:?}: {:#}", path, e);
                None
            }
        }
    }
}
