//! Change notifications and the filter that decides which ones to process.

use crate::signing::SIGNATURE_SUFFIX;
use notify::event::{EventKind, ModifyKind};
use std::path::Path;

/// Marker the device's editor puts in the names of its scratch files.
pub const TEMP_FILE_MARKER: &str = "qt_temp";

/// A changed entry of the watched directory, by file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub name: String,
}

impl ChangeEvent {
    /// Extract the change events carried by a `notify` event.
    ///
    /// Only content modifications count; creation, metadata and removal
    /// events are ignored. Paths outside `dir` are dropped.
    pub fn from_notify(event: &notify::Event, dir: &Path) -> Vec<Self> {
        if !is_content_modification(event.kind) {
            return Vec::new();
        }

        event
            .paths
            .iter()
            .filter(|path| path.parent().is_some_and(|parent| parent == dir))
            .filter_map(|path| path.file_name())
            .map(|name| Self {
                name: name.to_string_lossy().into_owned(),
            })
            .collect()
    }
}

fn is_content_modification(kind: EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
    )
}

/// Whether `name` in `dir` should go through intake.
///
/// Signature files, editor scratch files and directories never do.
pub fn should_process(dir: &Path, name: &str) -> bool {
    if name.ends_with(SIGNATURE_SUFFIX) || name.contains(TEMP_FILE_MARKER) {
        return false;
    }
    !dir.join(name).is_dir()
}

/// Names of a batch in delivery order, each name once.
pub fn dedup_in_order(events: impl IntoIterator<Item = ChangeEvent>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for event in events {
        if !names.contains(&event.name) {
            names.push(event.name);
        }
    }
    names
}
