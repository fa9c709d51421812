//! Bulk training from a chat workspace export.
//!
//! An export holds one directory per channel, each containing one JSON file
//! per day with an array of messages.

use crate::bot::markup::clean_text;
use crate::chain::Chain;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed export file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Channel {0} not found in export")]
    ChannelNotFound(String),
}

#[derive(Deserialize)]
struct ExportMessage {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    subtype: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub channels: usize,
    pub files: usize,
    pub messages: usize,
    pub trained: usize,
}

/// Trains `chain` from the export at `dir`, optionally limited to `channel`.
///
/// Joins, bot posts and other messages carrying a subtype are skipped.
pub fn import_export(
    dir: &Path,
    channel: Option<&str>,
    chain: &Chain,
) -> Result<ImportStats, ImportError> {
    let mut channels = sorted_entries(dir)?
        .into_iter()
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();

    if let Some(name) = channel {
        channels.retain(|path| path.file_name().map_or(false, |n| n == name));
        if channels.is_empty() {
            return Err(ImportError::ChannelNotFound(name.to_string()));
        }
    }

    let mut stats = ImportStats::default();
    for channel_dir in channels {
        stats.channels += 1;
        for day in sorted_entries(&channel_dir)? {
            if day.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            import_day(&day, chain, &mut stats)?;
        }
        debug!(channel = %channel_dir.display(), "imported channel");
    }

    info!(
        channels = stats.channels,
        files = stats.files,
        trained = stats.trained,
        "import finished"
    );
    Ok(stats)
}

fn import_day(path: &Path, chain: &Chain, stats: &mut ImportStats) -> Result<(), ImportError> {
    let raw = fs::read(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let messages: Vec<ExportMessage> =
        serde_json::from_slice(&raw).map_err(|source| ImportError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    stats.files += 1;
    for message in messages {
        stats.messages += 1;
        if message.subtype.is_some() {
            continue;
        }
        let Some(text) = message.text.as_deref().map(clean_text) else {
            continue;
        };
        if chain.train(&text) > 0 {
            stats.trained += 1;
        }
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let io_err = |source: io::Error| ImportError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_day(root: &Path, channel: &str, day: &str, body: &str) {
        let dir = root.join(channel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(day), body).unwrap();
    }

    fn sample_export() -> tempfile::TempDir {
        let root = tempdir().unwrap();
        write_day(
            root.path(),
            "general",
            "2015-01-01.json",
            r#"[
                {"type": "message", "text": "the cat sat on the mat"},
                {"type": "message", "subtype": "channel_join",
                 "text": "<@U1|bob> has joined the channel"},
                {"type": "message", "text": "hi"},
                {"type": "message"}
            ]"#,
        );
        write_day(
            root.path(),
            "random",
            "2015-01-02.json",
            r#"[{"type": "message", "text": "look at <http://example.com> this dog run"}]"#,
        );
        fs::write(root.path().join("channels.json"), "[]").unwrap();
        fs::write(root.path().join("general").join("notes.txt"), "ignored").unwrap();
        root
    }

    #[test]
    fn test_imports_every_channel() {
        let root = sample_export();
        let chain = Chain::new(2);

        let stats = import_export(root.path(), None, &chain).unwrap();
        assert_eq!(stats.channels, 2);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.messages, 5);
        assert_eq!(stats.trained, 2);
        assert_eq!(chain.stats().associations, 4 + 3);
    }

    #[test]
    fn test_channel_filter() {
        let root = sample_export();
        let chain = Chain::new(2);

        let stats = import_export(root.path(), Some("random"), &chain).unwrap();
        assert_eq!(stats.channels, 1);
        assert_eq!(stats.trained, 1);

        assert!(matches!(
            import_export(root.path(), Some("nope"), &chain),
            Err(ImportError::ChannelNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_day_file() {
        let root = tempdir().unwrap();
        write_day(root.path(), "general", "bad.json", "{not json");
        let chain = Chain::new(2);
        assert!(matches!(
            import_export(root.path(), None, &chain),
            Err(ImportError::Json { .. })
        ));
    }
}
