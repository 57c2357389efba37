//! MOTD file cache with read-if-newer semantics.
//!
//! The file is re-read on the first MOTD query after its mtime changes.
//! Line count and line length are capped so a runaway file cannot bloat
//! the welcome burst.

use parking_lot::RwLock;
use std::path::PathBuf;
use std::time::SystemTime;

const MAX_MOTD_LINES: usize = 256;
const MOTD_LINE_LEN: usize = 80;

#[derive(Debug, Default)]
struct Cache {
    lines: Vec<String>,
    modified: Option<SystemTime>,
}

/// Cached MOTD content.
#[derive(Debug)]
pub struct Motd {
    path: Option<PathBuf>,
    cache: RwLock<Cache>,
}

impl Motd {
    pub fn new(path: Option<String>) -> Self {
        Self {
            path: path.map(PathBuf::from),
            cache: RwLock::new(Cache::default()),
        }
    }

    /// Current MOTD lines and the file's mtime, or None when the file is
    /// missing or unconfigured.
    pub fn read(&self) -> Option<(Vec<String>, SystemTime)> {
        let path = self.path.as_ref()?;
        let meta = std::fs::metadata(path).ok()?;
        let modified = meta.modified().ok()?;

        {
            let cache = self.cache.read();
            if cache.modified == Some(modified) {
                return Some((cache.lines.clone(), modified));
            }
        }

        let content = std::fs::read_to_string(path).ok()?;
        let lines: Vec<String> = content
            .lines()
            .take(MAX_MOTD_LINES)
            .map(|l| l.chars().take(MOTD_LINE_LEN).collect())
            .collect();

        let mut cache = self.cache.write();
        cache.lines = lines.clone();
        cache.modified = Some(modified);
        Some((lines, modified))
    }
}
