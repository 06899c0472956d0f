//! `git diff --name-status` parsing.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Files touched by a commit range, split by what happened to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Added, modified, type-changed, copied or rename-target paths.
    pub changed: Vec<PathBuf>,
    /// Deleted or rename-source paths.
    pub deleted: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }
}

/// Parses `git diff --name-status` output into a change set.
///
/// Paths are joined onto `repo_root`. Unknown status letters are ignored.
pub fn parse_name_status(output: &str, repo_root: &Path) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for line in output.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split('\t');
        let Some(status) = fields.next().and_then(|s| s.chars().next()) else {
            continue;
        };
        let paths: Vec<PathBuf> = fields.map(|p| repo_root.join(unquote(p))).collect();

        match (status, paths.as_slice()) {
            ('A' | 'M' | 'T', [path, ..]) => changes.changed.push(path.clone()),
            ('D', [path, ..]) => changes.deleted.push(path.clone()),
            ('R', [from, to, ..]) => {
                changes.deleted.push(from.clone());
                changes.changed.push(to.clone());
            }
            ('C', [_, to, ..]) => changes.changed.push(to.clone()),
            _ => log::debug!("Ignoring diff line: {}", line),
        }
    }

    changes
}

/// Undoes git's C-style path quoting (`"dir/\303\251.json"`).
fn unquote(path: &str) -> String {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
    else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('"') => bytes.push(b'"'),
            Some('\\') => bytes.push(b'\\'),
            Some(d @ '0'..='7') => {
                let mut value = d as u32 - '0' as u32;
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&n @ '0'..='7') => {
                            value = value * 8 + (n as u32 - '0' as u32);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                bytes.push(value as u8);
            }
            Some(other) => {
                bytes.push(b'\\');
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}
