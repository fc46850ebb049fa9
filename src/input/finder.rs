// SPDX-License-Identifier: Apache-2.0

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::FileId;
use crate::error::{Error, Result};

/// Syntax of the file-name part of a rotation pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSyntax {
    /// Shell glob such as `/var/log/app*.log`.
    #[default]
    Glob,
    /// Regular expression over the file name, such as `/var/log/app\.log(\.\d+)?`.
    Regex,
}

#[derive(Debug, Clone)]
enum NamePattern {
    Glob(glob::Pattern),
    Regex(Regex),
}

impl NamePattern {
    fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Glob(pattern) => pattern.matches(name),
            NamePattern::Regex(regex) => regex.is_match(name),
        }
    }
}

/// A rotation pattern split into a fixed directory and a file-name pattern.
///
/// Only the last path component may contain wildcards.
#[derive(Debug, Clone)]
pub struct FilePattern {
    raw: String,
    directory: PathBuf,
    name: NamePattern,
}

impl FilePattern {
    pub fn parse(pattern: &str, syntax: PatternSyntax) -> Result<Self> {
        let (directory, name) = split_pattern(pattern)?;

        let name = match syntax {
            PatternSyntax::Glob => {
                if has_glob_meta(&directory.to_string_lossy()) {
                    return Err(Error::InvalidPattern(format!(
                        "wildcards are only allowed in the file name: {}",
                        pattern
                    )));
                }
                NamePattern::Glob(
                    glob::Pattern::new(name)
                        .map_err(|e| Error::InvalidPattern(format!("{}: {}", pattern, e)))?,
                )
            }
            // The expression has to describe the whole name.
            PatternSyntax::Regex => NamePattern::Regex(
                Regex::new(&format!("^(?:{})$", name))
                    .map_err(|e| Error::Regex(format!("{}: {}", pattern, e)))?,
            ),
        };

        Ok(Self {
            raw: pattern.to_string(),
            directory,
            name,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.matches(name)
    }
}

fn split_pattern(pattern: &str) -> Result<(PathBuf, &str)> {
    let (directory, name) = match pattern.rfind(['/', std::path::MAIN_SEPARATOR]) {
        Some(0) => ("/", &pattern[1..]),
        Some(i) => (&pattern[..i], &pattern[i + 1..]),
        None => (".", pattern),
    };
    if name.is_empty() {
        return Err(Error::InvalidPattern(format!(
            "pattern has no file name part: {}",
            pattern
        )));
    }
    Ok((PathBuf::from(directory), name))
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// A regular file whose name matches the rotation pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub file_id: FileId,
}

/// Result of listing the pattern's directory once.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Matching files, oldest first (modification time, then path).
    pub candidates: Vec<CandidateFile>,
    /// Identity of every regular file in the directory, matching or not.
    pub entries: Vec<(PathBuf, FileId)>,
}

impl Scan {
    /// Identity of the file currently at `path`.
    pub fn identity_at(&self, path: &Path) -> Option<FileId> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, id)| *id)
    }

    /// Where the file with identity `id` currently lives.
    pub fn locate(&self, id: FileId) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(_, e)| *e == id)
            .map(|(p, _)| p.as_path())
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.locate(id).is_some()
    }
}

/// Lists the files of a rotation pattern.
#[derive(Debug, Clone)]
pub struct CandidateFinder<'a> {
    pattern: &'a FilePattern,
}

impl<'a> CandidateFinder<'a> {
    pub fn new(pattern: &'a FilePattern) -> Self {
        Self { pattern }
    }

    /// List the directory. A directory that does not exist yields an empty
    /// scan; entries that vanish while listing are skipped.
    pub fn scan(&self) -> Result<Scan> {
        let dir = self.pattern.directory();
        let read_dir = match fs::read_dir(dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Scan::default()),
            Err(e) => return Err(Error::access(dir, e)),
        };

        let mut scan = Scan::default();
        for entry in read_dir {
            let entry = entry.map_err(|e| Error::access(dir, e))?;
            let path = entry.path();

            // follows symlinks, a link to a log file is monitored like the file
            let metadata = match fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let file_id = match FileId::from_path(&path) {
                Ok(id) => id,
                Err(_) => continue,
            };
            scan.entries.push((path.clone(), file_id));

            let matches = entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.pattern.matches_name(name));
            if matches {
                scan.candidates.push(CandidateFile {
                    path,
                    size: metadata.len(),
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                    file_id,
                });
            }
        }

        scan.candidates
            .sort_by(|a, b| (a.modified, &a.path).cmp(&(b.modified, &b.path)));
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, secs: u64) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn pattern(dir: &TempDir, name: &str, syntax: PatternSyntax) -> FilePattern {
        FilePattern::parse(&format!("{}/{}", dir.path().display(), name), syntax).unwrap()
    }

    #[test]
    fn test_parse_splits_directory() {
        let p = FilePattern::parse("/var/log/app*.log", PatternSyntax::Glob).unwrap();
        assert_eq!(p.directory(), Path::new("/var/log"));
        assert!(p.matches_name("app.log"));
        assert!(p.matches_name("app-2024.log"));
        assert!(!p.matches_name("other.log"));
    }

    #[test]
    fn test_parse_relative_and_root() {
        let p = FilePattern::parse("app.log", PatternSyntax::Glob).unwrap();
        assert_eq!(p.directory(), Path::new("."));
        let p = FilePattern::parse("/app.log", PatternSyntax::Glob).unwrap();
        assert_eq!(p.directory(), Path::new("/"));
    }

    #[test]
    fn test_parse_rejects_wildcard_directory() {
        let result = FilePattern::parse("/var/*/app.log", PatternSyntax::Glob);
        assert!(matches!(result, Err(Error::InvalidPattern(_))));
        assert!(FilePattern::parse("/var/log/", PatternSyntax::Glob).is_err());
    }

    #[test]
    fn test_regex_matches_whole_name() {
        let p = FilePattern::parse(r"/var/log/app\.log(\.\d+)?", PatternSyntax::Regex).unwrap();
        assert!(p.matches_name("app.log"));
        assert!(p.matches_name("app.log.3"));
        assert!(!p.matches_name("app.log.gz"));
        assert!(!p.matches_name("myapp.log"));
    }

    #[test]
    fn test_invalid_regex() {
        let result = FilePattern::parse("/var/log/(bad", PatternSyntax::Regex);
        assert!(matches!(result, Err(Error::Regex(_))));
    }

    #[test]
    fn test_scan_orders_by_mtime() {
        let dir = TempDir::new().unwrap();
        for (name, secs) in [("app.log", 300), ("app.log.1", 200), ("app.log.2", 100)] {
            let path = dir.path().join(name);
            fs::write(&path, name).unwrap();
            set_mtime(&path, secs);
        }
        fs::write(dir.path().join("other.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("app.log.d")).unwrap();

        let p = pattern(&dir, "app.log*", PatternSyntax::Glob);
        let scan = CandidateFinder::new(&p).scan().unwrap();

        let names: Vec<_> = scan
            .candidates
            .iter()
            .map(|c| c.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["app.log.2", "app.log.1", "app.log"]);
        // non-matching files are still indexed
        assert_eq!(scan.entries.len(), 4);
    }

    #[test]
    fn test_scan_identity_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "x").unwrap();
        let id = FileId::from_path(&path).unwrap();

        let moved = dir.path().join("archived.old");
        fs::rename(&path, &moved).unwrap();

        let p = pattern(&dir, "app.log", PatternSyntax::Glob);
        let scan = CandidateFinder::new(&p).scan().unwrap();
        assert!(scan.candidates.is_empty());
        assert_eq!(scan.locate(id), Some(moved.as_path()));
        assert_eq!(scan.identity_at(&moved), Some(id));
        assert!(scan.contains(id));
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = TempDir::new().unwrap();
        let p = FilePattern::parse(
            &format!("{}/nope/app.log", dir.path().display()),
            PatternSyntax::Glob,
        )
        .unwrap();
        let scan = CandidateFinder::new(&p).scan().unwrap();
        assert!(scan.candidates.is_empty());
        assert!(scan.entries.is_empty());
    }
}
