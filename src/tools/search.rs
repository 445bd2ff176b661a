//! Search tool — regex search over workspace files.
//!
//! Walks the tree in lexical order without following symlinks, filters
//! candidates by an optional glob before opening them, and stops the walk as
//! soon as `max_results` matches are collected.

use std::io::Read as _;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AgentError, AgentResult};
use crate::workspace::Workspace;

/// Maximum recursion depth for the file walker.
const MAX_WALK_DEPTH: usize = 50;

/// Max bytes to check for binary content detection.
const BINARY_CHECK_BYTES: usize = 8192;

/// Files larger than this are skipped.
const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Max line length reported in a match before truncation.
const MAX_LINE_LENGTH: usize = 2000;

/// Upper bound on `max_results`.
pub const MAX_RESULTS_LIMIT: usize = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Regex pattern to search for.
    pub pattern: String,
    /// Directory or file to search in (default: workspace root).
    #[serde(default = "default_path")]
    pub path: String,
    /// Glob pattern to filter files (e.g. "*.rs", "src/**/*.{ts,tsx}").
    #[serde(default, alias = "file_pattern")]
    pub file_pattern: Option<String>,
    /// Maximum number of results.
    #[serde(default = "default_max_results", alias = "max_results")]
    pub max_results: usize,
    /// Descend into dot-prefixed files and directories.
    #[serde(default, alias = "include_hidden")]
    pub include_hidden: bool,
}

fn default_path() -> String {
    ".".to_owned()
}

const fn default_max_results() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    /// Path relative to the workspace root.
    pub file_path: String,
    /// 1-based line number.
    pub line_number: usize,
    pub line_content: String,
}

#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub matches: Vec<SearchMatch>,
    /// Whether the result cap was reached.
    pub truncated: bool,
    /// Number of files whose contents were opened.
    pub files_scanned: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub pattern: String,
    pub matches: Vec<SearchMatch>,
    pub total_matches: usize,
    pub truncated: bool,
    pub files_scanned: usize,
}

/// Options for a single search call.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions<'a> {
    pub file_pattern: Option<&'a str>,
    pub max_results: usize,
    pub include_hidden: bool,
}

impl Default for SearchOptions<'_> {
    fn default() -> Self {
        Self {
            file_pattern: None,
            max_results: default_max_results(),
            include_hidden: false,
        }
    }
}

struct Searcher<'a> {
    workspace: &'a Workspace,
    search_root: &'a Path,
    pattern: Regex,
    file_filter: Option<globset::GlobMatcher>,
    include_hidden: bool,
    max_results: usize,
    outcome: SearchOutcome,
}

/// Search files under `path` for lines matching `pattern`.
pub fn search(
    workspace: &Workspace,
    pattern: &str,
    path: &str,
    options: SearchOptions<'_>,
) -> AgentResult<SearchOutcome> {
    let regex = Regex::new(pattern)
        .map_err(|e| AgentError::InvalidArgument(format!("invalid regex pattern: {e}")))?;

    let file_filter = options
        .file_pattern
        .map(|glob| {
            globset::GlobBuilder::new(glob)
                .literal_separator(false)
                .build()
                .map(|g| g.compile_matcher())
                .map_err(|e| AgentError::InvalidArgument(format!("invalid file pattern: {e}")))
        })
        .transpose()?;

    let resolved = workspace.resolve(path)?;
    let meta = std::fs::symlink_metadata(resolved.as_path()).map_err(|e| {
        warn!(path = %resolved.relative().display(), "fs.search path not found");
        AgentError::from_io(resolved.relative(), &e)
    })?;

    let mut searcher = Searcher {
        workspace,
        search_root: resolved.as_path(),
        pattern: regex,
        file_filter,
        include_hidden: options.include_hidden,
        max_results: options.max_results.min(MAX_RESULTS_LIMIT),
        outcome: SearchOutcome::default(),
    };

    if searcher.max_results == 0 {
        return Ok(searcher.outcome);
    }

    if meta.is_file() {
        searcher.scan_file(resolved.as_path());
    } else if meta.is_dir() {
        searcher.walk(resolved.as_path(), 0);
    }

    Ok(searcher.outcome)
}

impl Searcher<'_> {
    fn is_full(&self) -> bool {
        self.outcome.matches.len() >= self.max_results
    }

    /// Depth-first walk in lexical order. Returns early once the cap is hit.
    fn walk(&mut self, dir: &Path, depth: usize) {
        if depth > MAX_WALK_DEPTH || self.is_full() {
            return;
        }

        let Ok(read_dir) = std::fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<_> = read_dir.filter_map(Result::ok).collect();
        entries.sort_by_key(std::fs::DirEntry::file_name);

        for entry in entries {
            if self.is_full() {
                return;
            }

            if !self.include_hidden && entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            // Use entry.file_type() which does NOT follow symlinks.
            let Ok(ft) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if ft.is_dir() {
                self.walk(&path, depth + 1);
            } else if ft.is_file() && self.accepts(&path) {
                self.scan_file(&path);
            }
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(filter) = &self.file_filter else {
            return true;
        };
        path.strip_prefix(self.search_root)
            .is_ok_and(|relative| filter.is_match(relative))
    }

    /// Scan one file. Oversized and unreadable files are skipped unopened;
    /// binary and non-UTF-8 files are counted as scanned, then skipped.
    fn scan_file(&mut self, path: &Path) {
        let Ok(file) = std::fs::File::open(path) else {
            return;
        };
        let Ok(len) = file.metadata().map(|m| m.len()) else {
            return;
        };
        if len > MAX_FILE_BYTES {
            return;
        }
        self.outcome.files_scanned += 1;
        let Some(content) = read_text(file, len) else {
            return;
        };

        let file_path = self.workspace.relativize(path).display().to_string();
        for (i, line) in content.lines().enumerate() {
            if self.pattern.is_match(line) {
                self.outcome.matches.push(SearchMatch {
                    file_path: file_path.clone(),
                    line_number: i + 1,
                    line_content: truncate_line(line).to_owned(),
                });
                if self.is_full() {
                    self.outcome.truncated = true;
                    return;
                }
            }
        }
    }
}

fn read_text(mut file: std::fs::File, len: u64) -> Option<String> {
    let mut bytes = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    file.read_to_end(&mut bytes).ok()?;
    let head = &bytes[..bytes.len().min(BINARY_CHECK_BYTES)];
    if head.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

/// Truncate at the last char boundary at or before [`MAX_LINE_LENGTH`].
fn truncate_line(line: &str) -> &str {
    if line.len() <= MAX_LINE_LENGTH {
        return line;
    }
    let mut end = MAX_LINE_LENGTH;
    while end > 0 && !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}

pub fn execute(workspace: &Workspace, params: &SearchParams) -> AgentResult<SearchResponse> {
    info!(
        pattern = params.pattern,
        path = params.path,
        file_pattern = ?params.file_pattern,
        max_results = params.max_results,
        "fs.search request"
    );

    let outcome = search(
        workspace,
        &params.pattern,
        &params.path,
        SearchOptions {
            file_pattern: params.file_pattern.as_deref(),
            max_results: params.max_results,
            include_hidden: params.include_hidden,
        },
    )?;

    info!(
        pattern = params.pattern,
        path = params.path,
        matches = outcome.matches.len(),
        files_scanned = outcome.files_scanned,
        truncated = outcome.truncated,
        "fs.search"
    );

    Ok(SearchResponse {
        pattern: params.pattern.clone(),
        total_matches: outcome.matches.len(),
        matches: outcome.matches,
        truncated: outcome.truncated,
        files_scanned: outcome.files_scanned,
    })
}
