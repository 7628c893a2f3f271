//! `find` and `grep` over a subtree walk.

use anyhow::{Context, Result};
use regex::Regex;
use treefs_core::{FsCore, FsError, NodeType, SessionContext};

/// Compile a shell wildcard (`*` and `?`) into an anchored regex.
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() + 2);
    source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');
    Regex::new(&source).with_context(|| format!("invalid wildcard {pattern:?}"))
}

/// Paths under `start` whose final name matches `pattern`.
pub fn find(fs: &FsCore, ctx: &SessionContext, start: &str, pattern: &str) -> Result<Vec<String>> {
    let matcher = wildcard_regex(pattern)?;
    let entries = fs.walk(ctx, start)?;
    Ok(entries
        .into_iter()
        .filter(|entry| !entry.name.is_empty() && matcher.is_match(&entry.name))
        .map(|entry| entry.path)
        .collect())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrepMatch {
    pub path: String,
    /// 1-based.
    pub line_number: usize,
    pub line: String,
}

/// Search the content of every file under `start` for `pattern`.
///
/// Files the actor may not read are skipped.
pub fn grep(fs: &mut FsCore, ctx: &SessionContext, start: &str, pattern: &str) -> Result<Vec<GrepMatch>> {
    let regex = Regex::new(pattern).with_context(|| format!("invalid pattern {pattern:?}"))?;
    let files: Vec<String> = fs
        .walk(ctx, start)?
        .into_iter()
        .filter(|entry| entry.kind == NodeType::File)
        .map(|entry| entry.path)
        .collect();

    let mut matches = Vec::new();
    for path in files {
        let content = match fs.read_file(ctx, &path) {
            Ok(content) => content,
            Err(FsError::PermissionDenied) => {
                tracing::debug!(%path, "grep skipping unreadable file");
                continue;
            }
            Err(err) => return Err(err).with_context(|| path.clone()),
        };
        for (index, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(GrepMatch {
                    path: path.clone(),
                    line_number: index + 1,
                    line: line.to_string(),
                });
            }
        }
    }
    Ok(matches)
}
