// Copyright contributors to the openqasm-unroller project
// SPDX-License-Identifier: Apache-2.0

// Textual preparation before parsing: line-ending policy, version
// extraction, include inlining and the OpenQASM 2 -> 3 rewrite. These
// operate on text because the OpenQASM 3 parser does not accept the
// OpenQASM 2 forms.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Source text must use LF line endings.
pub fn check_line_endings(source: &str) -> Result<()> {
    if source.contains('\r') {
        return Err(Error::syntax(
            "CR / CRLF line endings are not supported; use LF",
            None,
        ));
    }
    Ok(())
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c == '/' {
            match chars.peek() {
                Some((_, '/')) => {
                    for (_, c2) in chars.by_ref() {
                        if c2 == '\n' {
                            out.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some((_, '*')) => {
                    chars.next();
                    let mut prev = ' ';
                    for (_, c2) in chars.by_ref() {
                        if prev == '*' && c2 == '/' {
                            break;
                        }
                        if c2 == '\n' {
                            out.push('\n');
                        }
                        prev = c2;
                    }
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}

/// Extract the `OPENQASM x.y;` version and normalize it to `x.0` form.
/// Accepted inputs: 2, 2.0, 3, 3.0, 3.1.
pub fn extract_version(source: &str) -> Result<String> {
    let cleaned = strip_comments(source);
    for line in cleaned.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("OPENQASM") {
            let version = rest.trim().trim_end_matches(';').trim();
            return match version {
                "2" | "2.0" => Ok("2.0".to_string()),
                "3" | "3.0" | "3.1" => Ok("3.0".to_string()),
                other => Err(Error::syntax(
                    format!(
                        "unsupported OpenQASM version: {other}. Supported versions are: 2.0, 3.0"
                    ),
                    None,
                )),
            };
        }
        // The version pragma must precede any other statement; a program
        // with no version line defaults to 3.0.
        break;
    }
    Ok("3.0".to_string())
}

fn extract_include_path(line: &str) -> Result<Option<String>> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with("include") {
        return Ok(None);
    }
    let rest = trimmed["include".len()..].trim_start();
    let quote = match rest.chars().next() {
        Some(q @ ('"' | '\'')) => q,
        _ => {
            return Err(Error::include(
                "invalid include statement detected in QASM file",
                None,
            ))
        }
    };
    let inner = &rest[1..];
    match inner.find(quote) {
        Some(end) => Ok(Some(inner[..end].to_string())),
        None => Err(Error::include(
            "invalid include statement detected in QASM file",
            None,
        )),
    }
}

/// Inline `include` directives, resolving paths relative to the including
/// file first and the working directory second. `stdgates.inc` is left in
/// place; cycles are rejected.
pub fn process_includes(source: &str, filename: Option<&Path>) -> Result<String> {
    let mut in_progress = HashSet::new();
    if let Some(path) = filename {
        in_progress.insert(normalize_path(path));
    }
    inline_includes(source, filename, &mut in_progress)
}

fn normalize_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn inline_includes(
    source: &str,
    filename: Option<&Path>,
    in_progress: &mut HashSet<PathBuf>,
) -> Result<String> {
    let mut lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
    for line in lines.iter_mut() {
        let include_path = match extract_include_path(line)? {
            Some(path) => path,
            None => continue,
        };
        if include_path == "stdgates.inc" {
            continue;
        }
        let candidates: Vec<PathBuf> = match filename.and_then(|f| f.parent()) {
            Some(dir) => vec![dir.join(&include_path), PathBuf::from(&include_path)],
            None => vec![PathBuf::from(&include_path)],
        };
        let resolved = candidates.into_iter().find(|p| p.is_file()).ok_or_else(|| {
            Error::include(format!("include file '{include_path}' not found"), None)
        })?;
        let key = normalize_path(&resolved);
        if !in_progress.insert(key.clone()) {
            return Err(Error::include(
                format!("cyclic include of '{include_path}' detected"),
                None,
            ));
        }
        let raw = std::fs::read_to_string(&resolved).map_err(|err| {
            Error::include(format!("failed to read include '{include_path}': {err}"), None)
        })?;
        check_line_endings(&raw)?;
        let mut content = inline_includes(&raw, Some(&resolved), in_progress)?;
        in_progress.remove(&key);
        if include_path.ends_with(".qasm") {
            // Drop a nested version line and a duplicate stdgates include.
            content = content
                .lines()
                .filter(|l| {
                    let t = l.trim();
                    !t.starts_with("OPENQASM") && !t.contains("\"stdgates.inc\"")
                })
                .collect::<Vec<_>>()
                .join("\n");
        }
        *line = content;
    }
    Ok(lines.join("\n"))
}

/// Rewrite an OpenQASM 2 program into OpenQASM 3 form: `qreg`/`creg`
/// declarations, arrow measurements, the standard include, and the version
/// line. Comments do not survive the rewrite.
pub fn convert_qasm2(source: &str) -> Result<String> {
    let cleaned = strip_comments(source);
    let mut out = Vec::new();
    for raw_stmt in cleaned.split(';') {
        let stmt = raw_stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        if let Some(rest) = stmt.strip_prefix("OPENQASM") {
            let _ = rest;
            out.push("OPENQASM 3.0".to_string());
            continue;
        }
        if stmt.starts_with("include") {
            out.push(stmt.replace("qelib1.inc", "stdgates.inc"));
            continue;
        }
        if let Some(decl) = convert_reg_declaration(stmt, "qreg", "qubit")? {
            out.push(decl);
            continue;
        }
        if let Some(decl) = convert_reg_declaration(stmt, "creg", "bit")? {
            out.push(decl);
            continue;
        }
        if stmt.starts_with("opaque") {
            return Err(Error::unsupported(
                "opaque declarations are not supported",
                None,
            ));
        }
        if let Some(converted) = convert_arrow_measurement(stmt) {
            out.push(converted);
            continue;
        }
        out.push(stmt.to_string());
    }
    // Re-terminate the statements; fragments ending in a brace (gate bodies)
    // take no semicolon.
    let mut text = String::new();
    for stmt in out {
        text.push_str(&stmt);
        if !stmt.trim_end().ends_with(|c| c == '{' || c == '}') {
            text.push(';');
        }
        text.push('\n');
    }
    Ok(text)
}

// `qreg q[5]` -> `qubit[5] q`; `qreg q` -> `qubit q`.
fn convert_reg_declaration(stmt: &str, keyword: &str, replacement: &str) -> Result<Option<String>> {
    let rest = match stmt.strip_prefix(keyword) {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => return Ok(None),
    };
    match rest.find('[') {
        Some(open) => {
            let name = rest[..open].trim();
            let close = rest.find(']').ok_or_else(|| {
                Error::syntax(format!("malformed {keyword} declaration: {stmt}"), None)
            })?;
            let size = rest[open + 1..close].trim();
            Ok(Some(format!("{replacement}[{size}] {name}")))
        }
        None => Ok(Some(format!("{replacement} {rest}"))),
    }
}

// `measure q -> c` -> `c = measure q`. Bare `measure q` passes through.
fn convert_arrow_measurement(stmt: &str) -> Option<String> {
    let rest = stmt.strip_prefix("measure")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    match rest.split_once("->") {
        Some((source, target)) => Some(format!(
            "{} = measure {}",
            target.trim(),
            source.trim()
        )),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_rejected() {
        assert!(check_line_endings("OPENQASM 3.0;\r\nqubit q;\n").is_err());
        assert!(check_line_endings("OPENQASM 3.0;\nqubit q;\n").is_ok());
    }

    #[test]
    fn test_version_extraction() {
        assert_eq!(extract_version("OPENQASM 3.0;\n").unwrap(), "3.0");
        assert_eq!(extract_version("// header\nOPENQASM 2.0;\n").unwrap(), "2.0");
        assert_eq!(extract_version("OPENQASM 3.1;\n").unwrap(), "3.0");
        assert_eq!(extract_version("qubit q;\n").unwrap(), "3.0");
        assert!(extract_version("OPENQASM 4.0;\n").is_err());
    }

    #[test]
    fn test_qasm2_conversion() {
        let qasm2 = "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[2];\ncreg c[2];\nh q[0];\nmeasure q[0] -> c[0];\n";
        let converted = convert_qasm2(qasm2).unwrap();
        assert!(converted.contains("OPENQASM 3.0;"));
        assert!(converted.contains("include \"stdgates.inc\";"));
        assert!(converted.contains("qubit[2] q;"));
        assert!(converted.contains("bit[2] c;"));
        assert!(converted.contains("c[0] = measure q[0];"));
    }

    #[test]
    fn test_comment_stripping() {
        let text = "h q; // a comment\n/* block\ncomment */ x q;\n";
        let cleaned = strip_comments(text);
        assert!(!cleaned.contains("comment"));
        assert!(cleaned.contains("h q;"));
        assert!(cleaned.contains("x q;"));
    }
}
