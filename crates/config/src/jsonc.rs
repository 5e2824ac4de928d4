// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONC byte transformer.
//!
//! Two passes: comments first, then trailing commas. Stripped bytes are
//! replaced with spaces (newlines kept) so serde_json error positions still
//! point into the original document.

use crate::ConfigError;
use std::collections::HashSet;

/// Strip `//` and `/* */` comments and trailing commas before `]`/`}`.
///
/// Comment-like bytes inside string literals are preserved verbatim; string
/// escape sequences are honored when deciding where a literal ends. The
/// block-comment skip resumes at the byte immediately after the closing
/// `*/`.
pub fn strip_jsonc(bytes: &[u8]) -> Result<Vec<u8>, ConfigError> {
    let mut out = bytes.to_vec();
    strip_comments(&mut out)?;
    strip_trailing_commas(&mut out);
    Ok(out)
}

fn strip_comments(out: &mut [u8]) -> Result<(), ConfigError> {
    let len = out.len();
    let mut i = 0;
    while i < len {
        match out[i] {
            b'"' => {
                i = skip_string(out, i);
            }
            b'/' if i + 1 < len && out[i + 1] == b'/' => {
                while i < len && out[i] != b'\n' {
                    out[i] = b' ';
                    i += 1;
                }
            }
            b'/' if i + 1 < len && out[i + 1] == b'*' => {
                let start = i;
                out[i] = b' ';
                out[i + 1] = b' ';
                i += 2;
                loop {
                    if i >= len {
                        return Err(ConfigError::Syntax {
                            position: start,
                            reason: "unterminated block comment".to_string(),
                        });
                    }
                    if out[i] == b'*' && i + 1 < len && out[i + 1] == b'/' {
                        out[i] = b' ';
                        out[i + 1] = b' ';
                        i += 2;
                        break;
                    }
                    if out[i] != b'\n' {
                        out[i] = b' ';
                    }
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    Ok(())
}

fn strip_trailing_commas(out: &mut [u8]) {
    let len = out.len();
    let mut i = 0;
    while i < len {
        match out[i] {
            b'"' => {
                i = skip_string(out, i);
            }
            b',' => {
                let mut j = i + 1;
                while j < len && out[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < len && (out[j] == b']' || out[j] == b'}') {
                    out[i] = b' ';
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
}

/// Advance past a string literal starting at the opening quote.
/// Returns the index one past the closing quote (or `len` if unterminated;
/// the JSON parser reports that case).
fn skip_string(bytes: &[u8], open: usize) -> usize {
    let len = bytes.len();
    let mut i = open + 1;
    while i < len {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    len
}

/// Reject documents where any object repeats a key.
///
/// serde_json silently keeps the last duplicate, which would let one server
/// definition shadow another; the catalog requires unique names, so the
/// whole document is held to the same rule.
pub(crate) fn check_duplicate_keys(bytes: &[u8]) -> Result<(), ConfigError> {
    enum Ctx {
        Obj { keys: HashSet<Vec<u8>>, expect_key: bool },
        Arr,
    }

    let len = bytes.len();
    let mut stack: Vec<Ctx> = Vec::new();
    let mut i = 0;
    while i < len {
        match bytes[i] {
            b'"' => {
                let end = skip_string(bytes, i);
                if let Some(Ctx::Obj { keys, expect_key }) = stack.last_mut() {
                    if *expect_key {
                        // An unterminated literal reaches EOF; the JSON
                        // parser reports it, we just avoid slicing past it.
                        let raw = bytes[i + 1..end.saturating_sub(1).max(i + 1)].to_vec();
                        if !keys.insert(raw.clone()) {
                            return Err(ConfigError::DuplicateKey {
                                key: String::from_utf8_lossy(&raw).into_owned(),
                                position: i,
                            });
                        }
                        *expect_key = false;
                    }
                }
                i = end;
            }
            b'{' => {
                stack.push(Ctx::Obj { keys: HashSet::new(), expect_key: true });
                i += 1;
            }
            b'[' => {
                stack.push(Ctx::Arr);
                i += 1;
            }
            b'}' | b']' => {
                stack.pop();
                i += 1;
            }
            b',' => {
                if let Some(Ctx::Obj { expect_key, .. }) = stack.last_mut() {
                    *expect_key = true;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "jsonc_tests.rs"]
mod tests;
