//! LSP Common Types
//!
//! Positions, ranges and file URI helpers shared by the protocol layer,
//! the client and the CLI.

use std::path::Path;

use serde::{Deserialize, Serialize};

// ============================================================================
// Core LSP Types
// ============================================================================

/// Position within a document (0-indexed, LSP standard)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    /// Convert 1-indexed CLI input to 0-indexed LSP position
    pub fn from_cli(line: u32, column: u32) -> Self {
        Self {
            line: line.saturating_sub(1),
            character: column.saturating_sub(1),
        }
    }

    /// Convert 0-indexed LSP position to 1-indexed display position
    pub fn to_display(&self) -> (u32, u32) {
        (self.line + 1, self.character + 1)
    }
}

/// Range within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Convert a single position to a range
    pub fn point(pos: Position) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }
}

// ============================================================================
// URI Helpers
// ============================================================================

pub fn path_to_uri(path: &Path) -> String {
    let abs_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };

    let path_str = abs_path.to_string_lossy();
    let encoded: String = path_str
        .chars()
        .map(|c| match c {
            '/' | '.' | '-' | '_' | '~' => c.to_string(),
            c if c.is_ascii_alphanumeric() => c.to_string(),
            c => {
                let mut buf = [0u8; 4];
                c.encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{:02X}", b))
                    .collect()
            }
        })
        .collect();

    format!("file://{encoded}")
}

/// URI scheme (`file`, `untitled`, ...) or `None` for scheme-less strings
pub fn uri_scheme(uri: &str) -> Option<&str> {
    let (scheme, _) = uri.split_once(':')?;
    let valid = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_cli() {
        let pos = Position::from_cli(10, 5);
        assert_eq!(pos.line, 9);
        assert_eq!(pos.character, 4);
    }

    #[test]
    fn test_position_from_cli_saturates() {
        assert_eq!(Position::from_cli(0, 0), Position::new(0, 0));
    }

    #[test]
    fn test_position_to_display() {
        let pos = Position::new(9, 4);
        assert_eq!(pos.to_display(), (10, 5));
    }

    #[test]
    fn test_path_to_uri_simple() {
        let uri = path_to_uri(Path::new("/test/Main.lean"));
        assert_eq!(uri, "file:///test/Main.lean");
    }

    #[test]
    fn test_path_to_uri_escapes_spaces_and_unicode() {
        let uri = path_to_uri(Path::new("/path with spaces/Équiv.lean"));
        assert_eq!(uri, "file:///path%20with%20spaces/%C3%89quiv.lean");
        assert_eq!(uri_scheme(&uri), Some("file"));
    }

    #[test]
    fn test_uri_scheme() {
        assert_eq!(uri_scheme("file:///a.lean"), Some("file"));
        assert_eq!(uri_scheme("untitled:Untitled-1"), Some("untitled"));
        assert_eq!(uri_scheme("/plain/path"), None);
    }
}
