//! Location parsing for CLI commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::models::lsp::Position;

#[derive(Debug, Clone)]
pub struct ParsedLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl ParsedLocation {
    /// Parse location string and convert to absolute path in one step
    pub fn parse_absolute(input: &str) -> Result<Self> {
        Self::parse(input)?.to_absolute()
    }

    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("Location cannot be empty");
        }

        let (file_part, rest) = Self::split_path_and_position(input)?;
        let file = PathBuf::from(file_part);
        let (line, column) = Self::parse_position(rest)?;

        Ok(Self { file, line, column })
    }

    fn split_path_and_position(input: &str) -> Result<(&str, &str)> {
        // The first ':' followed by a digit starts the position
        let split = input.char_indices().find_map(|(idx, ch)| {
            if ch != ':' {
                return None;
            }
            match input[idx + 1..].chars().next() {
                Some(c) if c.is_ascii_digit() => Some(Ok(idx)),
                Some('-') => Some(Err(())),
                _ => None,
            }
        });

        match split {
            Some(Ok(idx)) if idx > 0 => Ok((&input[..idx], &input[idx + 1..])),
            Some(Err(())) => bail!(
                "Invalid line number: negative values not allowed. Line numbers are 1-indexed positive integers.\nExample: Main.lean:10:5"
            ),
            _ => bail!(
                "Invalid location format. Expected: file:line[:column]\nExample: Main.lean:10:5"
            ),
        }
    }

    fn parse_position(rest: &str) -> Result<(u32, u32)> {
        let mut parts = rest.splitn(2, ':');

        let line_str = parts.next().unwrap_or("");
        let line: u32 = line_str.parse().map_err(|_| {
            anyhow::anyhow!(
                "Invalid line number '{}': must be a positive integer (1-indexed)",
                line_str
            )
        })?;

        let column: u32 = match parts.next() {
            Some(col_str) => col_str.parse().map_err(|_| {
                anyhow::anyhow!(
                    "Invalid column number '{}': must be a positive integer (1-indexed)",
                    col_str
                )
            })?,
            None => 1,
        };

        if line == 0 {
            bail!("Line number must be >= 1 (got 0). Line numbers are 1-indexed.");
        }
        if column == 0 {
            bail!("Column number must be >= 1 (got 0). Column numbers are 1-indexed.");
        }

        Ok((line, column))
    }

    pub fn to_absolute(&self) -> Result<Self> {
        Ok(Self {
            file: absolute_file(&self.file)?,
            line: self.line,
            column: self.column,
        })
    }

    /// 0-indexed LSP position
    pub fn position(&self) -> Position {
        Position::from_cli(self.line, self.column)
    }

    /// Validate position with pre-read content
    pub fn validate_position_with_content(&self, content: &str) -> Result<()> {
        let lines: Vec<&str> = content.lines().collect();
        let line_count = lines.len().max(1);

        if self.line as usize > line_count {
            bail!(
                "Line {} exceeds file length ({} lines)",
                self.line,
                line_count
            );
        }

        if let Some(line_content) = lines.get((self.line - 1) as usize) {
            // LSP columns count UTF-16 code units
            let width = line_content.encode_utf16().count();
            if self.column as usize > width + 1 {
                bail!(
                    "Column {} exceeds line length ({} chars) at line {}",
                    self.column,
                    width,
                    self.line
                );
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for ParsedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Resolve against the current directory and canonicalize
pub fn absolute_file(path: &Path) -> Result<PathBuf> {
    let file = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(path)
    };

    file.canonicalize()
        .map_err(|_| anyhow::anyhow!("File not found: {}", file.display()))
}
