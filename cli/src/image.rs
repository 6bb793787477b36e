//! Loading of octal memory images.
//!
//! The format is line-oriented: `address: word [word ...]`, all in
//! octal, with consecutive words filling consecutive addresses.
//! Anything from `#` to the end of the line is a comment.
//!
//! ```text
//! # a two-word program and an operand
//! 100: 0024 0014 0405 0000
//! 2005: 6000000000001234
//! ```

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::Path;

use base::prelude::*;
use cpu::MemoryUnit;

#[derive(Debug)]
pub enum ImageError {
    Io(std::io::Error),
    Syntax { line: usize, problem: String },
}

impl Display for ImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::Io(e) => write!(f, "cannot read image: {e}"),
            ImageError::Syntax { line, problem } => {
                write!(f, "image line {line}: {problem}")
            }
        }
    }
}

impl Error for ImageError {}

impl From<std::io::Error> for ImageError {
    fn from(e: std::io::Error) -> ImageError {
        ImageError::Io(e)
    }
}

fn syntax(line: usize, problem: String) -> ImageError {
    ImageError::Syntax { line, problem }
}

/// Parse an octal number, tolerating an `0o` prefix.
pub fn parse_octal(s: &str) -> Result<u64, String> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    u64::from_str_radix(digits, 8).map_err(|e| format!("bad octal number {s:?}: {e}"))
}

/// Load an image file into memory.  Returns the number of words
/// stored.
pub fn load_image(path: &Path, mem: &mut MemoryUnit) -> Result<usize, ImageError> {
    let text = fs::read_to_string(path)?;
    let mut words = 0;
    for (i, raw) in text.lines().enumerate() {
        let lineno = i + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let (addr_part, rest) = line
            .split_once(':')
            .ok_or_else(|| syntax(lineno, "expected `address: word ...`".to_string()))?;
        let addr = parse_octal(addr_part.trim()).map_err(|e| syntax(lineno, e))?;
        if addr >= mem.size() as u64 {
            return Err(syntax(lineno, format!("address {addr:#o} is outside memory")));
        }
        let mut at = addr as Addr;
        for tok in rest.split_whitespace() {
            let w = parse_octal(tok).map_err(|e| syntax(lineno, e))?;
            if w > WORD_MASK {
                return Err(syntax(lineno, format!("{tok} does not fit 48 bits")));
            }
            if usize::from(at) >= mem.size() {
                return Err(syntax(lineno, "words run off the end of memory".to_string()));
            }
            mem.set(at, w);
            at += 1;
            words += 1;
        }
        if at as u64 == addr {
            return Err(syntax(lineno, "no words after the address".to_string()));
        }
    }
    Ok(words)
}
