//! Page range expressions.
//!
//! Turns human-entered text such as `"19-20, 21, 22-25"` into an ordered list
//! of one-indexed, inclusive [`PageRange`]s.
//!
//! [`parse`] is deliberately lenient: it picks out `<digits>` or
//! `<digits> - <digits>` tokens and treats every other character as a
//! separator, so it never fails. Bounds and ordering are checked later,
//! against a real document, by the compositor. [`parse_strict`] is the opt-in
//! validating variant.

use std::fmt;
use std::iter::Peekable;
use std::ops::Range;
use std::str::Chars;

use thiserror::Error;

/// A one-indexed, inclusive page range as written by the user.
///
/// Nothing guarantees `1 <= start <= end` here; see [`PageRange::to_zero_based`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub const fn single(page: u32) -> Self {
        Self::new(page, page)
    }

    /// Convert to the zero-indexed, half-open slice over a page list.
    ///
    /// One-indexed inclusive `start..=end` becomes `start - 1 .. end`: the
    /// start moves down by one and the inclusive end is already the exclusive
    /// upper bound. Returns `None` for page `0` or an inverted range.
    pub fn to_zero_based(self) -> Option<Range<usize>> {
        if self.start == 0 || self.end < self.start {
            return None;
        }
        let start = usize::try_from(self.start - 1).ok()?;
        let end = usize::try_from(self.end).ok()?;
        Some(start..end)
    }

    /// Number of pages covered, 0 when inverted.
    pub const fn len(self) -> u32 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl From<(u32, u32)> for PageRange {
    fn from((start, end): (u32, u32)) -> Self {
        Self::new(start, end)
    }
}

/// Parse a range expression, ignoring anything that is not a range token.
///
/// ```
/// use pdf_splitter_core::range::{parse, PageRange};
///
/// assert_eq!(
///     parse("19-20, 21, 22-25"),
///     vec![PageRange::new(19, 20), PageRange::single(21), PageRange::new(22, 25)]
/// );
/// assert!(parse("abc").is_empty());
/// ```
pub fn parse(expression: &str) -> Vec<PageRange> {
    let mut scanner = Scanner::new(expression);
    let mut ranges = Vec::new();

    while let Some(start) = scanner.next_number() {
        // Optional whitespace, optional dash, optional whitespace, optional
        // second number. Whatever is skipped here is a separator anyway.
        scanner.skip_whitespace();
        scanner.eat('-');
        scanner.skip_whitespace();
        let end = scanner.number().unwrap_or(start);
        ranges.push(PageRange::new(start, end));
    }

    ranges
}

/// Why [`parse_strict`] rejected an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeSyntaxError {
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedCharacter { found: char, offset: usize },

    #[error("malformed range {0:?}")]
    Malformed(String),

    #[error("page numbers start at 1")]
    ZeroPage,

    #[error("range {0} ends before it starts")]
    Inverted(PageRange),

    #[error("no page ranges given")]
    Empty,
}

/// Parse a comma-separated list of `N` or `N-M` items, rejecting anything else.
///
/// Well-formed input yields the same ranges as [`parse`]; stray characters,
/// page `0`, inverted ranges and empty input are reported instead of dropped.
pub fn parse_strict(expression: &str) -> Result<Vec<PageRange>, RangeSyntaxError> {
    let mut ranges = Vec::new();
    let mut offset = 0;

    for item in expression.split(',') {
        if let Some((pos, found)) = item
            .char_indices()
            .find(|&(_, c)| !(decimal_digit(c).is_some() || c == '-' || c.is_whitespace()))
        {
            return Err(RangeSyntaxError::UnexpectedCharacter {
                found,
                offset: offset + pos,
            });
        }
        offset += item.len() + 1;

        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }

        let parts: Vec<&str> = trimmed.split('-').map(str::trim).collect();
        let well_formed = parts.len() <= 2
            && parts
                .iter()
                .all(|part| !part.is_empty() && part.chars().all(|c| decimal_digit(c).is_some()));
        if !well_formed {
            return Err(RangeSyntaxError::Malformed(trimmed.to_string()));
        }

        let range = parse(trimmed)
            .first()
            .copied()
            .ok_or_else(|| RangeSyntaxError::Malformed(trimmed.to_string()))?;
        if range.start == 0 || range.end == 0 {
            return Err(RangeSyntaxError::ZeroPage);
        }
        if range.end < range.start {
            return Err(RangeSyntaxError::Inverted(range));
        }
        ranges.push(range);
    }

    if ranges.is_empty() {
        return Err(RangeSyntaxError::Empty);
    }
    Ok(ranges)
}

/// Zero code points of the decimal digit blocks the scanner understands.
///
/// Each block holds the ten digits `0..=9` in order.
const DIGIT_ZEROS: &[u32] = &[
    0x0030, // ASCII
    0x0660, // Arabic-Indic
    0x06F0, // Extended Arabic-Indic
    0x0966, // Devanagari
    0x09E6, // Bengali
    0x0A66, // Gurmukhi
    0x0AE6, // Gujarati
    0x0B66, // Oriya
    0x0BE6, // Tamil
    0x0C66, // Telugu
    0x0CE6, // Kannada
    0x0D66, // Malayalam
    0x0E50, // Thai
    0x0ED0, // Lao
    0x0F20, // Tibetan
    0x1040, // Myanmar
    0x17E0, // Khmer
    0x1810, // Mongolian
    0xFF10, // Fullwidth
];

/// Value of a decimal digit, including non-ASCII ones such as `'３'`.
fn decimal_digit(c: char) -> Option<u32> {
    let code = u32::from(c);
    DIGIT_ZEROS
        .iter()
        .find(|&&zero| (zero..zero + 10).contains(&code))
        .map(|&zero| code - zero)
}

struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    /// Skip to the next digit run and read it.
    fn next_number(&mut self) -> Option<u32> {
        while let Some(&c) = self.chars.peek() {
            if decimal_digit(c).is_some() {
                return self.number();
            }
            self.chars.next();
        }
        None
    }

    /// Read a digit run at the current position. Saturates at `u32::MAX`.
    fn number(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(digit) = self.chars.peek().copied().and_then(decimal_digit) {
            let acc = value.unwrap_or(0);
            value = Some(acc.saturating_mul(10).saturating_add(digit));
            self.chars.next();
        }
        value
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, expected: char) {
        self.chars.next_if_eq(&expected);
    }
}
