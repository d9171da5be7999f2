//! Pattern-driven numeric formatting.
//!
//! A pattern is a small template string controlling digit grouping, padding
//! and truncation: `#` shows a digit if one exists, `0` shows a digit or pads
//! with a literal zero, `,` is a grouping separator emitted where digits
//! align with it, and any other character is emitted literally. The first
//! `.` splits the pattern into an integer and a fractional template, e.g.
//! `"#,##0.00"` renders `1234.5` as `"1,234.50"`.
//!
//! Formatting works on the decimal string form of the value, not on
//! floating-point arithmetic, so display never picks up binary
//! representation artifacts.

const GROUP_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    /// `#`: a digit if present, else nothing.
    OptionalDigit,
    /// `0`: a digit if present, else a literal zero.
    MandatoryDigit,
    /// `,` (or an in-side `.`): emitted, never consumes a digit.
    Separator,
    /// Any other character: emitted verbatim, never consumes a digit.
    Literal(char),
}

/// A parsed format pattern. Parsing never fails: unsupported characters are
/// treated as literals. A `Pattern` is immutable and formatting through it is
/// deterministic and side-effect free.
#[derive(Debug, Clone)]
pub struct Pattern {
    integer: Vec<Token>,
    fraction: Option<Vec<Token>>,
}

impl Pattern {
    pub fn parse(pattern: &str) -> Self {
        let (int_part, frac_part) = match pattern.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (pattern, None),
        };
        Pattern {
            integer: tokenize(int_part),
            fraction: frac_part.map(tokenize),
        }
    }

    /// Formats a finite value. NaN and infinities render as the empty string;
    /// use [`Pattern::format_or`] to supply a fallback for those.
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return String::new();
        }
        self.format_str(&value.to_string())
    }

    /// Formats a finite value, or returns `fallback` verbatim for NaN and
    /// infinities.
    pub fn format_or(&self, value: f64, fallback: &str) -> String {
        if !value.is_finite() {
            return fallback.to_string();
        }
        self.format_str(&value.to_string())
    }

    /// Formats an already-stringified decimal value (optional leading `-`,
    /// digits, optional `.` and fraction digits).
    pub fn format_str(&self, digits: &str) -> String {
        let (int_digits, frac_digits) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        let integer = fold_side(int_digits, &self.integer, Direction::RightToLeft);
        match &self.fraction {
            Some(tokens) => {
                let fraction = fold_side(frac_digits, tokens, Direction::LeftToRight);
                if fraction.is_empty() {
                    integer
                } else {
                    format!("{integer}.{fraction}")
                }
            }
            None => integer,
        }
    }
}

/// Formats `value` through `pattern` in one call. NaN and infinities render
/// as the empty string.
pub fn format_pattern(value: f64, pattern: &str) -> String {
    Pattern::parse(pattern).format(value)
}

/// Like [`format_pattern`], but NaN and infinities produce `fallback`
/// verbatim.
pub fn format_pattern_or(value: f64, pattern: &str, fallback: &str) -> String {
    Pattern::parse(pattern).format_or(value, fallback)
}

fn tokenize(side: &str) -> Vec<Token> {
    side.chars()
        .map(|c| match c {
            '#' => Token::OptionalDigit,
            '0' => Token::MandatoryDigit,
            ',' | '.' => Token::Separator,
            other => Token::Literal(other),
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Integer side: scan from the ones digit so separators align with it.
    RightToLeft,
    /// Fractional side: scan from the most significant fraction digit so
    /// truncation and padding happen at the tail.
    LeftToRight,
}

/// Folds one side's digit string through one side's token sequence.
fn fold_side(digits: &str, tokens: &[Token], direction: Direction) -> String {
    let reversed = direction == Direction::RightToLeft;
    let input: Vec<char> = if reversed {
        digits.chars().rev().collect()
    } else {
        digits.chars().collect()
    };
    let tokens: Vec<Token> = if reversed {
        tokens.iter().rev().copied().collect()
    } else {
        tokens.to_vec()
    };

    let mut out = String::new();
    let mut cursor = 0usize;
    // Last placeholder slot reached, and the output offset just past the
    // digit it emitted; leftover digits splice in there.
    let mut last_slot: Option<usize> = None;
    let mut splice_at = 0usize;

    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::OptionalDigit => {
                if let Some(&c) = input.get(cursor) {
                    out.push(c);
                    cursor += 1;
                }
                last_slot = Some(i);
                splice_at = out.len();
            }
            Token::MandatoryDigit => {
                match input.get(cursor) {
                    Some(&c) => {
                        out.push(c);
                        cursor += 1;
                    }
                    None => out.push('0'),
                }
                last_slot = Some(i);
                splice_at = out.len();
            }
            Token::Separator => out.push(GROUP_SEPARATOR),
            Token::Literal(c) => out.push(*c),
        }
    }

    if cursor < input.len() && splice_allowed(&tokens, last_slot) {
        let extra = grouped_leftover(&input[cursor..], &tokens, &out[..splice_at]);
        out.insert_str(splice_at, &extra);
    }

    let side = if reversed {
        out.chars().rev().collect::<String>()
    } else {
        out
    };
    cleanup(&side)
}

/// Input digits beyond the template are preserved unless the template is
/// zero-terminated on its outer end (a mandatory template fixes the width and
/// truncates instead).
fn splice_allowed(tokens: &[Token], last_slot: Option<usize>) -> bool {
    let Some(pos) = last_slot else { return false };
    tokens.last() != Some(&Token::MandatoryDigit) && tokens[pos] != Token::MandatoryDigit
}

/// Renders leftover digits, continuing the grouping cycle the template
/// established so arbitrarily large integers stay correctly grouped.
fn grouped_leftover(leftover: &[char], tokens: &[Token], before_splice: &str) -> String {
    let group = group_width(tokens);
    let mut since_sep = before_splice
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .count();
    let mut extra = String::with_capacity(leftover.len() + leftover.len() / 3);
    for &c in leftover {
        if let Some(width) = group {
            if c.is_ascii_digit() && since_sep >= width {
                extra.push(GROUP_SEPARATOR);
                since_sep = 0;
            }
        }
        extra.push(c);
        if c.is_ascii_digit() {
            since_sep += 1;
        }
    }
    extra
}

/// Width of the group closest to the ones digit, or `None` when the template
/// has no separator.
fn group_width(tokens: &[Token]) -> Option<usize> {
    let mut width = 0;
    for tok in tokens {
        match tok {
            Token::Separator => return if width > 0 { Some(width) } else { None },
            Token::OptionalDigit | Token::MandatoryDigit => width += 1,
            Token::Literal(_) => {}
        }
    }
    None
}

/// Strips the separator artifacts that edge alignment produces: runs of
/// separators collapse to one, a leading or trailing separator is dropped,
/// and a `-,` prefix becomes a bare `-`.
fn cleanup(side: &str) -> String {
    let mut out = String::with_capacity(side.len());
    for c in side.chars() {
        if c == GROUP_SEPARATOR && out.ends_with(GROUP_SEPARATOR) {
            continue;
        }
        out.push(c);
    }
    if out.starts_with(GROUP_SEPARATOR) {
        out.remove(0);
    }
    if out.ends_with(GROUP_SEPARATOR) {
        out.pop();
    }
    if let Some(rest) = out.strip_prefix("-,") {
        out = format!("-{rest}");
    }
    out
}
