//! Declarative validation rules: a matcher pattern plus accepted lengths.
//!
//! Rules drive every field: PAN and CVC per brand, and the brand-less
//! defaults for PAN, CVC, month, year and the full expiry date.
//!
//! # Patterns
//!
//! Rule patterns are written for engines with lookaround, for example
//! Visa's `^(?!^493698\d*$)4\d*$`, which keeps a Maestro range out of
//! Visa. The `regex` crate has no lookaround, so [`Matcher`] lifts a
//! leading negative lookahead into a separate exclusion regex.
//!
//! ```
//! use access_checkout::rule::Matcher;
//!
//! let visa = Matcher::new(r"^(?!^493698\d*$)4\d*$").unwrap();
//! assert!(visa.is_match("4111"));
//! assert!(!visa.is_match("4936981234"));
//! assert!(visa.is_match("49369"));
//! ```

use crate::error::ConfigurationError;
use regex::Regex;
use std::fmt;

/// Outcome of validating one field.
///
/// `partial` means the text could still become valid by adding characters;
/// `complete` means it is valid as it stands. They are computed
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ValidationResult {
    /// The text could become valid with more input.
    pub partial: bool,
    /// The text is valid now.
    pub complete: bool,
}

impl ValidationResult {
    /// Neither partial nor complete.
    pub const INVALID: Self = Self::new(false, false);

    /// Creates a result from its two flags.
    #[inline]
    pub const fn new(partial: bool, complete: bool) -> Self {
        Self { partial, complete }
    }

    /// Shorthand for `complete`.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.complete
    }

    /// The text can never become valid, however much is typed.
    #[inline]
    pub const fn is_unmatchable(&self) -> bool {
        !self.partial && !self.complete
    }
}

/// A compiled rule pattern.
#[derive(Clone)]
pub struct Matcher {
    source: String,
    include: Regex,
    exclude: Option<Regex>,
}

impl Matcher {
    /// Compiles a pattern.
    ///
    /// Surrounding `/.../` delimiters are removed. A negative lookahead at
    /// the start of the pattern (after an optional `^`) becomes an
    /// exclusion check anchored at the start of the text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] if either part fails to
    /// compile, including lookaround anywhere other than the start.
    pub fn new(pattern: &str) -> Result<Self, ConfigurationError> {
        let trimmed = strip_delimiters(pattern);
        let (include, exclude) = split_leading_lookahead(trimmed);

        let compile = |p: &str| {
            Regex::new(p).map_err(|e| ConfigurationError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
        };

        Ok(Self {
            source: pattern.to_string(),
            include: compile(&include)?,
            exclude: exclude.as_deref().map(compile).transpose()?,
        })
    }

    /// Tests the text against the pattern.
    #[inline]
    pub fn is_match(&self, text: &str) -> bool {
        self.include.is_match(text) && !self.exclude.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// The pattern as it was supplied.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Matcher").field(&self.source).finish()
    }
}

impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Matcher {}

fn strip_delimiters(pattern: &str) -> &str {
    let trimmed = pattern.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('/') && trimmed.ends_with('/') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Splits `^(?!X)Y` into (`^Y`, `^(?:X)`). Anything else is returned as is.
fn split_leading_lookahead(pattern: &str) -> (String, Option<String>) {
    let (anchor, rest) = match pattern.strip_prefix('^') {
        Some(rest) => ("^", rest),
        None => ("", pattern),
    };

    let Some(body) = rest.strip_prefix("(?!") else {
        return (pattern.to_string(), None);
    };

    let mut depth = 1usize;
    let mut escaped = false;
    let mut in_class = false;

    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => {
                depth -= 1;
                if depth == 0 {
                    let inner = &body[..i];
                    let remainder = &body[i + 1..];
                    let remainder = remainder.strip_prefix('^').unwrap_or(remainder);
                    return (
                        format!("{anchor}{remainder}"),
                        Some(format!("^(?:{inner})")),
                    );
                }
            }
            _ => {}
        }
    }

    // Unbalanced: let the regex compiler report it.
    (pattern.to_string(), None)
}

/// A matcher plus the set of accepted total lengths.
///
/// Lengths are kept sorted and de-duplicated; the last one is the field's
/// maximum length. A rule without a matcher accepts any characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardValidationRule {
    matcher: Option<Matcher>,
    valid_lengths: Vec<usize>,
}

impl CardValidationRule {
    /// Builds a rule from an optional pattern and its accepted lengths.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPattern`] if the pattern does not
    /// compile.
    ///
    /// # Example
    ///
    /// ```
    /// use access_checkout::rule::CardValidationRule;
    ///
    /// let rule = CardValidationRule::new(Some(r"^3[47]\d*$"), [15]).unwrap();
    /// assert_eq!(rule.max_length(), 15);
    /// let result = rule.validate("3782");
    /// assert!(result.partial && !result.complete);
    /// ```
    pub fn new(
        pattern: Option<&str>,
        valid_lengths: impl IntoIterator<Item = usize>,
    ) -> Result<Self, ConfigurationError> {
        let matcher = pattern.map(Matcher::new).transpose()?;
        Ok(Self::from_matcher(matcher, valid_lengths))
    }

    /// Builds a rule from an already compiled matcher.
    pub fn from_matcher(
        matcher: Option<Matcher>,
        valid_lengths: impl IntoIterator<Item = usize>,
    ) -> Self {
        let mut valid_lengths: Vec<usize> = valid_lengths.into_iter().collect();
        valid_lengths.sort_unstable();
        valid_lengths.dedup();

        Self {
            matcher,
            valid_lengths,
        }
    }

    /// The rule's matcher, if any.
    pub fn matcher(&self) -> Option<&Matcher> {
        self.matcher.as_ref()
    }

    /// Accepted lengths, ascending.
    pub fn valid_lengths(&self) -> &[usize] {
        &self.valid_lengths
    }

    /// Largest accepted length, or 0 when the rule accepts no length.
    #[inline]
    pub fn max_length(&self) -> usize {
        self.valid_lengths.last().copied().unwrap_or(0)
    }

    /// Whether `length` is one of the accepted lengths.
    #[inline]
    pub fn is_valid_length(&self, length: usize) -> bool {
        self.valid_lengths.binary_search(&length).is_ok()
    }

    /// Whether the text matches the pattern (always true without one).
    #[inline]
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.as_ref().map_or(true, |m| m.is_match(text))
    }

    /// Pattern and length check, without any checksum.
    pub fn validate(&self, text: &str) -> ValidationResult {
        if !self.matches(text) {
            return ValidationResult::INVALID;
        }

        let length = text.chars().count();
        ValidationResult::new(length <= self.max_length(), self.is_valid_length(length))
    }
}
