//! String operations applied to a single result cell.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextOperation {
    Upper,
    Lower,
    /// 1-based `start`, length in characters.
    Substring { start: usize, length: usize },
    Trim,
    LTrim,
    RTrim,
    /// Pad on the left up to `length` characters; longer text is kept whole.
    LPad { length: usize, fill: char },
    RPad { length: usize, fill: char },
    Concat(String),
    /// Preview of the SQL `||` operator: `text || other`.
    ConcatOperator(String),
}

impl TextOperation {
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        match self {
            Self::Upper => text.to_uppercase(),
            Self::Lower => text.to_lowercase(),
            Self::Substring { start, length } => text
                .chars()
                .skip(start.saturating_sub(1))
                .take(*length)
                .collect(),
            Self::Trim => text.trim().to_string(),
            Self::LTrim => text.trim_start().to_string(),
            Self::RTrim => text.trim_end().to_string(),
            Self::LPad { length, fill } => {
                let pad = length.saturating_sub(text.chars().count());
                std::iter::repeat_n(*fill, pad).chain(text.chars()).collect()
            }
            Self::RPad { length, fill } => {
                let pad = length.saturating_sub(text.chars().count());
                text.chars().chain(std::iter::repeat_n(*fill, pad)).collect()
            }
            Self::Concat(other) => format!("{text}{other}"),
            Self::ConcatOperator(other) => format!("{text} || {other}"),
        }
    }
}

impl fmt::Display for TextOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upper => write!(f, "UPPER"),
            Self::Lower => write!(f, "LOWER"),
            Self::Substring { start, length } => write!(f, "SUBSTRING({start}, {length})"),
            Self::Trim => write!(f, "TRIM"),
            Self::LTrim => write!(f, "LTRIM"),
            Self::RTrim => write!(f, "RTRIM"),
            Self::LPad { length, fill } => write!(f, "LPAD({length}, '{fill}')"),
            Self::RPad { length, fill } => write!(f, "RPAD({length}, '{fill}')"),
            Self::Concat(other) => write!(f, "CONCAT('{other}')"),
            Self::ConcatOperator(other) => write!(f, "|| '{other}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_trim() {
        assert_eq!(TextOperation::Upper.apply("War and Peace"), "WAR AND PEACE");
        assert_eq!(TextOperation::Lower.apply("ISBN"), "isbn");
        assert_eq!(TextOperation::Trim.apply("  x  "), "x");
        assert_eq!(TextOperation::LTrim.apply("  x  "), "x  ");
        assert_eq!(TextOperation::RTrim.apply("  x  "), "  x");
    }

    #[test]
    fn test_substring_is_one_based_and_char_aware() {
        let op = TextOperation::Substring { start: 1, length: 3 };
        assert_eq!(op.apply("Onegin"), "One");
        let op = TextOperation::Substring { start: 3, length: 10 };
        assert_eq!(op.apply("Жизнь"), "знь");
        let op = TextOperation::Substring { start: 0, length: 2 };
        assert_eq!(op.apply("abc"), "ab");
    }

    #[test]
    fn test_padding() {
        assert_eq!(TextOperation::LPad { length: 5, fill: '0' }.apply("42"), "00042");
        assert_eq!(TextOperation::RPad { length: 4, fill: '.' }.apply("ab"), "ab..");
        assert_eq!(TextOperation::LPad { length: 2, fill: ' ' }.apply("long"), "long");
    }

    #[test]
    fn test_concat() {
        assert_eq!(TextOperation::Concat("!".to_string()).apply("1984"), "1984!");
        assert_eq!(
            TextOperation::ConcatOperator("'x'".to_string()).apply("title"),
            "title || 'x'"
        );
    }
}
