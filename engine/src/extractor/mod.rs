use regex::Regex;

/// Numeric literal pattern: optional sign, integer or decimal (`12`, `3.14`,
/// `1.`, `.5`), optional exponent (`1e-3`, `-2.5E6`).
const NUMBER_PATTERN: &str = r"[-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?";

/// Extracts numeric values from free-form user text
///
/// Separators and surrounding words are ignored; only the numeric substrings
/// matter, and they are returned in the order they appear. A token that looks
/// numeric but does not parse to a finite `f64` is dropped.
///
/// # Example
///
/// ```
/// use labbot_engine::extractor::NumericExtractor;
///
/// let extractor = NumericExtractor::new().unwrap();
/// let values = extractor.extract("10.1 10.2, 10.0; 10.3");
/// assert_eq!(values, vec![10.1, 10.2, 10.0, 10.3]);
/// ```
#[derive(Debug, Clone)]
pub struct NumericExtractor {
    pattern: Regex,
}

impl NumericExtractor {
    /// Create a new extractor with the numeric literal pattern compiled
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(NUMBER_PATTERN)?,
        })
    }

    /// Extract all numbers from `text` in order of appearance
    pub fn extract(&self, text: &str) -> Vec<f64> {
        if text.is_empty() {
            return Vec::new();
        }

        let values: Vec<f64> = self
            .pattern
            .find_iter(text)
            .filter_map(|m| match m.as_str().parse::<f64>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => {
                    tracing::debug!("Dropping unparsable numeric token: {}", m.as_str());
                    None
                }
            })
            .collect();

        tracing::debug!("Extracted {} numbers", values.len());
        values
    }

    /// First number in `text`, if any
    pub fn first(&self, text: &str) -> Option<f64> {
        self.extract(text).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> NumericExtractor {
        NumericExtractor::new().unwrap()
    }

    #[test]
    fn test_mixed_separators_preserve_order() {
        let values = extractor().extract("10.1 10.2, 10.0; 10.3");
        assert_eq!(values, vec![10.1, 10.2, 10.0, 10.3]);
    }

    #[test]
    fn test_newlines_and_words_are_ignored() {
        let values = extractor().extract("first 1.5\nsecond 2.5 mm\nthird: 3");
        assert_eq!(values, vec![1.5, 2.5, 3.0]);
    }

    #[test]
    fn test_empty_and_non_numeric_input() {
        assert!(extractor().extract("").is_empty());
        assert!(extractor().extract("no numbers here").is_empty());
    }

    #[test]
    fn test_signs_and_exponents() {
        let values = extractor().extract("-12 +3.14 1e-3 -2.5E6");
        assert_eq!(values, vec![-12.0, 3.14, 0.001, -2.5e6]);
    }

    #[test]
    fn test_bare_fraction_and_trailing_dot() {
        let values = extractor().extract(".5 and 1.");
        assert_eq!(values, vec![0.5, 1.0]);
    }

    #[test]
    fn test_overflowing_literal_is_dropped() {
        let values = extractor().extract("1e999 2");
        assert_eq!(values, vec![2.0]);
    }

    #[test]
    fn test_first() {
        assert_eq!(extractor().first("error 0.01 or 0.02"), Some(0.01));
        assert_eq!(extractor().first("none"), None);
    }
}
