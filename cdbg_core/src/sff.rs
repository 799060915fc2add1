//! Significant Features Filter (SFF): selects which unitigs downstream
//! neighbourhood/annotation stages run on, from a list already sorted
//! ascending by q-value.

use crate::error::{PipelineError, Result};

/// Either take the first N entries, or every entry at or under a q-value
/// threshold.
#[derive(Debug, Clone, Copy)]
pub enum SignificanceFilter {
    TopN(usize),
    QValue(f64),
}

impl SignificanceFilter {
    /// Selects the leading slice of `items` (already sorted ascending by
    /// q-value) that this filter keeps.
    pub fn select<'a, T>(&self, items: &'a [T], q_value_of: impl Fn(&T) -> f64) -> &'a [T] {
        match self {
            SignificanceFilter::TopN(n) => &items[..(*n).min(items.len())],
            SignificanceFilter::QValue(q) => {
                let count = items.iter().take_while(|item| q_value_of(item) <= *q).count();
                &items[..count]
            }
        }
    }

    /// Parses the CLI `-SFF` value: an integer is a `TopN`, a float is a
    /// `QValue` threshold (the flag's single string carries
    /// either reading).
    pub fn parse(raw: &str) -> Result<Self> {
        if let Ok(n) = raw.parse::<usize>() {
            return Ok(SignificanceFilter::TopN(n));
        }
        if let Ok(q) = raw.parse::<f64>() {
            return Ok(SignificanceFilter::QValue(q));
        }
        Err(PipelineError::input_validation(format!(
            "invalid -SFF value '{raw}': expected an integer top-N or a float q-value threshold"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_n_takes_the_first_n_entries() {
        let items = vec![0.01, 0.02, 0.03, 0.04];
        let filter = SignificanceFilter::TopN(2);
        assert_eq!(filter.select(&items, |&q| q), &[0.01, 0.02]);
    }

    #[test]
    fn top_n_is_clamped_to_the_list_length() {
        let items = vec![0.01, 0.02];
        let filter = SignificanceFilter::TopN(10);
        assert_eq!(filter.select(&items, |&q| q), &[0.01, 0.02]);
    }

    #[test]
    fn q_value_takes_every_item_under_threshold() {
        let items = vec![0.01, 0.02, 0.03, 0.10];
        let filter = SignificanceFilter::QValue(0.05);
        assert_eq!(filter.select(&items, |&q| q), &[0.01, 0.02, 0.03]);
    }

    #[test]
    fn parse_prefers_integer_reading() {
        assert!(matches!(SignificanceFilter::parse("25").unwrap(), SignificanceFilter::TopN(25)));
    }

    #[test]
    fn parse_falls_back_to_float_reading() {
        assert!(matches!(
            SignificanceFilter::parse("0.05").unwrap(),
            SignificanceFilter::QValue(q) if q == 0.05
        ));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(SignificanceFilter::parse("not-a-number").is_err());
    }
}
