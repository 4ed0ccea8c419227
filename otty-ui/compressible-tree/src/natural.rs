//! Natural ordering for labels such as file names: `file2` before
//! `file10`.

use std::cmp::Ordering;

use crate::object::TreeSorter;

/// Compare two labels with digit runs ordered by value.
///
/// Text runs compare case-insensitively first. Labels that only differ in
/// case or leading zeros still get a stable order.
pub fn compare_natural(left: &str, right: &str) -> Ordering {
    let mut left_runs = Runs::new(left);
    let mut right_runs = Runs::new(right);

    loop {
        let ord = match (left_runs.next(), right_runs.next()) {
            (Some(Run::Number(l)), Some(Run::Number(r))) => {
                compare_numbers(l, r)
            },
            (Some(Run::Text(l)), Some(Run::Text(r))) => compare_text(l, r),
            (Some(Run::Number(_)), Some(Run::Text(_))) => Ordering::Less,
            (Some(Run::Text(_)), Some(Run::Number(_))) => Ordering::Greater,
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => return left.cmp(right),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// Sorter for any element that reads as a label.
pub fn natural_sorter<T: AsRef<str> + 'static>() -> Box<TreeSorter<T>> {
    Box::new(|left: &T, right: &T| {
        compare_natural(left.as_ref(), right.as_ref())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run<'a> {
    Text(&'a str),
    Number(&'a str),
}

/// Splits a label into alternating text and ASCII digit runs.
struct Runs<'a> {
    rest: &'a str,
}

impl<'a> Runs<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }
}

impl<'a> Iterator for Runs<'a> {
    type Item = Run<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .find(|ch: char| ch.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());

        let (run, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits { Run::Number(run) } else { Run::Text(run) })
    }
}

fn compare_text(left: &str, right: &str) -> Ordering {
    let folded = left
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase));
    folded.then_with(|| left.cmp(right))
}

/// Value first, then the shorter spelling (fewer leading zeros).
fn compare_numbers(left: &str, right: &str) -> Ordering {
    let left_value = strip_zeros(left);
    let right_value = strip_zeros(right);

    left_value
        .len()
        .cmp(&right_value.len())
        .then_with(|| left_value.cmp(right_value))
        .then_with(|| left.len().cmp(&right.len()))
}

fn strip_zeros(digits: &str) -> &str {
    match digits.trim_start_matches('0') {
        "" => "0",
        value => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(input: &str) -> Vec<Run<'_>> {
        Runs::new(input).collect()
    }

    #[test]
    fn digit_runs_compare_by_value() {
        assert_eq!(compare_natural("file2", "file10"), Ordering::Less);
        assert_eq!(compare_natural("a9b10", "a9b2"), Ordering::Greater);
        assert_eq!(compare_natural("v1.10", "v1.9"), Ordering::Greater);
    }

    #[test]
    fn leading_zeros_break_ties_only() {
        assert_eq!(compare_natural("file02", "file2"), Ordering::Greater);
        assert_eq!(compare_natural("file002", "file3"), Ordering::Less);
        assert_eq!(compare_natural("00", "0"), Ordering::Greater);
    }

    #[test]
    fn numbers_sort_before_text_and_prefixes_first() {
        assert_eq!(compare_natural("1a", "a1"), Ordering::Less);
        assert_eq!(compare_natural("abc", "abc1"), Ordering::Less);
        assert_eq!(compare_natural("same", "same"), Ordering::Equal);
    }

    #[test]
    fn text_ignores_case_then_uses_it_as_tiebreak() {
        assert_eq!(compare_natural("alpha", "Bravo"), Ordering::Less);
        assert_eq!(compare_natural("a", "A"), Ordering::Greater);
    }

    #[test]
    fn runs_split_on_ascii_digits_only() {
        assert!(runs("").is_empty());
        assert_eq!(
            runs("ab12cd"),
            vec![Run::Text("ab"), Run::Number("12"), Run::Text("cd")]
        );
        assert_eq!(runs("x١٢"), vec![Run::Text("x١٢")]);
    }

    #[test]
    fn sorting_with_natural_sorter_is_stable_for_mixed_labels() {
        let sorter = natural_sorter::<String>();
        let mut labels: Vec<String> = ["item10", "Item2", "item2", "item1"]
            .into_iter()
            .map(String::from)
            .collect();

        labels.sort_by(|left, right| sorter(left, right));

        assert_eq!(labels, vec!["item1", "Item2", "item2", "item10"]);
    }
}
