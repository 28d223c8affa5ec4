//! Minimal column table handed over by the data-loading side.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// Equal-length named columns with an optional date index.
///
/// Numeric columns use `NaN` for missing values. Label columns hold
/// categorical data such as a regime or weekday used for grouping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<Vec<NaiveDate>>,
    numeric: IndexMap<String, Vec<f64>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    labels: IndexMap<String, Vec<String>>,
}

impl Frame {
    /// Empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows; zero when no column or index exists.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index
            .as_ref()
            .map(Vec::len)
            .or_else(|| self.numeric.values().next().map(Vec::len))
            .or_else(|| self.labels.values().next().map(Vec::len))
            .unwrap_or(0)
    }

    /// Whether the frame has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has_shape(&self) -> bool {
        self.index.is_some() || !self.numeric.is_empty() || !self.labels.is_empty()
    }

    fn check_rows(&self, rows: usize) -> EvalResult<()> {
        if self.has_shape() {
            EvalError::check_pair(self.len(), rows)
        } else {
            Ok(())
        }
    }

    /// Adds a numeric column, builder style.
    pub fn with_numeric(mut self, name: impl Into<String>, values: Vec<f64>) -> EvalResult<Self> {
        self.insert_numeric(name, values)?;
        Ok(self)
    }

    /// Adds a label column, builder style.
    pub fn with_labels(mut self, name: impl Into<String>, values: Vec<String>) -> EvalResult<Self> {
        self.insert_labels(name, values)?;
        Ok(self)
    }

    /// Sets the date index, builder style.
    pub fn with_index(mut self, index: Vec<NaiveDate>) -> EvalResult<Self> {
        self.set_index(index)?;
        Ok(self)
    }

    /// Adds or replaces a numeric column.
    pub fn insert_numeric(&mut self, name: impl Into<String>, values: Vec<f64>) -> EvalResult<()> {
        self.check_rows(values.len())?;
        self.numeric.insert(name.into(), values);
        Ok(())
    }

    /// Adds or replaces a label column.
    pub fn insert_labels(&mut self, name: impl Into<String>, values: Vec<String>) -> EvalResult<()> {
        self.check_rows(values.len())?;
        self.labels.insert(name.into(), values);
        Ok(())
    }

    /// Sets or replaces the date index.
    pub fn set_index(&mut self, index: Vec<NaiveDate>) -> EvalResult<()> {
        self.check_rows(index.len())?;
        self.index = Some(index);
        Ok(())
    }

    /// Date index, if any.
    #[must_use]
    pub fn index(&self) -> Option<&[NaiveDate]> {
        self.index.as_deref()
    }

    /// Numeric column by name.
    pub fn numeric(&self, name: &str) -> EvalResult<&[f64]> {
        self.numeric
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| EvalError::UnknownColumn(name.into()))
    }

    /// Mutable view of a numeric column; its length cannot change.
    pub fn numeric_mut(&mut self, name: &str) -> EvalResult<&mut [f64]> {
        self.numeric
            .get_mut(name)
            .map(Vec::as_mut_slice)
            .ok_or_else(|| EvalError::UnknownColumn(name.into()))
    }

    /// Label column by name.
    pub fn labels(&self, name: &str) -> EvalResult<&[String]> {
        self.labels
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| EvalError::UnknownColumn(name.into()))
    }

    /// Whether a numeric or label column exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.numeric.contains_key(name) || self.labels.contains_key(name)
    }

    /// Numeric column names in insertion order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.numeric.keys().map(String::as_str)
    }

    /// Label column names in insertion order.
    pub fn label_columns(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels.keys().map(String::as_str)
    }

    /// Removes a numeric column, returning it.
    pub fn remove_numeric(&mut self, name: &str) -> Option<Vec<f64>> {
        self.numeric.shift_remove(name)
    }

    /// Keeps the rows where `keep` is `true`.
    pub fn filter_rows(&self, keep: &[bool]) -> EvalResult<Self> {
        fn select<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(keep)
                .filter(|(_, k)| **k)
                .map(|(v, _)| v.clone())
                .collect()
        }

        EvalError::check_pair(self.len(), keep.len())?;
        Ok(Self {
            index: self.index.as_deref().map(|idx| select(idx, keep)),
            numeric: self
                .numeric
                .iter()
                .map(|(name, values)| (name.clone(), select(values, keep)))
                .collect(),
            labels: self
                .labels
                .iter()
                .map(|(name, values)| (name.clone(), select(values, keep)))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn columns_must_share_length() {
        let frame = Frame::new()
            .with_numeric("Close", vec![1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(frame.len(), 3);
        assert!(matches!(
            frame.clone().with_numeric("Open", vec![1.0]),
            Err(EvalError::ShapeMismatch { left: 3, right: 1 })
        ));
        assert!(frame
            .clone()
            .with_labels("regime", vec!["a".into(), "b".into()])
            .is_err());
        assert!(frame.with_index(vec![day(1), day(2)]).is_err());
    }

    #[test]
    fn replacing_a_column_keeps_its_position() {
        let mut frame = Frame::new()
            .with_numeric("x", vec![1.0, 2.0])
            .unwrap()
            .with_numeric("y", vec![3.0, 4.0])
            .unwrap();
        frame.insert_numeric("x", vec![5.0, 6.0]).unwrap();
        assert_eq!(frame.numeric_columns().collect::<Vec<_>>(), ["x", "y"]);
        assert_eq!(frame.numeric("x").unwrap(), &[5.0, 6.0]);
        assert!(frame.insert_numeric("x", vec![1.0]).is_err());
    }

    #[test]
    fn unknown_columns_are_reported() {
        let frame = Frame::new();
        assert_eq!(
            frame.numeric("Close"),
            Err(EvalError::UnknownColumn("Close".into()))
        );
        assert!(frame.labels("group").is_err());
        assert!(frame.is_empty());
    }

    #[test]
    fn filter_rows_applies_to_every_column_and_index() {
        let frame = Frame::new()
            .with_index(vec![day(1), day(2), day(3)])
            .unwrap()
            .with_numeric("y", vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_labels("g", vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        let kept = frame.filter_rows(&[true, false, true]).unwrap();
        assert_eq!(kept.numeric("y").unwrap(), &[1.0, 3.0]);
        assert_eq!(kept.labels("g").unwrap(), &["a".to_string(), "c".to_string()]);
        assert_eq!(kept.index().unwrap(), &[day(1), day(3)]);
        assert!(frame.filter_rows(&[true]).is_err());
    }

    #[test]
    fn column_order_is_insertion_order() {
        let mut frame = Frame::new()
            .with_numeric("b", vec![1.0])
            .unwrap()
            .with_numeric("a", vec![2.0])
            .unwrap();
        assert_eq!(frame.numeric_columns().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(frame.remove_numeric("b"), Some(vec![1.0]));
        assert!(!frame.contains("b"));
        assert!(frame.contains("a"));
    }
}
