//! The anonymization-aware value model.
//!
//! Every row coming back from the backend carries column values in one of
//! three states: a present value, a NULL, or a value suppressed by the
//! anonymization engine because the underlying group was too small to
//! disclose safely. Suppression is an anonymization artifact and nullity is a
//! data fact; the two must never be conflated, because a suppressed row never
//! exposes its true value even if that value happened to be NULL.

use serde::Serialize;

use crate::error::{ExploreError, Result};

/// A tri-state column value as returned by the anonymizing backend.
///
/// Exactly one of the three states holds at a time. There is deliberately no
/// panicking accessor: reading the value of a [`DValue::Null`] or
/// [`DValue::Suppressed`] instance is an invalid operation, so [`DValue::value`]
/// returns an `Option` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum DValue<T> {
    /// The column held a disclosable value.
    Value(T),
    /// The column was NULL and the NULL was not suppressed.
    Null,
    /// The value was redacted by the anonymization engine.
    Suppressed,
}

impl<T> DValue<T> {
    /// Returns true if the column contained a disclosable value.
    pub fn has_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns true if the column value was NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if the column value was suppressed by anonymization.
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }

    /// Returns the wrapped value, if there is one.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Consumes the `DValue`, returning the wrapped value if there is one.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Maps a `DValue<T>` to a `DValue<U>` by applying a function to a
    /// contained value, preserving the null/suppressed states.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> DValue<U> {
        match self {
            Self::Value(v) => DValue::Value(f(v)),
            Self::Null => DValue::Null,
            Self::Suppressed => DValue::Suppressed,
        }
    }
}

/// One parsed result row: a column value paired with its occurrence count and
/// the optional noise the anonymization engine added to that count.
///
/// Immutable once constructed by a query contract's row parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueWithCount<T> {
    /// The (tri-state) column value of this row.
    pub value: DValue<T>,
    /// How many rows of the underlying table this row accounts for.
    pub count: u64,
    /// Standard-deviation-like uncertainty on `count`, present only for
    /// anonymized counts.
    pub count_noise: Option<f64>,
}

impl<T> ValueWithCount<T> {
    /// Creates a new row result.
    pub fn new(value: DValue<T>, count: u64, count_noise: Option<f64>) -> Self {
        Self {
            value,
            count,
            count_noise,
        }
    }

    /// Returns true if this row carries a disclosable value.
    pub fn has_value(&self) -> bool {
        self.value.has_value()
    }
}

/// A row that contributes an occurrence count to suppression accounting.
///
/// Implemented by [`ValueWithCount`] and by grouping-set rows so that
/// [`ValueCounts::compute`] can aggregate over either.
pub trait CountedRow {
    /// The occurrence count of the row.
    fn count(&self) -> u64;
    /// Whether the row's value was suppressed.
    fn is_suppressed(&self) -> bool;
    /// Whether the row's value was an unsuppressed NULL.
    fn is_null(&self) -> bool;
}

impl<T> CountedRow for ValueWithCount<T> {
    fn count(&self) -> u64 {
        self.count
    }

    fn is_suppressed(&self) -> bool {
        self.value.is_suppressed()
    }

    fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

/// Suppression accounting over a distinct-values result set.
///
/// Computed once per result set and immutable afterwards. The invariant
/// `suppressed_count + null_count <= total_count` holds by construction, and
/// `total_count` is always non-zero: an empty result set is reported as
/// [`ExploreError::InsufficientData`] instead, never as a summary that would
/// divide by zero downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValueCounts {
    /// Total number of underlying rows accounted for.
    pub total_count: u64,
    /// Rows whose value was suppressed by anonymization.
    pub suppressed_count: u64,
    /// Rows whose value was an unsuppressed NULL.
    pub null_count: u64,
}

impl ValueCounts {
    /// Aggregates counts over a result set.
    ///
    /// Fails with [`ExploreError::InsufficientData`] when the result set
    /// accounts for zero rows; callers must treat that as "exploration cannot
    /// proceed for this column".
    pub fn compute<R: CountedRow>(rows: &[R]) -> Result<Self> {
        let mut counts = ValueCounts {
            total_count: 0,
            suppressed_count: 0,
            null_count: 0,
        };

        for row in rows {
            counts.total_count += row.count();
            if row.is_suppressed() {
                counts.suppressed_count += row.count();
            } else if row.is_null() {
                counts.null_count += row.count();
            }
        }

        if counts.total_count == 0 {
            return Err(ExploreError::insufficient_data(
                "total value count is zero",
            ));
        }

        Ok(counts)
    }

    /// The fraction of rows whose value was suppressed.
    pub fn suppressed_ratio(&self) -> f64 {
        self.suppressed_count as f64 / self.total_count as f64
    }

    /// Rows that carried a disclosable, non-NULL value.
    pub fn disclosed_count(&self) -> u64 {
        self.total_count - self.suppressed_count - self.null_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: DValue<i64>, count: u64) -> ValueWithCount<i64> {
        ValueWithCount::new(value, count, None)
    }

    #[test]
    fn test_dvalue_states_are_exclusive() {
        let present = DValue::Value(42);
        assert!(present.has_value());
        assert!(!present.is_null());
        assert!(!present.is_suppressed());
        assert_eq!(present.value(), Some(&42));

        let null: DValue<i64> = DValue::Null;
        assert!(null.is_null());
        assert_eq!(null.value(), None);

        let suppressed: DValue<i64> = DValue::Suppressed;
        assert!(suppressed.is_suppressed());
        assert!(!suppressed.is_null());
        assert_eq!(suppressed.value(), None);
    }

    #[test]
    fn test_dvalue_map_preserves_state() {
        assert_eq!(DValue::Value(2).map(|v| v * 10), DValue::Value(20));
        assert_eq!(DValue::<i64>::Null.map(|v| v * 10), DValue::Null);
        assert_eq!(DValue::<i64>::Suppressed.map(|v| v * 10), DValue::Suppressed);
    }

    #[test]
    fn test_value_counts_accounting() {
        let rows = vec![
            row(DValue::Value(1), 30),
            row(DValue::Value(2), 50),
            row(DValue::Null, 15),
            row(DValue::Suppressed, 5),
        ];

        let counts = ValueCounts::compute(&rows).unwrap();
        assert_eq!(counts.total_count, 100);
        assert_eq!(counts.suppressed_count, 5);
        assert_eq!(counts.null_count, 15);
        assert_eq!(counts.disclosed_count(), 80);
        assert!((counts.suppressed_ratio() - 0.05).abs() < f64::EPSILON);
    }

    #[test]
    fn test_value_counts_suppressed_null_never_conflated() {
        // A suppressed row must not be counted as null even though its true
        // value might have been.
        let rows = vec![row(DValue::Suppressed, 10)];
        let counts = ValueCounts::compute(&rows).unwrap();
        assert_eq!(counts.suppressed_count, 10);
        assert_eq!(counts.null_count, 0);
    }

    #[test]
    fn test_value_counts_zero_total_is_insufficient_data() {
        let rows: Vec<ValueWithCount<i64>> = Vec::new();
        let err = ValueCounts::compute(&rows).unwrap_err();
        assert!(matches!(err, ExploreError::InsufficientData(_)));

        // Rows present but all zero-count behave the same.
        let rows = vec![row(DValue::Value(1), 0)];
        let err = ValueCounts::compute(&rows).unwrap_err();
        assert!(matches!(err, ExploreError::InsufficientData(_)));
    }
}
