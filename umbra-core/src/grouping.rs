//! Decoding of combined grouping-set results.
//!
//! A single statement can aggregate over several grouping-column subsets at
//! once (`group by grouping sets (...)`). The backend distinguishes the rows
//! with a grouping identifier: within the low `group_count` bits, a set bit
//! means the corresponding column was aggregated away and a cleared bit means
//! it was active for the row. The first grouping column maps to the most
//! significant of those bits, following the SQL `grouping_id` convention.
//!
//! Every row of a valid single-column grouping set has exactly one active
//! column; identifiers resolving to zero or several active columns are
//! malformed input and fail fast.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::error::{ExploreError, Result};
use crate::query::{ColumnToken, RowReader};
use crate::value::{CountedRow, DValue};

/// Decoder table cache, one converter per group size.
///
/// The decoding depends only on the group size, and each converter is asked
/// once per result row, so the instances are memoized process-wide.
static CONVERTERS: Lazy<Mutex<HashMap<u32, GroupingIdConverter>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Converts grouping identifiers for a fixed number of grouping columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingIdConverter {
    group_count: u32,
    mask: u32,
}

impl GroupingIdConverter {
    /// Returns the memoized converter for `group_count` grouping columns.
    pub fn get_converter(group_count: u32) -> Result<Self> {
        if group_count == 0 || group_count > 31 {
            return Err(ExploreError::unexpected_result(format!(
                "unsupported grouping set size {group_count}"
            )));
        }

        let mut cache = CONVERTERS.lock().expect("converter cache poisoned");
        Ok(*cache.entry(group_count).or_insert_with(|| Self {
            group_count,
            mask: (1u32 << group_count) - 1,
        }))
    }

    /// Number of grouping columns this converter decodes for.
    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    /// Resolves the 0-based index of the single active (ungrouped) column.
    ///
    /// Fails with [`ExploreError::MalformedGroupingId`] when the identifier
    /// is out of range or resolves to zero or multiple active columns.
    pub fn single_index_from_grouping_id(&self, grouping_id: u32) -> Result<usize> {
        let malformed = || ExploreError::MalformedGroupingId {
            group_count: self.group_count,
            grouping_id,
        };

        if grouping_id > self.mask {
            return Err(malformed());
        }

        let active = !grouping_id & self.mask;
        if active.count_ones() != 1 {
            return Err(malformed());
        }

        Ok((self.group_count - 1 - active.trailing_zeros()) as usize)
    }

    /// The identifier the backend produces for a row grouped by the column at
    /// `index`. Inverse of [`Self::single_index_from_grouping_id`].
    pub fn grouping_id_from_index(&self, index: usize) -> Result<u32> {
        if index >= self.group_count as usize {
            return Err(ExploreError::unexpected_result(format!(
                "grouping index {index} out of range for {} columns",
                self.group_count
            )));
        }
        Ok(self.mask & !(1u32 << (self.group_count as usize - 1 - index)))
    }
}

/// One row of a grouping-set query, resolved to its active grouping column.
///
/// Extends the plain row result with the grouping identifier, the ordered
/// labels of all grouping columns in the statement, and the derived index of
/// the single active one. The index is resolved at parse time so malformed
/// identifiers surface immediately.
#[derive(Debug, Clone)]
pub struct IndexedGroupingSetsResult<L, T> {
    value: DValue<T>,
    count: u64,
    count_noise: Option<f64>,
    grouping_id: u32,
    grouping_index: usize,
    labels: Arc<[L]>,
}

impl<L, T> IndexedGroupingSetsResult<L, T> {
    /// Parses one grouping-set row: one value slot per grouping column (the
    /// inactive slots are NULL on the wire), then count, optional noise, and
    /// the trailing grouping identifier.
    pub fn parse(reader: &mut RowReader<'_>, labels: &Arc<[L]>) -> Result<Self>
    where
        T: ColumnToken,
    {
        let group_count = labels.len() as u32;
        let mut slots = Vec::with_capacity(labels.len());
        for _ in 0..labels.len() {
            slots.push(reader.read_value::<T>()?);
        }
        let count = reader.read_count()?;
        let count_noise = reader.read_noise()?;
        let grouping_id = reader.read_grouping_id()?;

        let grouping_index = GroupingIdConverter::get_converter(group_count)?
            .single_index_from_grouping_id(grouping_id)?;

        let value = slots
            .into_iter()
            .nth(grouping_index)
            .expect("grouping index within slot range");

        Ok(Self {
            value,
            count,
            count_noise,
            grouping_id,
            grouping_index,
            labels: Arc::clone(labels),
        })
    }

    /// The (tri-state) value of the active grouping column.
    pub fn value(&self) -> &DValue<T> {
        &self.value
    }

    /// The occurrence count of this row.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Uncertainty on the count, if the backend reported one.
    pub fn count_noise(&self) -> Option<f64> {
        self.count_noise
    }

    /// The raw grouping identifier from the backend.
    pub fn grouping_id(&self) -> u32 {
        self.grouping_id
    }

    /// The 0-based index of the active grouping column.
    pub fn grouping_index(&self) -> usize {
        self.grouping_index
    }

    /// The label of the active grouping column.
    pub fn grouping_label(&self) -> &L {
        &self.labels[self.grouping_index]
    }

    /// Labels of all grouping columns in statement order.
    pub fn grouping_labels(&self) -> &[L] {
        &self.labels
    }
}

impl<L, T> CountedRow for IndexedGroupingSetsResult<L, T> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_group_decodes_to_zero() {
        let converter = GroupingIdConverter::get_converter(1).unwrap();
        assert_eq!(converter.single_index_from_grouping_id(0).unwrap(), 0);
    }

    #[test]
    fn test_first_column_is_most_significant_bit() {
        // Three columns: active column 0 clears the top of the low three
        // bits, giving id 0b011.
        let converter = GroupingIdConverter::get_converter(3).unwrap();
        assert_eq!(converter.single_index_from_grouping_id(0b011).unwrap(), 0);
        assert_eq!(converter.single_index_from_grouping_id(0b101).unwrap(), 1);
        assert_eq!(converter.single_index_from_grouping_id(0b110).unwrap(), 2);
    }

    #[test]
    fn test_roundtrip_with_grouping_id_from_index() {
        let converter = GroupingIdConverter::get_converter(4).unwrap();
        for index in 0..4 {
            let id = converter.grouping_id_from_index(index).unwrap();
            assert_eq!(converter.single_index_from_grouping_id(id).unwrap(), index);
        }
    }

    #[test]
    fn test_zero_or_multiple_active_columns_fail() {
        let converter = GroupingIdConverter::get_converter(3).unwrap();

        // All bits set: nothing active.
        let err = converter.single_index_from_grouping_id(0b111).unwrap_err();
        assert!(matches!(err, ExploreError::MalformedGroupingId { .. }));

        // Two cleared bits: two active columns.
        let err = converter.single_index_from_grouping_id(0b001).unwrap_err();
        assert!(matches!(err, ExploreError::MalformedGroupingId { .. }));

        // Out of range for three columns.
        let err = converter.single_index_from_grouping_id(0b1011).unwrap_err();
        assert!(matches!(err, ExploreError::MalformedGroupingId { .. }));
    }

    #[test]
    fn test_converter_rejects_degenerate_sizes() {
        assert!(GroupingIdConverter::get_converter(0).is_err());
        assert!(GroupingIdConverter::get_converter(32).is_err());
    }

    #[test]
    fn test_parse_grouping_set_row() {
        let labels: Arc<[f64]> = Arc::from(vec![1.0, 10.0, 100.0].into_boxed_slice());
        // Active column 1 (id 0b101): slots are null except the active one.
        let tokens = vec![
            json!(null),
            json!(20.0),
            json!(null),
            json!(17),
            json!(1.5),
            json!(0b101),
        ];
        let mut reader = RowReader::new(&tokens);

        let row = IndexedGroupingSetsResult::<f64, f64>::parse(&mut reader, &labels).unwrap();
        reader.finish().unwrap();

        assert_eq!(row.grouping_index(), 1);
        assert_eq!(*row.grouping_label(), 10.0);
        assert_eq!(row.value(), &DValue::Value(20.0));
        assert_eq!(row.count(), 17);
        assert_eq!(row.count_noise(), Some(1.5));
    }

    #[test]
    fn test_parse_rejects_malformed_id() {
        let labels: Arc<[f64]> = Arc::from(vec![1.0, 10.0].into_boxed_slice());
        let tokens = vec![json!(null), json!(null), json!(3), json!(null), json!(0b11)];
        let mut reader = RowReader::new(&tokens);

        let err =
            IndexedGroupingSetsResult::<f64, f64>::parse(&mut reader, &labels).unwrap_err();
        assert!(matches!(err, ExploreError::MalformedGroupingId { .. }));
    }
}
