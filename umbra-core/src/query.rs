//! The query contract: a backend statement paired with a row parser.
//!
//! The backend returns result rows as ordered token sequences. A query
//! contract owns both the statement text and the pure function that consumes
//! exactly one row's tokens, positionally, into a typed row result: value
//! column(s) first, then `count`, then the optional `count_noise`, then (for
//! grouping-set queries) a trailing grouping identifier.

use std::time::Duration;

use serde_json::Value as Token;

use crate::error::{ExploreError, Result};
use crate::value::DValue;

/// The wire marker the backend substitutes for a suppressed column value.
pub const SUPPRESSED_MARKER: &str = "*";

/// An immutable pairing of a query statement with a row parser.
///
/// Implementations are pure descriptions: building one performs no I/O, and
/// `parse_row` must not depend on anything but the tokens it is handed.
pub trait Query: Send + Sync {
    /// The typed result row this query produces.
    type Row: Send;

    /// The statement submitted to the backend.
    fn statement(&self) -> String;

    /// Parses one result row from its positional token stream.
    fn parse_row(&self, reader: &mut RowReader<'_>) -> Result<Self::Row>;

    /// The maximum time to wait for this query before giving up.
    ///
    /// `None` defers to the connection's default.
    fn max_wait(&self) -> Option<Duration> {
        None
    }
}

/// A positional reader over one row's token sequence.
///
/// Each `read_*` call consumes the next token; reading past the end or
/// finding a token of the wrong type is an [`ExploreError::UnexpectedQueryResult`].
#[derive(Debug)]
pub struct RowReader<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> RowReader<'a> {
    /// Creates a reader over one row's tokens.
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn next_token(&mut self, expected: &str) -> Result<&'a Token> {
        let token = self.tokens.get(self.pos).ok_or_else(|| {
            ExploreError::unexpected_result(format!(
                "row ended after {} tokens, expected {expected}",
                self.pos
            ))
        })?;
        self.pos += 1;
        Ok(token)
    }

    /// Reads one tri-state column value.
    ///
    /// A JSON null decodes to [`DValue::Null`]; the `"*"` marker decodes to
    /// [`DValue::Suppressed`]; anything else must decode as `T`.
    pub fn read_value<T: ColumnToken>(&mut self) -> Result<DValue<T>> {
        let token = self.next_token("a column value")?;
        if token.is_null() {
            return Ok(DValue::Null);
        }
        if token.as_str() == Some(SUPPRESSED_MARKER) {
            return Ok(DValue::Suppressed);
        }
        T::from_token(token).map(DValue::Value)
    }

    /// Reads a non-negative occurrence count.
    pub fn read_count(&mut self) -> Result<u64> {
        let token = self.next_token("a count")?;
        token.as_u64().ok_or_else(|| {
            ExploreError::unexpected_result(format!(
                "expected a non-negative integer count, got {token}"
            ))
        })
    }

    /// Reads the optional count noise: absent or null means no noise was
    /// reported for this row.
    pub fn read_noise(&mut self) -> Result<Option<f64>> {
        if self.pos >= self.tokens.len() {
            return Ok(None);
        }
        let token = self.next_token("a count noise")?;
        if token.is_null() {
            return Ok(None);
        }
        token.as_f64().map(Some).ok_or_else(|| {
            ExploreError::unexpected_result(format!("expected a numeric count noise, got {token}"))
        })
    }

    /// Reads the trailing grouping identifier of a grouping-set row.
    pub fn read_grouping_id(&mut self) -> Result<u32> {
        let token = self.next_token("a grouping id")?;
        token
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .ok_or_else(|| {
                ExploreError::unexpected_result(format!("expected a grouping id, got {token}"))
            })
    }

    /// Asserts that the parser consumed the row exactly.
    pub fn finish(&self) -> Result<()> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(ExploreError::unexpected_result(format!(
                "row has {} unconsumed trailing tokens",
                self.tokens.len() - self.pos
            )))
        }
    }
}

/// Decoding of a single column-value token into a concrete Rust type.
pub trait ColumnToken: Sized {
    /// Decodes a non-null, non-suppressed token.
    fn from_token(token: &Token) -> Result<Self>;
}

impl ColumnToken for f64 {
    fn from_token(token: &Token) -> Result<Self> {
        token.as_f64().ok_or_else(|| {
            ExploreError::unexpected_result(format!("expected a numeric value, got {token}"))
        })
    }
}

impl ColumnToken for i64 {
    fn from_token(token: &Token) -> Result<Self> {
        token.as_i64().ok_or_else(|| {
            ExploreError::unexpected_result(format!("expected an integer value, got {token}"))
        })
    }
}

impl ColumnToken for bool {
    fn from_token(token: &Token) -> Result<Self> {
        token.as_bool().ok_or_else(|| {
            ExploreError::unexpected_result(format!("expected a boolean value, got {token}"))
        })
    }
}

impl ColumnToken for String {
    fn from_token(token: &Token) -> Result<Self> {
        token
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| {
                ExploreError::unexpected_result(format!("expected a text value, got {token}"))
            })
    }
}

/// Identity decoding, used by queries over columns of unknown type.
impl ColumnToken for Token {
    fn from_token(token: &Token) -> Result<Self> {
        Ok(token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_value_count_noise_in_order() {
        let tokens = vec![json!(12.5), json!(30), json!(1.8)];
        let mut reader = RowReader::new(&tokens);

        assert_eq!(reader.read_value::<f64>().unwrap(), DValue::Value(12.5));
        assert_eq!(reader.read_count().unwrap(), 30);
        assert_eq!(reader.read_noise().unwrap(), Some(1.8));
        reader.finish().unwrap();
    }

    #[test]
    fn test_null_and_suppressed_markers() {
        let tokens = vec![json!(null), json!("*")];
        let mut reader = RowReader::new(&tokens);

        assert_eq!(reader.read_value::<f64>().unwrap(), DValue::Null);
        assert_eq!(reader.read_value::<f64>().unwrap(), DValue::Suppressed);
    }

    #[test]
    fn test_absent_noise_is_none() {
        let tokens = vec![json!(true), json!(7)];
        let mut reader = RowReader::new(&tokens);

        assert_eq!(reader.read_value::<bool>().unwrap(), DValue::Value(true));
        assert_eq!(reader.read_count().unwrap(), 7);
        assert_eq!(reader.read_noise().unwrap(), None);
        reader.finish().unwrap();
    }

    #[test]
    fn test_negative_count_rejected() {
        let tokens = vec![json!(-3)];
        let mut reader = RowReader::new(&tokens);
        let err = reader.read_count().unwrap_err();
        assert!(matches!(err, ExploreError::UnexpectedQueryResult(_)));
    }

    #[test]
    fn test_reading_past_end_fails() {
        let tokens = vec![json!(1)];
        let mut reader = RowReader::new(&tokens);
        reader.read_count().unwrap();
        assert!(reader.read_count().is_err());
    }

    #[test]
    fn test_unconsumed_tokens_fail_finish() {
        let tokens = vec![json!(1), json!(2)];
        let mut reader = RowReader::new(&tokens);
        reader.read_count().unwrap();
        assert!(reader.finish().is_err());
    }
}
