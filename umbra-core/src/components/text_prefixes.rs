//! Common-prefix sampling for text columns.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::component::{Component, ComponentResult, ResultProvider};
use crate::components::histogram::SUPPRESSED_RATIO_THRESHOLD;
use crate::components::ExploreContext;
use crate::connection::Connection;
use crate::grouping::IndexedGroupingSetsResult;
use crate::metrics::{Metric, MetricValue, PublisherComponent};
use crate::queries::TextColumnPrefix;
use crate::value::ValueCounts;

/// Prefix lengths sampled in one grouping-sets query.
const PREFIX_LENGTHS: [usize; 3] = [2, 3, 4];

/// The prefix sample the component settled on.
#[derive(Debug, Clone)]
pub struct TextPrefixes {
    /// The selected prefix length.
    pub length: usize,
    /// Suppression accounting over the selected length's rows.
    pub value_counts: ValueCounts,
    /// Disclosed prefixes with their counts, descending by count.
    pub prefixes: Vec<(String, u64)>,
}

/// Samples column prefixes at several lengths and keeps the longest one with
/// acceptable suppression.
///
/// Longer prefixes describe the column better but fragment the rows into
/// smaller groups, pushing more of them under the anonymization threshold;
/// the selection mirrors the histogram's resolution-versus-suppression
/// trade-off. Yields nothing when every length is dominated by suppression.
pub struct TextPrefixesComponent {
    conn: Arc<Connection>,
    ctx: ExploreContext,
}

impl TextPrefixesComponent {
    /// Creates the component for a text column.
    pub fn new(conn: Arc<Connection>, ctx: ExploreContext) -> Self {
        Self { conn, ctx }
    }
}

#[async_trait]
impl Component for TextPrefixesComponent {
    type Output = Option<TextPrefixes>;

    async fn compute(&self) -> ComponentResult<Option<TextPrefixes>> {
        let lengths: Arc<[usize]> = Arc::from(PREFIX_LENGTHS.as_slice());
        let query = TextColumnPrefix::new(&self.ctx.table, &self.ctx.column, lengths.clone());
        let rows = self.conn.exec(&query).await?;

        let mut per_length: Vec<Vec<IndexedGroupingSetsResult<usize, String>>> =
            (0..lengths.len()).map(|_| Vec::new()).collect();
        for row in rows {
            per_length[row.grouping_index()].push(row);
        }

        // Longest acceptable length wins; iterate from the back.
        for (length, rows) in lengths.iter().zip(per_length).rev() {
            let Ok(value_counts) = ValueCounts::compute(&rows) else {
                continue;
            };
            if value_counts.suppressed_ratio() > SUPPRESSED_RATIO_THRESHOLD {
                continue;
            }

            let mut prefixes: Vec<(String, u64)> = rows
                .iter()
                .filter_map(|row| {
                    row.value()
                        .value()
                        .map(|prefix| (prefix.clone(), row.count()))
                })
                .collect();
            prefixes.sort_by(|a, b| b.1.cmp(&a.1));

            return Ok(Some(TextPrefixes {
                length: *length,
                value_counts,
                prefixes,
            }));
        }

        debug!(
            table = %self.ctx.table,
            column = %self.ctx.column,
            "no prefix length with acceptable suppression"
        );
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "text_prefixes"
    }
}

/// Publishes the selected sample as `text.prefix_length` and `text.prefixes`;
/// nothing when no length was acceptable.
pub struct TextPrefixesPublisher {
    provider: Arc<dyn ResultProvider<Option<TextPrefixes>>>,
}

impl TextPrefixesPublisher {
    /// Wraps a prefix node for publishing.
    pub fn new(provider: Arc<dyn ResultProvider<Option<TextPrefixes>>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl PublisherComponent for TextPrefixesPublisher {
    fn name(&self) -> &'static str {
        "text_prefixes"
    }

    async fn yield_metrics(&self) -> ComponentResult<Vec<Metric>> {
        let Some(sample) = self.provider.result().await? else {
            return Ok(Vec::new());
        };

        let prefixes: Vec<MetricValue> = sample
            .prefixes
            .iter()
            .map(|(prefix, count)| {
                MetricValue::record([
                    ("prefix", MetricValue::from(prefix.as_str())),
                    ("count", MetricValue::from(*count)),
                ])
            })
            .collect();

        Ok(vec![
            Metric::new("text.prefix_length", sample.length as u64),
            Metric::new("text.prefixes", prefixes),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedBackend;
    use serde_json::json;

    fn prefix_row(
        slots: [serde_json::Value; 3],
        count: u64,
        grouping_id: u32,
    ) -> Vec<serde_json::Value> {
        let [a, b, c] = slots;
        vec![a, b, c, json!(count), json!(null), json!(grouping_id)]
    }

    #[tokio::test]
    async fn test_prefers_longest_acceptable_length() {
        // Length 4 (index 2, id 0b110) is heavily suppressed; length 3
        // (index 1, id 0b101) is acceptable and must win over length 2.
        let backend = ScriptedBackend::new()
            .rows(
                "group by grouping sets",
                vec![
                    prefix_row([json!("10"), json!(null), json!(null)], 90, 0b011),
                    prefix_row([json!(null), json!("101"), json!(null)], 60, 0b101),
                    prefix_row([json!(null), json!("102"), json!(null)], 35, 0b101),
                    prefix_row([json!(null), json!("*"), json!(null)], 5, 0b101),
                    prefix_row([json!(null), json!(null), json!("*")], 80, 0b110),
                    prefix_row([json!(null), json!(null), json!("1010")], 20, 0b110),
                ],
            )
            .build();

        let component = TextPrefixesComponent::new(
            Arc::new(Connection::new(backend)),
            ExploreContext::new("clients", "postcode"),
        );

        let sample = component.compute().await.unwrap().expect("acceptable length");
        assert_eq!(sample.length, 3);
        assert_eq!(sample.value_counts.suppressed_count, 5);
        assert_eq!(
            sample.prefixes,
            vec![("101".to_string(), 60), ("102".to_string(), 35)]
        );
    }

    #[tokio::test]
    async fn test_fully_suppressed_column_yields_nothing() {
        let backend = ScriptedBackend::new()
            .rows(
                "group by grouping sets",
                vec![
                    prefix_row([json!("*"), json!(null), json!(null)], 100, 0b011),
                    prefix_row([json!(null), json!("*"), json!(null)], 100, 0b101),
                    prefix_row([json!(null), json!(null), json!("*")], 100, 0b110),
                ],
            )
            .build();

        let component = TextPrefixesComponent::new(
            Arc::new(Connection::new(backend)),
            ExploreContext::new("clients", "postcode"),
        );

        assert!(component.compute().await.unwrap().is_none());
    }
}
