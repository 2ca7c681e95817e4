//! Batch preparation for the set-based upsert.

use std::collections::HashMap;

use siphon_core::ProcessedData;

/// Collapse a batch onto its conflict target `(tenant_id, data_name,
/// unique_key_value)`, keeping the last occurrence of each key.
///
/// Postgres rejects a statement whose `ON CONFLICT DO UPDATE` would
/// touch the same row twice, so duplicate identities inside one batch
/// must be resolved before the statement. Last-wins matches the
/// row-level semantics across batches: a later record for the same
/// identity replaces the earlier one. Source order of the surviving
/// records is preserved.
pub fn dedupe_on_conflict_target(batch: &[ProcessedData]) -> Vec<&ProcessedData> {
    let mut last_index: HashMap<(&uuid::Uuid, &str, &str), usize> = HashMap::new();
    for (i, record) in batch.iter().enumerate() {
        last_index.insert(
            (
                &record.tenant_id,
                record.data_name.as_str(),
                record.unique_key_value.as_str(),
            ),
            i,
        );
    }

    let mut keep: Vec<usize> = last_index.into_values().collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| &batch[i]).collect()
}
