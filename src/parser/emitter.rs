use crate::models::{DetailRow, Record, RowBatch, ScalarRow};

/// Projects a record into its two row sets.
///
/// Always yields exactly one scalar row; detail rows follow the record's entry
/// order and are empty when the record has no entries.
pub fn emit(record: Record) -> RowBatch {
    let Record { id, level, entries } = record;

    let details = entries
        .into_iter()
        .map(|entry| DetailRow {
            id: id.clone(),
            object_name: entry.name,
        })
        .collect();

    RowBatch {
        scalar: ScalarRow { id, level },
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;

    #[test]
    fn emit_keeps_entry_order() {
        let record = Record {
            id: "rec-1".to_string(),
            level: 12,
            entries: ["b", "a", "c"]
                .iter()
                .map(|n| Entry {
                    name: n.to_string(),
                })
                .collect(),
        };

        let batch = emit(record);
        assert_eq!(
            batch.scalar,
            ScalarRow {
                id: "rec-1".to_string(),
                level: 12
            }
        );
        let names: Vec<&str> = batch
            .details
            .iter()
            .map(|r| r.object_name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert!(batch.details.iter().all(|r| r.id == "rec-1"));
    }

    #[test]
    fn emit_zero_entries_yields_single_scalar_row() {
        let batch = emit(Record {
            id: "lonely".to_string(),
            level: 1,
            entries: vec![],
        });
        assert_eq!(batch.scalar.id, "lonely");
        assert_eq!(batch.detail_count(), 0);
    }
}
