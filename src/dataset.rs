//! Dataset import (`spec.md` §6, promoted to a service per `SPEC_FULL.md` §4.9).

use std::sync::Arc;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::store::{Label, Message, MessageId, MessageStatus, Source, Split, Store};

/// The fixed seed `spec.md` §6 requires for reproducible train/holdout
/// partitions.
const IMPORT_SHUFFLE_SEED: u64 = 42;
const TRAIN_FRACTION: f64 = 0.8;

/// Outcome of one [`DatasetImporter::import`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub train_count: usize,
    pub holdout_count: usize,
}

pub struct DatasetImporter {
    store: Arc<dyn Store>,
}

impl DatasetImporter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        DatasetImporter { store }
    }

    /// Parses `<label>\t<text>` lines, case-insensitive label, blank lines
    /// skipped. Malformed lines are skipped and counted rather than
    /// failing the whole import.
    fn parse_lines(raw: &str) -> (Vec<(Label, String)>, usize) {
        let mut rows = Vec::new();
        let mut skipped = 0;

        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((label_raw, text)) => match Label::parse(label_raw) {
                    Some(label) if !text.trim().is_empty() => {
                        rows.push((label, text.trim().to_string()));
                    }
                    _ => {
                        warn!(line, "skipping malformed dataset line");
                        skipped += 1;
                    }
                },
                None => {
                    warn!(line, "skipping dataset line with no label separator");
                    skipped += 1;
                }
            }
        }

        (rows, skipped)
    }

    async fn existing_dataset_rows(&self) -> AppResult<Vec<Message>> {
        self.store
            .list_messages_by_source_split(Source::Dataset, None)
            .await
    }

    /// `Import(path, force)` (`spec.md` §6): shuffles with the fixed seed
    /// 42 and partitions 80/20 into `TrainPool`/`ValidationHoldout`.
    /// Without `force`, re-importing over an existing dataset is a no-op.
    /// With `force`, all prior `Source::Dataset` rows are deleted first.
    pub async fn import(&self, path: &str, force: bool) -> AppResult<ImportReport> {
        let existing = self.existing_dataset_rows().await?;
        if !existing.is_empty() && !force {
            info!(
                existing = existing.len(),
                "dataset already imported, skipping (pass force to re-import)"
            );
            return Ok(ImportReport {
                imported: 0,
                skipped: existing.len(),
                train_count: 0,
                holdout_count: 0,
            });
        }

        if !existing.is_empty() {
            for row in &existing {
                self.store.delete_message(row.id).await?;
            }
            info!(deleted = existing.len(), "cleared prior dataset rows for forced re-import");
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| crate::error::AppError::NotFound(format!("dataset file {path}: {e}")))?;
        let (mut rows, malformed) = Self::parse_lines(&raw);

        let mut rng = StdRng::seed_from_u64(IMPORT_SHUFFLE_SEED);
        rows.shuffle(&mut rng);

        let train_cutoff = (rows.len() as f64 * TRAIN_FRACTION).round() as usize;
        let mut train_count = 0;
        let mut holdout_count = 0;

        for (idx, (label, text)) in rows.into_iter().enumerate() {
            let split = if idx < train_cutoff {
                train_count += 1;
                Split::TrainPool
            } else {
                holdout_count += 1;
                Split::ValidationHoldout
            };

            let message = Message {
                id: MessageId(0),
                text,
                source: Source::Dataset,
                split: Some(split),
                true_label: Some(label),
                status: MessageStatus::Dataset,
                created_at: Utc::now(),
                last_model_version: None,
            };
            self.store.insert_message(message).await?;
        }

        info!(
            train_count,
            holdout_count, malformed, "dataset import complete"
        );

        Ok(ImportReport {
            imported: train_count + holdout_count,
            skipped: malformed,
            train_count,
            holdout_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn dataset_text() -> String {
        let mut lines = Vec::new();
        for i in 0..50 {
            lines.push(format!("ham\teveryday message number {i}"));
        }
        for i in 0..50 {
            lines.push(format!("spam\tfree prize winner call now {i}"));
        }
        lines.push(String::new());
        lines.push("not a valid line without a tab".to_string());
        lines.push("bogus\tunrecognized label".to_string());
        lines.join("\n")
    }

    async fn write_dataset() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.tsv");
        std::fs::write(&path, dataset_text()).unwrap();
        let path_str = path.to_string_lossy().into_owned();
        (dir, path_str)
    }

    #[tokio::test]
    async fn import_partitions_80_20_and_skips_malformed_lines() {
        let (_dir, path) = write_dataset().await;
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let importer = DatasetImporter::new(store);

        let report = importer.import(&path, false).await.unwrap();
        assert_eq!(report.imported, 100);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.train_count, 80);
        assert_eq!(report.holdout_count, 20);
    }

    #[tokio::test]
    async fn reimport_without_force_is_a_no_op() {
        let (_dir, path) = write_dataset().await;
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let importer = DatasetImporter::new(store);

        importer.import(&path, false).await.unwrap();
        let second = importer.import(&path, false).await.unwrap();
        assert_eq!(second.imported, 0);
        assert!(second.skipped > 0);
    }

    #[tokio::test]
    async fn import_is_deterministic_given_the_same_seed() {
        let (_dir, path) = write_dataset().await;

        let store_a: Arc<dyn Store> = Arc::new(MemoryStore::default());
        DatasetImporter::new(store_a.clone())
            .import(&path, false)
            .await
            .unwrap();
        let rows_a = store_a
            .list_messages_by_source_split(Source::Dataset, Some(Split::ValidationHoldout))
            .await
            .unwrap();

        let store_b: Arc<dyn Store> = Arc::new(MemoryStore::default());
        DatasetImporter::new(store_b.clone())
            .import(&path, false)
            .await
            .unwrap();
        let rows_b = store_b
            .list_messages_by_source_split(Source::Dataset, Some(Split::ValidationHoldout))
            .await
            .unwrap();

        let texts_a: Vec<&str> = rows_a.iter().map(|m| m.text.as_str()).collect();
        let texts_b: Vec<&str> = rows_b.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts_a, texts_b);
    }
}
