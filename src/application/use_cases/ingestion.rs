use std::sync::Arc;

use tracing::{info, warn};

use super::shape_validator::DatasetShapeValidator;
use super::variance_guard;
use crate::domain::analysis::{AnovaInput, CorrelationInput, StoredGrouped, StoredPaired};
use crate::domain::dataset::{GroupedRecord, PairedRecord, ValidationPolicy, ValidationVerdict};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::db::DatasetStore;
use crate::infrastructure::spreadsheet::header::HeaderHints;
use crate::infrastructure::spreadsheet::{
    has_supported_extension, read_first_sheet, GroupedColumns, LocaleNumberParser, PairedColumns,
    SheetGrid, SpreadsheetTableReader,
};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const MISSING_FILE: &str = "The Excel file was not found or is empty.";
pub const UNSUPPORTED_FILE: &str = "Unsupported file format. Use an Excel file (.xlsx or .xls).";

/// Runs uploads and manual submissions through reading, shape and variance
/// checks, and hands accepted records to the store.
pub struct IngestionUseCase {
    store: Arc<dyn DatasetStore + Send + Sync>,
    validator: DatasetShapeValidator,
    reader: SpreadsheetTableReader,
    max_upload_bytes: usize,
}

impl IngestionUseCase {
    pub fn new(
        store: Arc<dyn DatasetStore + Send + Sync>,
        policy: ValidationPolicy,
        parser: LocaleNumberParser,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            store,
            validator: DatasetShapeValidator::new(policy),
            reader: SpreadsheetTableReader::new(parser, policy),
            max_upload_bytes,
        }
    }

    /// Shape then variance checks, without touching storage.
    pub fn evaluate_grouped(&self, input: &AnovaInput) -> ValidationVerdict<GroupedRecord> {
        self.validator
            .validate_grouped(input)
            .and_then(|(metadata, dataset)| {
                let variance = variance_guard::check_grouped(&dataset)?;
                Ok(GroupedRecord {
                    metadata,
                    dataset,
                    variance,
                })
            })
            .into()
    }

    pub fn evaluate_paired(&self, input: &CorrelationInput) -> ValidationVerdict<PairedRecord> {
        self.validator
            .validate_paired(input)
            .and_then(|(metadata, dataset)| {
                variance_guard::check_paired(&dataset)?;
                Ok(PairedRecord { metadata, dataset })
            })
            .into()
    }

    pub async fn submit_grouped_manual(&self, input: AnovaInput) -> Result<i64> {
        self.store_grouped(&input).await
    }

    pub async fn submit_paired_manual(&self, input: CorrelationInput) -> Result<i64> {
        self.store_paired(&input).await
    }

    pub async fn submit_grouped_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        input: AnovaInput,
    ) -> Result<i64> {
        self.check_upload(&bytes, file_name)?;
        let grid = load_grid(bytes).await?;

        let import = self
            .reader
            .read_grouped(&grid, GroupedColumns::default(), &HeaderHints::from(&input))?;
        if import.skipped_rows > 0 {
            warn!(
                file = file_name,
                skipped = import.skipped_rows,
                "Rows skipped while reading upload"
            );
        }

        self.store_grouped(&import.into_input()).await
    }

    pub async fn submit_paired_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        input: CorrelationInput,
    ) -> Result<i64> {
        self.check_upload(&bytes, file_name)?;
        let grid = load_grid(bytes).await?;

        let import = self
            .reader
            .read_paired(&grid, PairedColumns::default(), &HeaderHints::from(&input))?;
        if import.skipped_rows > 0 {
            warn!(
                file = file_name,
                skipped = import.skipped_rows,
                "Rows skipped while reading upload"
            );
        }

        self.store_paired(&import.into_input()).await
    }

    pub async fn get_grouped(&self, id: i64) -> Result<StoredGrouped> {
        check_id(id)?;
        self.store.find_grouped(id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Grouped dataset with id {} was not found", id))
        })
    }

    pub async fn get_paired(&self, id: i64) -> Result<StoredPaired> {
        check_id(id)?;
        self.store.find_paired(id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Correlation dataset with id {} was not found", id))
        })
    }

    /// Empty body, then extension, then size. Runs before any metadata is read.
    pub fn check_upload(&self, bytes: &[u8], file_name: &str) -> Result<()> {
        if bytes.is_empty() {
            return Err(AppError::BadRequest(MISSING_FILE.to_string()));
        }
        if !has_supported_extension(file_name) {
            return Err(AppError::BadRequest(UNSUPPORTED_FILE.to_string()));
        }
        if bytes.len() > self.max_upload_bytes {
            return Err(Self::upload_too_large(self.max_upload_bytes));
        }
        Ok(())
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn upload_too_large(limit: usize) -> AppError {
        AppError::BadRequest(format!(
            "The file is too large. The maximum size is {} bytes.",
            limit
        ))
    }

    async fn store_grouped(&self, input: &AnovaInput) -> Result<i64> {
        let record = self.evaluate_grouped(input).into_result()?;
        let id = self.store.save_grouped(&record).await?;
        info!(
            id,
            case = %record.metadata.case_name,
            method = %record.metadata.input_method,
            n = record.n(),
            k = record.k(),
            limited_variance = record.variance.is_limited(),
            "Grouped dataset stored"
        );
        Ok(id)
    }

    async fn store_paired(&self, input: &CorrelationInput) -> Result<i64> {
        let record = self.evaluate_paired(input).into_result()?;
        let id = self.store.save_paired(&record).await?;
        info!(
            id,
            case = %record.metadata.case_name,
            method = %record.metadata.input_method,
            n = record.n(),
            "Paired dataset stored"
        );
        Ok(id)
    }
}

fn check_id(id: i64) -> Result<()> {
    if id <= 0 {
        return Err(AppError::BadRequest("Invalid id".to_string()));
    }
    Ok(())
}

/// Workbook parsing is blocking; keep it off the async workers.
async fn load_grid(bytes: Vec<u8>) -> Result<SheetGrid> {
    tokio::task::spawn_blocking(move || read_first_sheet(bytes))
        .await
        .map_err(|e| AppError::Internal(format!("Spreadsheet reader task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::sqlite::SqliteRepository;
    use crate::infrastructure::spreadsheet::workbook::tests::{grouped_workbook, paired_workbook};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        grouped: Mutex<Vec<GroupedRecord>>,
        paired: Mutex<Vec<PairedRecord>>,
    }

    #[async_trait]
    impl DatasetStore for MemoryStore {
        async fn save_grouped(&self, record: &GroupedRecord) -> Result<i64> {
            let mut grouped = self.grouped.lock().unwrap();
            grouped.push(record.clone());
            Ok(grouped.len() as i64)
        }

        async fn save_paired(&self, record: &PairedRecord) -> Result<i64> {
            let mut paired = self.paired.lock().unwrap();
            paired.push(record.clone());
            Ok(paired.len() as i64)
        }

        async fn find_grouped(&self, _id: i64) -> Result<Option<StoredGrouped>> {
            Ok(None)
        }

        async fn find_paired(&self, _id: i64) -> Result<Option<StoredPaired>> {
            Ok(None)
        }
    }

    fn use_case(store: Arc<MemoryStore>) -> IngestionUseCase {
        IngestionUseCase::new(
            store,
            ValidationPolicy::default(),
            LocaleNumberParser::default(),
            DEFAULT_MAX_UPLOAD_BYTES,
        )
    }

    #[test]
    fn test_evaluate_grouped_accepts_and_counts() {
        let store = Arc::new(MemoryStore::default());
        let verdict = use_case(store).evaluate_grouped(&AnovaInput::with_groups(&[
            ("A", &[1.0, 2.0]),
            ("B", &[3.0, 4.0]),
            ("C", &[5.0, 6.0]),
        ]));
        let ValidationVerdict::Accepted(record) = verdict else {
            panic!("expected acceptance");
        };
        assert_eq!(record.n(), 6);
        assert_eq!(record.k(), 3);
        assert!(!record.variance.is_limited());
    }

    #[test]
    fn test_shape_rules_run_before_variance() {
        let store = Arc::new(MemoryStore::default());
        // identical values and a duplicate name: the shape rule wins
        let verdict = use_case(store).evaluate_grouped(&AnovaInput::with_groups(&[
            ("A", &[7.0, 7.0]),
            ("A", &[7.0, 7.0]),
            ("B", &[7.0, 7.0]),
        ]));
        assert!(matches!(
            verdict,
            ValidationVerdict::Rejected(AppError::ShapeViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_grouped_is_not_stored() {
        let store = Arc::new(MemoryStore::default());
        let use_case = use_case(store.clone());

        let err = use_case
            .submit_grouped_manual(AnovaInput::with_groups(&[
                ("A", &[7.0, 7.0]),
                ("B", &[7.0, 7.0]),
                ("C", &[7.0, 7.0]),
            ]))
            .await
            .unwrap_err();

        assert!(
            matches!(err, AppError::VarianceViolation(ref r) if r.contains("identical values"))
        );
        assert!(store.grouped.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accepted_grouped_is_stored_once() {
        let store = Arc::new(MemoryStore::default());
        let use_case = use_case(store.clone());

        let id = use_case
            .submit_grouped_manual(AnovaInput::with_groups(&[
                ("A", &[1.0, 1.0]),
                ("B", &[2.0, 2.0]),
                ("C", &[3.0, 3.0]),
            ]))
            .await
            .unwrap();

        assert_eq!(id, 1);
        let stored = store.grouped.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].variance.between_group);
        assert!(!stored[0].variance.within_group);
    }

    #[tokio::test]
    async fn test_paired_manual() {
        let store = Arc::new(MemoryStore::default());
        let use_case = use_case(store.clone());

        let id = use_case
            .submit_paired_manual(CorrelationInput::with_pairs(
                &[1.0, 2.0, 3.0, 4.0, 5.0],
                &[2.0, 4.0, 5.0, 4.0, 5.0],
            ))
            .await
            .unwrap();
        assert_eq!(id, 1);

        let err = use_case
            .submit_paired_manual(CorrelationInput::with_pairs(
                &[1.0, 2.0, 3.0, 4.0, 5.0],
                &[3.0, 3.0, 3.0, 3.0, 3.0],
            ))
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::VarianceViolation(ref r) if r.starts_with("Y has no variance"))
        );
        assert_eq!(store.paired.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_guards() {
        let store = Arc::new(MemoryStore::default());
        let use_case = IngestionUseCase::new(
            store.clone(),
            ValidationPolicy::default(),
            LocaleNumberParser::default(),
            16,
        );
        let input = AnovaInput::default();

        let err = use_case
            .submit_grouped_file(Vec::new(), "data.xlsx", input.clone())
            .await
            .unwrap_err();
        assert_eq!(err, AppError::BadRequest(MISSING_FILE.to_string()));

        let err = use_case
            .submit_grouped_file(vec![1, 2, 3], "data.csv", input.clone())
            .await
            .unwrap_err();
        assert_eq!(err, AppError::BadRequest(UNSUPPORTED_FILE.to_string()));

        let err = use_case
            .submit_grouped_file(vec![0; 17], "data.xlsx", input)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref r) if r.contains("too large")));
    }

    #[tokio::test]
    async fn test_corrupt_upload() {
        let store = Arc::new(MemoryStore::default());
        let err = use_case(store.clone())
            .submit_paired_file(
                b"PK not really a zip".to_vec(),
                "data.xlsx",
                CorrelationInput::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CorruptFile(_)));
        assert!(store.paired.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_back_through_sqlite() {
        let repo = SqliteRepository::init("sqlite::memory:").await.unwrap();
        let use_case = IngestionUseCase::new(
            Arc::new(repo),
            ValidationPolicy::default(),
            LocaleNumberParser::default(),
            DEFAULT_MAX_UPLOAD_BYTES,
        );

        let id = use_case
            .submit_grouped_manual(AnovaInput::with_groups(&[
                ("Low", &[1.0, 2.0]),
                ("Mid", &[3.0, 4.0]),
                ("High", &[5.0, 6.0]),
            ]))
            .await
            .unwrap();

        let stored = use_case.get_grouped(id).await.unwrap();
        assert_eq!(stored.k, 3);
        let first = stored.groups.first().map(|g| g.group.as_str());
        assert_eq!(first, Some("Low"));

        assert!(matches!(
            use_case.get_grouped(id + 100).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(use_case.get_paired(0).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_grouped_workbook_upload() {
        let store = Arc::new(MemoryStore::default());
        let input = AnovaInput {
            case_name: Some("Field trial".to_string()),
            dependent_name: Some("Output".to_string()),
            alpha: Some(0.05),
            ..AnovaInput::default()
        };

        let id = use_case(store.clone())
            .submit_grouped_file(grouped_workbook(), "trial.xlsx", input)
            .await
            .unwrap();
        assert_eq!(id, 1);

        let stored = store.grouped.lock().unwrap();
        let record = &stored[0];
        assert_eq!(record.metadata.case_name, "Field trial");
        assert_eq!(record.metadata.independent_name, "Treatment");
        assert_eq!(record.metadata.dependent_name, "Yield");
        assert_eq!(record.metadata.input_method, "excel");
        assert_eq!(record.k(), 4);
        assert_eq!(record.n(), 8);
    }

    #[tokio::test]
    async fn test_paired_workbook_upload() {
        let store = Arc::new(MemoryStore::default());
        let input = CorrelationInput {
            case_name: Some("Study habits".to_string()),
            alpha: Some(0.01),
            ..CorrelationInput::default()
        };

        use_case(store.clone())
            .submit_paired_file(paired_workbook(), "habits.XLSX", input)
            .await
            .unwrap();

        let stored = store.paired.lock().unwrap();
        let record = &stored[0];
        assert_eq!(record.metadata.x_name, "Study hours");
        assert_eq!(record.metadata.y_name, "Exam score");
        assert_eq!(record.metadata.alpha, 0.01);
        assert_eq!(record.metadata.input_method, "excel");
        assert_eq!(record.dataset.x, vec![2.0, 3.5, 5.0, 6.0, 7.5]);
    }

    #[test]
    fn test_check_upload_order() {
        let use_case = IngestionUseCase::new(
            Arc::new(MemoryStore::default()),
            ValidationPolicy::default(),
            LocaleNumberParser::default(),
            4,
        );
        assert_eq!(
            use_case.check_upload(&[], "data.csv"),
            Err(AppError::BadRequest(MISSING_FILE.to_string()))
        );
        assert_eq!(
            use_case.check_upload(&[0; 8], "data.csv"),
            Err(AppError::BadRequest(UNSUPPORTED_FILE.to_string()))
        );
        assert_eq!(
            use_case.check_upload(&[0; 8], "data.xls"),
            Err(IngestionUseCase::upload_too_large(4))
        );
        assert_eq!(use_case.check_upload(&[0; 4], "data.xls"), Ok(()));
    }
}
