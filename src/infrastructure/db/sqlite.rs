use crate::domain::analysis::{GroupValue, StoredGrouped, StoredPaired};
use crate::domain::dataset::{GroupedRecord, PairedRecord};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::db::DatasetStore;
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS anova (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        case_name TEXT NOT NULL,
        dependent_name TEXT NOT NULL,
        independent_name TEXT NOT NULL,
        alpha REAL NOT NULL,
        input_method TEXT NOT NULL,
        n INTEGER NOT NULL,
        k INTEGER NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS anova_group (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        anova_id INTEGER NOT NULL REFERENCES anova(id) ON DELETE CASCADE,
        group_name TEXT NOT NULL,
        value REAL NOT NULL,
        position INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_anova_group_anova ON anova_group(anova_id, position)",
    "CREATE TABLE IF NOT EXISTS correlation (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        case_name TEXT NOT NULL,
        x_name TEXT NOT NULL,
        y_name TEXT NOT NULL,
        alpha REAL NOT NULL,
        input_method TEXT NOT NULL,
        n INTEGER NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS correlation_pair (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        correlation_id INTEGER NOT NULL REFERENCES correlation(id) ON DELETE CASCADE,
        x REAL NOT NULL,
        y REAL NOT NULL,
        position INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_correlation_pair_correlation
        ON correlation_pair(correlation_id, position)",
];

fn db_error(action: &str, err: sqlx::Error) -> AppError {
    AppError::DatabaseError(format!("Failed to {}: {}", action, err))
}

pub struct SqliteRepository {
    pool: Pool<Sqlite>,
}

impl SqliteRepository {
    pub async fn init(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| db_error("parse connection string", e))?
            .create_if_missing(true);

        // Every connection to an in-memory database sees its own copy, so keep exactly one.
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| db_error("connect", e))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| db_error("create table", e))?;
        }

        debug!(database_url, "Dataset store ready");
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatasetStore for SqliteRepository {
    async fn save_grouped(&self, record: &GroupedRecord) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        let meta = &record.metadata;
        let result = sqlx::query(
            "INSERT INTO anova
                (case_name, dependent_name, independent_name, alpha, input_method, n, k)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&meta.case_name)
        .bind(&meta.dependent_name)
        .bind(&meta.independent_name)
        .bind(meta.alpha)
        .bind(&meta.input_method)
        .bind(record.n() as i64)
        .bind(record.k() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert grouped dataset");
            db_error("save grouped dataset", e)
        })?;
        let id = result.last_insert_rowid();

        for (position, (group, value)) in record.rows().into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO anova_group (anova_id, group_name, value, position)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(group)
            .bind(value)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(error = %e, anova_id = id, "Failed to insert grouped row");
                db_error("save grouped row", e)
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit transaction", e))?;

        Ok(id)
    }

    async fn save_paired(&self, record: &PairedRecord) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        let meta = &record.metadata;
        let result = sqlx::query(
            "INSERT INTO correlation (case_name, x_name, y_name, alpha, input_method, n)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&meta.case_name)
        .bind(&meta.x_name)
        .bind(&meta.y_name)
        .bind(meta.alpha)
        .bind(&meta.input_method)
        .bind(record.n() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to insert paired dataset");
            db_error("save paired dataset", e)
        })?;
        let id = result.last_insert_rowid();

        for (position, (x, y)) in record.rows().into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO correlation_pair (correlation_id, x, y, position)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(x)
            .bind(y)
            .bind(position as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(error = %e, correlation_id = id, "Failed to insert paired row");
                db_error("save paired row", e)
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit transaction", e))?;

        Ok(id)
    }

    async fn find_grouped(&self, id: i64) -> Result<Option<StoredGrouped>> {
        let header = sqlx::query_as::<_, AnovaEntity>(
            "SELECT id, case_name, dependent_name, independent_name, alpha, input_method, n, k,
                    created_at
             FROM anova WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch grouped dataset", e))?;

        let Some(header) = header else {
            return Ok(None);
        };

        let groups = sqlx::query_as::<_, AnovaGroupEntity>(
            "SELECT group_name, value FROM anova_group WHERE anova_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("fetch grouped rows", e))?;

        Ok(Some(header.into_stored(groups)))
    }

    async fn find_paired(&self, id: i64) -> Result<Option<StoredPaired>> {
        let header = sqlx::query_as::<_, CorrelationEntity>(
            "SELECT id, case_name, x_name, y_name, alpha, input_method, n, created_at
             FROM correlation WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch paired dataset", e))?;

        let Some(header) = header else {
            return Ok(None);
        };

        let pairs = sqlx::query_as::<_, CorrelationPairEntity>(
            "SELECT x, y FROM correlation_pair WHERE correlation_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("fetch paired rows", e))?;

        Ok(Some(header.into_stored(pairs)))
    }
}

// Internal entities for database mapping
#[derive(sqlx::FromRow)]
struct AnovaEntity {
    id: i64,
    case_name: String,
    dependent_name: String,
    independent_name: String,
    alpha: f64,
    input_method: String,
    n: i64,
    k: i64,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(sqlx::FromRow)]
struct AnovaGroupEntity {
    group_name: String,
    value: f64,
}

impl AnovaEntity {
    fn into_stored(self, rows: Vec<AnovaGroupEntity>) -> StoredGrouped {
        StoredGrouped {
            id: self.id,
            case_name: self.case_name,
            dependent_name: self.dependent_name,
            independent_name: self.independent_name,
            alpha: self.alpha,
            input_method: self.input_method,
            n: self.n,
            k: self.k,
            groups: rows
                .into_iter()
                .map(|r| GroupValue {
                    group: r.group_name,
                    value: r.value,
                })
                .collect(),
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CorrelationEntity {
    id: i64,
    case_name: String,
    x_name: String,
    y_name: String,
    alpha: f64,
    input_method: String,
    n: i64,
    created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(sqlx::FromRow)]
struct CorrelationPairEntity {
    x: f64,
    y: f64,
}

impl CorrelationEntity {
    fn into_stored(self, rows: Vec<CorrelationPairEntity>) -> StoredPaired {
        let (x_values, y_values) = rows.into_iter().map(|r| (r.x, r.y)).unzip();
        StoredPaired {
            id: self.id,
            case_name: self.case_name,
            x_name: self.x_name,
            y_name: self.y_name,
            alpha: self.alpha,
            input_method: self.input_method,
            n: self.n,
            x_values,
            y_values,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::{
        Group, GroupedDataset, GroupedMetadata, PairedDataset, PairedMetadata, VarianceReport,
    };

    async fn repo() -> SqliteRepository {
        SqliteRepository::init("sqlite::memory:").await.unwrap()
    }

    fn grouped_record() -> GroupedRecord {
        GroupedRecord {
            metadata: GroupedMetadata {
                case_name: "Fertilizer trial".to_string(),
                dependent_name: "Yield".to_string(),
                independent_name: "Brand".to_string(),
                alpha: 0.05,
                input_method: "manual".to_string(),
            },
            dataset: GroupedDataset {
                groups: vec![
                    Group {
                        name: "B".to_string(),
                        values: vec![3.0, 4.0],
                    },
                    Group {
                        name: "A".to_string(),
                        values: vec![1.0, 2.0],
                    },
                    Group {
                        name: "C".to_string(),
                        values: vec![5.0, 6.5],
                    },
                ],
            },
            variance: VarianceReport {
                within_group: true,
                between_group: true,
            },
        }
    }

    #[tokio::test]
    async fn test_grouped_round_trip_keeps_order() {
        let repo = repo().await;
        let id = repo.save_grouped(&grouped_record()).await.unwrap();
        assert!(id > 0);

        let stored = repo.find_grouped(id).await.unwrap().unwrap();
        assert_eq!(stored.case_name, "Fertilizer trial");
        assert_eq!(stored.n, 6);
        assert_eq!(stored.k, 3);
        let groups: Vec<&str> = stored.groups.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(groups, vec!["B", "B", "A", "A", "C", "C"]);
        assert_eq!(stored.groups[5].value, 6.5);
    }

    #[tokio::test]
    async fn test_paired_round_trip() {
        let repo = repo().await;
        let record = PairedRecord {
            metadata: PairedMetadata {
                case_name: "Study".to_string(),
                x_name: "Hours".to_string(),
                y_name: "Score".to_string(),
                alpha: 0.01,
                input_method: "excel".to_string(),
            },
            dataset: PairedDataset {
                x: vec![1.0, 2.0, 3.0, 4.0, 5.0],
                y: vec![50.0, 55.0, 65.0, 70.0, 72.5],
            },
        };
        let id = repo.save_paired(&record).await.unwrap();

        let stored = repo.find_paired(id).await.unwrap().unwrap();
        assert_eq!(stored.n, 5);
        assert_eq!(stored.x_values, record.dataset.x);
        assert_eq!(stored.y_values, record.dataset.y);
        assert_eq!(stored.input_method, "excel");
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let repo = repo().await;
        assert!(repo.find_grouped(42).await.unwrap().is_none());
        assert!(repo.find_paired(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let repo = repo().await;
        let first = repo.save_grouped(&grouped_record()).await.unwrap();
        let second = repo.save_grouped(&grouped_record()).await.unwrap();
        assert!(second > first);
    }
}
