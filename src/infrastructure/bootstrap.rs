use std::sync::Arc;

use tracing::{error, info};

use crate::application::IngestionUseCase;
use crate::domain::error::Result;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::db::sqlite::SqliteRepository;
use crate::infrastructure::spreadsheet::LocaleNumberParser;

/// Open the store and wire the ingestion pipeline from `config`.
pub async fn setup(config: &AppConfig) -> Result<Arc<IngestionUseCase>> {
    let repo = SqliteRepository::init(&config.database_url)
        .await
        .map_err(|err| {
            error!(
                error = %err,
                database_url = %config.database_url,
                "Failed to open dataset store"
            );
            err
        })?;

    let parser = LocaleNumberParser::with_locale(config.number_locale());
    let ingestion = IngestionUseCase::new(
        Arc::new(repo),
        config.policy,
        parser,
        config.max_upload_bytes,
    );

    info!(
        database_url = %config.database_url,
        fallback_locale = %config.fallback_locale,
        min_groups = config.policy.min_groups,
        min_values_per_group = config.policy.min_values_per_group,
        min_pairs = config.policy.min_pairs,
        "Ingestion pipeline ready"
    );

    Ok(Arc::new(ingestion))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::AnovaInput;

    #[tokio::test]
    async fn test_setup_with_memory_database() {
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            fallback_locale: "de-DE".to_string(),
            ..AppConfig::default()
        };
        let ingestion = setup(&config).await.unwrap();
        assert_eq!(ingestion.max_upload_bytes(), config.max_upload_bytes);

        let id = ingestion
            .submit_grouped_manual(AnovaInput::with_groups(&[
                ("A", &[1.0, 2.0]),
                ("B", &[2.0, 3.0]),
                ("C", &[4.0, 5.0]),
            ]))
            .await
            .unwrap();
        assert_eq!(ingestion.get_grouped(id).await.unwrap().n, 6);
    }
}
