//! Administrator-managed tradable configuration.

use crate::domain::{TradableConfig, TradableId};
use crate::store::StoreError;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{parse_text, time_col, Repository};

const TRADABLE_COLUMNS: &str = "id, name, kind, roi_or_profit_percentage, loss_percentage, \
     duration_ms, volatility_percentage, outcome_mode, min_exposure, max_exposure, max_leverage, \
     updated_at";

fn tradable_from_row(row: &SqliteRow) -> Result<TradableConfig, StoreError> {
    Ok(TradableConfig {
        id: TradableId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        kind: parse_text(row, "kind")?,
        roi_or_profit_percentage: parse_text(row, "roi_or_profit_percentage")?,
        loss_percentage: parse_text(row, "loss_percentage")?,
        duration_ms: row.try_get("duration_ms")?,
        volatility_percentage: parse_text(row, "volatility_percentage")?,
        outcome_mode: parse_text(row, "outcome_mode")?,
        min_exposure: parse_text(row, "min_exposure")?,
        max_exposure: parse_text(row, "max_exposure")?,
        max_leverage: parse_text(row, "max_leverage")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

impl Repository {
    /// Insert or replace a tradable. Open positions keep the terms they captured.
    pub async fn save_tradable(&self, config: &TradableConfig) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tradables
            (id, name, kind, roi_or_profit_percentage, loss_percentage, duration_ms,
             volatility_percentage, outcome_mode, min_exposure, max_exposure, max_leverage, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                roi_or_profit_percentage = excluded.roi_or_profit_percentage,
                loss_percentage = excluded.loss_percentage,
                duration_ms = excluded.duration_ms,
                volatility_percentage = excluded.volatility_percentage,
                outcome_mode = excluded.outcome_mode,
                min_exposure = excluded.min_exposure,
                max_exposure = excluded.max_exposure,
                max_leverage = excluded.max_leverage,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(config.id.as_str())
        .bind(&config.name)
        .bind(config.kind.as_str())
        .bind(config.roi_or_profit_percentage.to_canonical_string())
        .bind(config.loss_percentage.to_canonical_string())
        .bind(config.duration_ms)
        .bind(config.volatility_percentage.to_canonical_string())
        .bind(config.outcome_mode.as_str())
        .bind(config.min_exposure.to_canonical_string())
        .bind(config.max_exposure.to_canonical_string())
        .bind(config.max_leverage.to_canonical_string())
        .bind(config.updated_at.as_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_tradable(&self, id: &TradableId) -> Result<Option<TradableConfig>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tradables WHERE id = ?",
            TRADABLE_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(tradable_from_row).transpose()
    }

    pub async fn all_tradables(&self) -> Result<Vec<TradableConfig>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tradables ORDER BY id ASC",
            TRADABLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(tradable_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use crate::domain::{Decimal, OutcomeMode, TimeMs, TradableConfig, TradableId, TradableKind};

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn symbol(id: &str) -> TradableConfig {
        TradableConfig {
            id: TradableId::new(id),
            name: id.to_string(),
            kind: TradableKind::Symbol,
            roi_or_profit_percentage: d("4"),
            loss_percentage: d("3"),
            duration_ms: None,
            volatility_percentage: d("1.25"),
            outcome_mode: OutcomeMode::Auto,
            min_exposure: d("10"),
            max_exposure: d("10000"),
            max_leverage: d("20"),
            updated_at: TimeMs::new(5),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_outcome_mode() {
        let (repo, _temp) = setup_test_db().await;
        let mut config = symbol("BTCUSD");
        repo.save_tradable(&config).await.unwrap();

        config.outcome_mode = OutcomeMode::ForceLoss;
        config.updated_at = TimeMs::new(6);
        repo.save_tradable(&config).await.unwrap();

        let loaded = repo.find_tradable(&config.id).await.unwrap().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(repo.all_tradables().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_tradables_sorted_by_id() {
        let (repo, _temp) = setup_test_db().await;
        repo.save_tradable(&symbol("XAUUSD")).await.unwrap();
        repo.save_tradable(&symbol("BTCUSD")).await.unwrap();
        let ids: Vec<_> = repo
            .all_tradables()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id.0)
            .collect();
        assert_eq!(ids, vec!["BTCUSD", "XAUUSD"]);
    }
}
