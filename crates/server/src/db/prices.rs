//! Bulk price reconciliation for per-store screen-option overrides.
//!
//! The `screen_option_price` table is mutated only here, inside a single
//! transaction per batch: either every valid item lands or none do. Items
//! whose option ID is junk or belongs to another model are skipped without
//! failing the batch; a malformed price aborts and rolls back everything.

use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;

use screenfix_core::{DeviceModelId, StoreId};

/// Errors that abort the reconciliation transaction.
#[derive(Debug, Error)]
pub enum BulkPriceError {
    /// An item's price was not a finite non-negative number.
    #[error("price must be a finite non-negative number")]
    PriceInvalid,

    /// An item was marked available with a non-positive price.
    #[error("available options require a positive price")]
    PriceRequired,

    /// Storage failure mid-transaction; everything has been rolled back.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One incoming reconciliation entry, kept as raw JSON values so malformed
/// fields can be classified per the skip/abort rules instead of failing
/// deserialization of the whole request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPriceItem {
    #[serde(default)]
    pub screen_option_id: Value,
    #[serde(default)]
    pub price_cents: Value,
    #[serde(default)]
    pub available: bool,
}

/// Repository for per-store price overrides.
pub struct PriceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PriceRepository<'a> {
    /// Create a new price repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Apply a batch of price overrides for one store and model atomically.
    ///
    /// Items are processed in input order. Option IDs that are not integers,
    /// or that do not belong to `model_id`, are skipped silently. A price
    /// that is not a finite number >= 0 aborts the whole batch with
    /// [`BulkPriceError::PriceInvalid`]; an available item with a
    /// non-positive price aborts with [`BulkPriceError::PriceRequired`].
    /// Returns the number of rows applied after a successful commit.
    ///
    /// # Errors
    ///
    /// Returns `BulkPriceError` on validation aborts and storage failures;
    /// in every error case the transaction has been rolled back.
    pub async fn apply_bulk(
        &self,
        store_id: StoreId,
        model_id: DeviceModelId,
        items: &[RawPriceItem],
    ) -> Result<u64, BulkPriceError> {
        let mut tx = self.pool.begin().await?;
        let mut updated: u64 = 0;

        for item in items {
            let Some(option_id) = option_id(&item.screen_option_id) else {
                continue;
            };

            // Mixed-model batches are tolerated: foreign options are skipped,
            // not rejected.
            let owned: Option<i32> =
                sqlx::query_scalar("SELECT 1 FROM screen_option WHERE id = $1 AND model_id = $2")
                    .bind(option_id)
                    .bind(model_id.as_i32())
                    .fetch_optional(&mut *tx)
                    .await?;
            if owned.is_none() {
                continue;
            }

            let Some(cents) = price_cents(&item.price_cents) else {
                tx.rollback().await?;
                return Err(BulkPriceError::PriceInvalid);
            };

            if item.available {
                if cents <= 0 {
                    tx.rollback().await?;
                    return Err(BulkPriceError::PriceRequired);
                }
                sqlx::query(
                    r"
                    INSERT INTO screen_option_price
                        (store_id, screen_option_id, price_cents, last_price_cents)
                    VALUES ($1, $2, $3, $3)
                    ON CONFLICT (store_id, screen_option_id)
                    DO UPDATE SET price_cents = EXCLUDED.price_cents,
                                  last_price_cents = EXCLUDED.last_price_cents,
                                  updated_at = now()
                    ",
                )
                .bind(store_id.as_i32())
                .bind(option_id)
                .bind(cents)
                .execute(&mut *tx)
                .await?;
            } else {
                // price_cents = 0 marks the option unavailable; the last known
                // positive price survives so it can be restored later.
                sqlx::query(
                    r"
                    INSERT INTO screen_option_price
                        (store_id, screen_option_id, price_cents, last_price_cents)
                    VALUES ($1, $2, 0, $3)
                    ON CONFLICT (store_id, screen_option_id)
                    DO UPDATE SET price_cents = 0,
                                  last_price_cents = CASE
                                      WHEN $3 > 0 THEN $3
                                      ELSE screen_option_price.last_price_cents
                                  END,
                                  updated_at = now()
                    ",
                )
                .bind(store_id.as_i32())
                .bind(option_id)
                .bind(cents)
                .execute(&mut *tx)
                .await?;
            }

            updated += 1;
        }

        tx.commit().await?;
        Ok(updated)
    }
}

/// Extract a usable option ID, or `None` when the item should be skipped.
fn option_id(value: &Value) -> Option<i64> {
    value.as_i64()
}

/// Extract a price in integer cents: any finite number >= 0, rounded.
/// `None` means the batch must abort with `price_invalid`.
fn price_cents(value: &Value) -> Option<i64> {
    let number = value.as_f64()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)] // bounded by the finite check above
    let cents = number.round() as i64;
    Some(cents)
}
