//! Unique identifier generation
//!
//! Candidates are drawn at random and probed against the live table with a
//! COUNT query until a free one is found or the probe cap is reached.

use super::condition::Condition;
use super::convert::StringId;
use super::database::{Backend, Database};
use super::error::{DbError, Result};
use rand::Rng;

/// Default probe cap before giving up
pub const DEFAULT_ID_TRIES: u32 = 10_000;

/// Generate a numeric id not present in `table.column`
pub async fn generate_unique_id<B: Backend>(
    db: &Database<B>,
    table: &str,
    column: &str,
) -> Result<i32> {
    generate_unique_id_with(db, table, column, DEFAULT_ID_TRIES).await
}

/// Generate a numeric id not present in `table.column`, with an explicit
/// probe cap
pub async fn generate_unique_id_with<B: Backend>(
    db: &Database<B>,
    table: &str,
    column: &str,
    tries: u32,
) -> Result<i32> {
    for _ in 0..tries {
        let candidate = rand::thread_rng().gen_range(1..i32::MAX);
        let taken = db
            .count_where(table, &[Condition::eq(column, candidate)])
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    log::error!("No free id in `{table}`.`{column}` after {tries} tries");
    Err(DbError::UniqueIdExhausted { tries })
}

/// Generate a string id not present in `table.column`
pub async fn generate_unique_string_id<B: Backend>(
    db: &Database<B>,
    table: &str,
    column: &str,
) -> Result<String> {
    generate_unique_string_id_with(db, table, column, DEFAULT_ID_TRIES).await
}

/// Generate a string id not present in `table.column`, with an explicit
/// probe cap
pub async fn generate_unique_string_id_with<B: Backend>(
    db: &Database<B>,
    table: &str,
    column: &str,
    tries: u32,
) -> Result<String> {
    for _ in 0..tries {
        let candidate = StringId::random();
        let taken = db
            .count_where(table, &[Condition::eq(column, candidate.as_str())])
            .await?;
        if taken == 0 {
            return Ok(candidate.to_string());
        }
    }
    log::error!("No free id in `{table}`.`{column}` after {tries} tries");
    Err(DbError::UniqueIdExhausted { tries })
}

impl StringId {
    /// Generate a random identifier not present in `table.column`
    pub async fn random_unique<B: Backend>(
        db: &Database<B>,
        table: &str,
        column: &str,
    ) -> Result<Self> {
        Ok(StringId::from(
            generate_unique_string_id(db, table, column).await?,
        ))
    }
}
