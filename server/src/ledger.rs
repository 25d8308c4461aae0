// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use common::RewardAccount;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Outcome of a spend attempt against one of the two currencies.
#[derive(Debug)]
pub enum SpendOutcome {
    Spent { new_balance: i64 },
    Insufficient { balance: i64 },
}

/// Creates the zeroed ledger row for `user_id` if it does not exist yet.
/// `INSERT OR IGNORE` makes this idempotent and safe under concurrent
/// first references to the same user.
async fn ensure_account(pool: &SqlitePool, user_id: &str) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO users (id, points_earned, points_used, time_earned, time_used, tasks_completed) VALUES (?, 0, 0, 0, 0, 0)",
    )
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to ensure ledger entry")?;

    Ok(())
}

#[allow(clippy::uninlined_format_args)]
async fn fetch_account(pool: &SqlitePool, user_id: &str) -> Result<RewardAccount> {
    let account = sqlx::query_as::<_, RewardAccount>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context(format!("Failed to fetch ledger entry for user: {}", user_id))?;

    Ok(account)
}

/// Returns the ledger entry for `user_id`, creating a zeroed one on first
/// reference.
pub async fn get_or_create_account(pool: &SqlitePool, user_id: &str) -> Result<RewardAccount> {
    ensure_account(pool, user_id).await?;
    fetch_account(pool, user_id).await
}

/// Credits a completed task's rewards to the owner's ledger entry.
///
/// The whole credit is one atomic statement: both earned counters take
/// their delta (a zero delta adds nothing) while `tasks_completed` always
/// advances by one, whatever the rewards were.
#[allow(clippy::uninlined_format_args)]
pub async fn credit_completion(
    pool: &SqlitePool,
    user_id: &str,
    point_delta: i64,
    time_delta: i64,
) -> Result<RewardAccount> {
    ensure_account(pool, user_id).await?;

    debug!(
        "Crediting user {}: +{} points, +{} minutes",
        user_id, point_delta, time_delta
    );

    sqlx::query(
        "UPDATE users SET points_earned = points_earned + ?, time_earned = time_earned + ?, tasks_completed = tasks_completed + 1 WHERE id = ?",
    )
    .bind(point_delta.max(0))
    .bind(time_delta.max(0))
    .bind(user_id)
    .execute(pool)
    .await
    .context(format!("Failed to credit ledger entry for user: {}", user_id))?;

    fetch_account(pool, user_id).await
}

/// Debits `amount` points from `user_id`'s balance.
///
/// The balance predicate lives inside the UPDATE, so the check and the
/// debit are one atomic statement: concurrent spends can never drive the
/// balance negative. Zero rows affected means the balance did not cover
/// the amount and nothing was written.
#[allow(clippy::uninlined_format_args)]
pub async fn spend_points(pool: &SqlitePool, user_id: &str, amount: i64) -> Result<SpendOutcome> {
    ensure_account(pool, user_id).await?;

    let result = sqlx::query(
        "UPDATE users SET points_used = points_used + ?1 WHERE id = ?2 AND points_earned - points_used >= ?1",
    )
    .bind(amount)
    .bind(user_id)
    .execute(pool)
    .await
    .context(format!("Failed to debit points for user: {}", user_id))?;

    let account = fetch_account(pool, user_id).await?;

    if result.rows_affected() == 0 {
        debug!(
            "Rejected point spend of {} for user {} (balance: {})",
            amount, user_id, account.point_balance()
        );
        return Ok(SpendOutcome::Insufficient {
            balance: account.point_balance(),
        });
    }

    info!("User {} spent {} points.", user_id, amount);

    Ok(SpendOutcome::Spent {
        new_balance: account.point_balance(),
    })
}

/// Debits `minutes` from `user_id`'s time balance. Same conditional-write
/// rule as [`spend_points`].
#[allow(clippy::uninlined_format_args)]
pub async fn spend_time(pool: &SqlitePool, user_id: &str, minutes: i64) -> Result<SpendOutcome> {
    ensure_account(pool, user_id).await?;

    let result = sqlx::query(
        "UPDATE users SET time_used = time_used + ?1 WHERE id = ?2 AND time_earned - time_used >= ?1",
    )
    .bind(minutes)
    .bind(user_id)
    .execute(pool)
    .await
    .context(format!("Failed to debit time for user: {}", user_id))?;

    let account = fetch_account(pool, user_id).await?;

    if result.rows_affected() == 0 {
        debug!(
            "Rejected time spend of {} minutes for user {} (balance: {})",
            minutes, user_id, account.time_balance()
        );
        return Ok(SpendOutcome::Insufficient {
            balance: account.time_balance(),
        });
    }

    info!("User {} spent {} minutes.", user_id, minutes);

    Ok(SpendOutcome::Spent {
        new_balance: account.time_balance(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Helper function to set up an in-memory SQLite database for testing.
    async fn setup_test_db() -> Result<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        database::init_schema(&pool).await?;

        Ok(pool)
    }

    #[tokio::test]
    async fn test_get_or_create_account_is_idempotent() {
        let pool = setup_test_db().await.unwrap();

        let first = get_or_create_account(&pool, "alice").await.unwrap();
        let second = get_or_create_account(&pool, "alice").await.unwrap();

        assert_eq!(first.id, "alice");
        assert_eq!(first.points_earned, 0);
        assert_eq!(first.points_used, 0);
        assert_eq!(first.time_earned, 0);
        assert_eq!(first.time_used, 0);
        assert_eq!(first.tasks_completed, 0);
        assert_eq!(second.tasks_completed, 0); // Second call did not reset or duplicate
    }

    #[tokio::test]
    async fn test_credit_completion_accumulates() {
        let pool = setup_test_db().await.unwrap();

        credit_completion(&pool, "alice", 10, 15).await.unwrap();
        let account = credit_completion(&pool, "alice", 5, 0).await.unwrap();

        assert_eq!(account.points_earned, 15);
        assert_eq!(account.time_earned, 15);
        assert_eq!(account.tasks_completed, 2);
    }

    #[tokio::test]
    async fn test_credit_with_zero_point_delta() {
        let pool = setup_test_db().await.unwrap();

        // A time-only task: points stay untouched, the completion still counts.
        let account = credit_completion(&pool, "alice", 0, 5).await.unwrap();

        assert_eq!(account.points_earned, 0);
        assert_eq!(account.time_earned, 5);
        assert_eq!(account.tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_spend_points_success_decreases_balance() {
        let pool = setup_test_db().await.unwrap();
        credit_completion(&pool, "alice", 10, 0).await.unwrap();

        let outcome = spend_points(&pool, "alice", 10).await.unwrap();

        match outcome {
            SpendOutcome::Spent { new_balance } => assert_eq!(new_balance, 0),
            other => panic!("Expected spend to succeed, got {:?}", other),
        }

        let account = get_or_create_account(&pool, "alice").await.unwrap();
        assert_eq!(account.points_used, 10);
        assert_eq!(account.point_balance(), 0);
    }

    #[tokio::test]
    async fn test_overspend_leaves_counters_unchanged() {
        let pool = setup_test_db().await.unwrap();
        credit_completion(&pool, "alice", 10, 0).await.unwrap();

        let outcome = spend_points(&pool, "alice", 15).await.unwrap();

        match outcome {
            SpendOutcome::Insufficient { balance } => assert_eq!(balance, 10),
            other => panic!("Expected spend to be rejected, got {:?}", other),
        }

        // Round-trip: balance before == balance after on failure.
        let account = get_or_create_account(&pool, "alice").await.unwrap();
        assert_eq!(account.points_used, 0);
        assert_eq!(account.point_balance(), 10);
    }

    #[tokio::test]
    async fn test_spend_time_against_time_balance() {
        let pool = setup_test_db().await.unwrap();
        credit_completion(&pool, "bob", 0, 45).await.unwrap();

        let outcome = spend_time(&pool, "bob", 20).await.unwrap();
        match outcome {
            SpendOutcome::Spent { new_balance } => assert_eq!(new_balance, 25),
            other => panic!("Expected spend to succeed, got {:?}", other),
        }

        // Time and points are independent currencies.
        let account = get_or_create_account(&pool, "bob").await.unwrap();
        assert_eq!(account.time_used, 20);
        assert_eq!(account.points_used, 0);

        let rejected = spend_time(&pool, "bob", 30).await.unwrap();
        assert!(matches!(rejected, SpendOutcome::Insufficient { balance: 25 }));
    }

    #[tokio::test]
    async fn test_spend_for_unknown_user_creates_empty_account() {
        let pool = setup_test_db().await.unwrap();

        let outcome = spend_points(&pool, "stranger", 1).await.unwrap();

        assert!(matches!(outcome, SpendOutcome::Insufficient { balance: 0 }));
    }

    #[tokio::test]
    async fn test_concurrent_spends_cannot_overspend() {
        let pool = setup_test_db().await.unwrap();
        credit_completion(&pool, "alice", 10, 0).await.unwrap();

        // Two spends of 7 against a balance of 10: each would pass an
        // advisory check, but the conditional write lets exactly one
        // through.
        let (first, second) = tokio::join!(
            spend_points(&pool, "alice", 7),
            spend_points(&pool, "alice", 7)
        );

        let outcomes = [first.unwrap(), second.unwrap()];
        let successes = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, SpendOutcome::Spent { .. }))
            .count();
        assert_eq!(successes, 1);

        let account = get_or_create_account(&pool, "alice").await.unwrap();
        assert_eq!(account.points_used, 7);
        assert_eq!(account.point_balance(), 3);
    }

    #[tokio::test]
    async fn test_summary_derivation() {
        let pool = setup_test_db().await.unwrap();
        credit_completion(&pool, "alice", 10, 15).await.unwrap();
        spend_points(&pool, "alice", 4).await.unwrap();

        let summary = get_or_create_account(&pool, "alice").await.unwrap().summary();

        assert_eq!(summary.points_earned, 10);
        assert_eq!(summary.points_used, 4);
        assert_eq!(summary.point_balance, 6);
        assert_eq!(summary.time_earned, 15);
        assert_eq!(summary.time_used, 0);
        assert_eq!(summary.time_balance, 15);
        assert_eq!(summary.tasks_completed, 1);
    }
}
