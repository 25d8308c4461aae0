// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use sqlx::{migrate::MigrateDatabase, Sqlite, SqlitePool}; // Added MigrateDatabase for database_exists/create_database
use tracing::{debug, info};

/// Establishes the database connection pool.
/// If the database does not exist, it creates it.
/// It also ensures the `tasks` and `users` tables have the correct schema.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url) // Use the passed URL
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let pool = SqlitePool::connect(database_url) // Use the passed URL
        .await
        .context("Failed to connect to database")?;

    init_schema(&pool).await?;

    info!("'tasks' and 'users' tables are ready.");

    Ok(pool)
}

/// Runs the idempotent schema setup. Safe to call on every startup; the
/// test helpers reuse it against in-memory databases.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            description TEXT NOT NULL,
            point_reward INTEGER NOT NULL DEFAULT 0,
            time_reward INTEGER NOT NULL DEFAULT 0,
            completed BOOLEAN NOT NULL DEFAULT 0,
            category TEXT NULL,
            priority INTEGER NULL,
            notes TEXT NULL,
            created_at TIMESTAMP NOT NULL,
            completed_at TIMESTAMP WITH TIME ZONE NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'tasks' table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            points_earned INTEGER NOT NULL DEFAULT 0,
            points_used INTEGER NOT NULL DEFAULT 0,
            time_earned INTEGER NOT NULL DEFAULT 0,
            time_used INTEGER NOT NULL DEFAULT 0,
            tasks_completed INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'users' table")?;

    Ok(())
}

/// Deletes every task and every ledger entry. Irreversible; meant for
/// pre-launch resets only.
pub async fn wipe_all_in_db(pool: &SqlitePool) -> Result<(u64, u64)> {
    debug!("Wiping all task and ledger data.");

    let tasks_deleted = sqlx::query("DELETE FROM tasks")
        .execute(pool)
        .await
        .context("Failed to wipe 'tasks' table")?
        .rows_affected();

    let users_deleted = sqlx::query("DELETE FROM users")
        .execute(pool)
        .await
        .context("Failed to wipe 'users' table")?
        .rows_affected();

    info!(
        "Wipe removed {} tasks and {} ledger entries.",
        tasks_deleted, users_deleted
    );

    Ok((tasks_deleted, users_deleted))
}
