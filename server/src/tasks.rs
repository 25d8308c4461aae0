// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::Utc;
use common::{NewTask, Task, UpdateTaskPayload};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Outcome of a conditional mutation on a single task.
#[derive(Debug)]
pub enum TaskMutation {
    Applied(Task),
    NotFound,
    AlreadyCompleted,
}

/// Inserts a new task into the database.
#[allow(clippy::uninlined_format_args)]
pub async fn create_task_in_db(pool: &SqlitePool, new_task: NewTask) -> Result<Task> {
    let created_at = Utc::now();

    debug!(
        "Insert values: user_id={}, description={}, point_reward={}, time_reward={}, created_at={}",
        new_task.user_id, new_task.description, new_task.point_reward, new_task.time_reward, created_at
    );

    let id = sqlx::query(
        "INSERT INTO tasks (user_id, description, point_reward, time_reward, completed, category, priority, notes, created_at, completed_at) VALUES (?, ?, ?, ?, 0, ?, ?, ?, ?, NULL)"
    )
    .bind(&new_task.user_id)
    .bind(&new_task.description)
    .bind(new_task.point_reward)
    .bind(new_task.time_reward)
    .bind(&new_task.category)
    .bind(new_task.priority)
    .bind(&new_task.notes)
    .bind(created_at)
    .execute(pool)
    .await
    .context("Failed to insert task into DB")?
    .last_insert_rowid();

    let task = Task {
        id,
        user_id: new_task.user_id,
        description: new_task.description,
        point_reward: new_task.point_reward,
        time_reward: new_task.time_reward,
        completed: false, // Newly created tasks are always pending
        category: new_task.category,
        priority: new_task.priority,
        notes: new_task.notes,
        created_at,
        completed_at: None,
    };

    Ok(task)
}

/// Retrieves all tasks owned by `user_id`, in insertion order.
pub async fn get_tasks_for_user_from_db(pool: &SqlitePool, user_id: &str) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks WHERE user_id = ? ORDER BY id ASC;",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to retrieve tasks from DB")?;

    Ok(tasks)
}

/// Looks up a single task, optionally scoped to an owner.
#[allow(clippy::uninlined_format_args)]
async fn fetch_task(pool: &SqlitePool, task_id: i64, scope_user: Option<&str>) -> Result<Option<Task>> {
    let task = match scope_user {
        Some(user_id) => {
            sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ? AND user_id = ?")
                .bind(task_id)
                .bind(user_id)
                .fetch_optional(pool)
                .await
        }
        None => {
            sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
                .bind(task_id)
                .fetch_optional(pool)
                .await
        }
    }
    .context(format!("Failed to look up task with ID: {}", task_id))?;

    Ok(task)
}

/// Marks a pending task completed and stamps `completed_at`.
///
/// `Pending -> Completed` is the only transition a task ever makes, and it
/// is terminal: the conditional `completed = 0` predicate makes a second
/// attempt report `AlreadyCompleted` instead of re-applying. The caller is
/// responsible for crediting the owner's ledger with the task's rewards.
#[allow(clippy::uninlined_format_args)]
pub async fn complete_task_in_db(
    pool: &SqlitePool,
    task_id: i64,
    scope_user: Option<&str>,
) -> Result<TaskMutation> {
    let completed_at = Utc::now();

    let result = match scope_user {
        Some(user_id) => {
            sqlx::query(
                "UPDATE tasks SET completed = 1, completed_at = ? WHERE id = ? AND user_id = ? AND completed = 0",
            )
            .bind(completed_at)
            .bind(task_id)
            .bind(user_id)
            .execute(pool)
            .await
        }
        None => {
            sqlx::query(
                "UPDATE tasks SET completed = 1, completed_at = ? WHERE id = ? AND completed = 0",
            )
            .bind(completed_at)
            .bind(task_id)
            .execute(pool)
            .await
        }
    }
    .context(format!("Failed to complete task with ID: {}", task_id))?;

    if result.rows_affected() == 0 {
        // Nothing matched: either the task does not exist (under this
        // scope) or it was completed before.
        return Ok(match fetch_task(pool, task_id, scope_user).await? {
            Some(task) if task.completed => TaskMutation::AlreadyCompleted,
            _ => TaskMutation::NotFound,
        });
    }

    let task = fetch_task(pool, task_id, scope_user)
        .await?
        .context(format!("Task with ID {} vanished after completion", task_id))?;

    info!("Task {} marked completed at {}.", task.id, completed_at);

    Ok(TaskMutation::Applied(task))
}

/// Applies the provided subset of mutable fields to a pending task.
/// Rewards keep the non-negative rule from creation.
#[allow(clippy::uninlined_format_args)]
pub async fn update_task_in_db(
    pool: &SqlitePool,
    task_id: i64,
    payload: UpdateTaskPayload,
) -> Result<TaskMutation> {
    let Some(existing) = fetch_task(pool, task_id, None).await? else {
        return Ok(TaskMutation::NotFound);
    };
    if existing.completed {
        return Ok(TaskMutation::AlreadyCompleted);
    }

    let description = payload.description.unwrap_or(existing.description);
    let point_reward = payload
        .point_reward
        .map(|raw| raw.max(0))
        .unwrap_or(existing.point_reward);
    let time_reward = payload
        .time_reward
        .map(|raw| raw.max(0))
        .unwrap_or(existing.time_reward);
    let category = payload.category.or(existing.category);
    let priority = payload.priority.or(existing.priority);
    let notes = payload.notes.or(existing.notes);

    // The `completed = 0` guard re-checks the state in case a concurrent
    // completion landed between the lookup and this write.
    let result = sqlx::query(
        "UPDATE tasks SET description = ?, point_reward = ?, time_reward = ?, category = ?, priority = ?, notes = ? WHERE id = ? AND completed = 0",
    )
    .bind(&description)
    .bind(point_reward)
    .bind(time_reward)
    .bind(&category)
    .bind(priority)
    .bind(&notes)
    .bind(task_id)
    .execute(pool)
    .await
    .context(format!("Failed to update task with ID: {}", task_id))?;

    if result.rows_affected() == 0 {
        return Ok(match fetch_task(pool, task_id, None).await? {
            Some(task) if task.completed => TaskMutation::AlreadyCompleted,
            _ => TaskMutation::NotFound,
        });
    }

    let task = fetch_task(pool, task_id, None)
        .await?
        .context(format!("Task with ID {} vanished after update", task_id))?;

    Ok(TaskMutation::Applied(task))
}

/// Removes a task from the database.
/// Returns true if a task was deleted, false if no task with the given ID
/// was found. Completed tasks may be deleted too.
#[allow(clippy::uninlined_format_args)]
pub async fn delete_task_in_db(pool: &SqlitePool, task_id: i64) -> Result<bool> {
    debug!("Attempting to delete task with ID: {}", task_id);

    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(pool)
        .await
        .context(format!("Failed to delete task with ID: {}", task_id))?;

    let rows_affected = result.rows_affected();
    info!("Deleted {} rows for task ID: {}", rows_affected, task_id);

    Ok(rows_affected > 0)
}
