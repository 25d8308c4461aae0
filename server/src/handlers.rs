// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database;
use crate::ledger::{self, SpendOutcome};
use crate::tasks::{self, TaskMutation};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{
    coerce_reward, CompleteTaskPayload, CreateTaskPayload, NewTask, RewardSummary,
    SpendPointsPayload, SpendPointsReceipt, SpendTimePayload, SpendTimeReceipt, Task,
    UpdateTaskPayload, DEFAULT_USER_ID,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error, info};

/// Query parameters of the user-scoped read endpoints.
#[derive(Deserialize, Debug, Default)]
pub struct UserScopeQuery {
    pub user_id: Option<String>,
}

/// Resolves the effective user for a request. Callers that do not supply
/// an identifier all share the sentinel account.
fn resolve_user_id(requested: Option<String>) -> String {
    requested
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string())
}

#[allow(clippy::uninlined_format_args)]
fn require_positive_amount(raw: Option<i64>, field: &str) -> Result<i64, AppError> {
    match raw {
        Some(amount) if amount > 0 => Ok(amount),
        _ => Err(AppError::Validation(format!(
            "'{}' must be a positive integer.",
            field
        ))),
    }
}

/// Handler for listing a user's tasks.
pub async fn list_tasks(
    State(pool): State<SqlitePool>, // State injection (DB pool)
    Query(scope): Query<UserScopeQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    let user_id = resolve_user_id(scope.user_id);
    let tasks = tasks::get_tasks_for_user_from_db(&pool, &user_id).await?;
    info!("Successfully retrieved {} tasks for user {}.", tasks.len(), user_id);
    Ok(Json(tasks))
}

/// Handler for creating a new task.
#[allow(clippy::uninlined_format_args)]
pub async fn create_task(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateTaskPayload>, // Extracting the request body as JSON
) -> Result<(StatusCode, Json<Task>), AppError> {
    debug!("Received request to create task: {:?}", payload);

    // Validate the payload: a description, and at least one reward
    let description = payload.description.unwrap_or_default();
    if description.is_empty() {
        error!("Validation failed: Task description is missing or empty.");
        return Err(AppError::Validation(
            "Task description cannot be empty.".to_string(),
        ));
    }

    // Invalid or missing rewards become zero instead of failing the request.
    let point_reward = coerce_reward(payload.point_reward);
    let time_reward = coerce_reward(payload.time_reward);

    if point_reward == 0 && time_reward == 0 {
        error!("Validation failed: Task carries neither a point nor a time reward.");
        return Err(AppError::Validation(
            "A task must carry a positive point or time reward.".to_string(),
        ));
    }

    let new_task = NewTask {
        user_id: resolve_user_id(payload.user_id),
        description,
        point_reward,
        time_reward,
        category: payload.category,
        priority: payload.priority,
        notes: payload.notes,
    };

    let task = tasks::create_task_in_db(&pool, new_task).await?;

    info!("Task created successfully with ID: {}", task.id);

    // Return a 201 Created status with the new task as JSON.
    Ok((StatusCode::CREATED, Json(task)))
}

/// Handler for updating a pending task's mutable fields.
#[allow(clippy::uninlined_format_args)]
pub async fn update_task(
    State(pool): State<SqlitePool>,
    Path(task_id): Path<i64>, // Extract task ID from the URL path
    Json(payload): Json<UpdateTaskPayload>,
) -> Result<Json<Task>, AppError> {
    debug!("Received request to update task {}: {:?}", task_id, payload);

    if payload.description.as_deref() == Some("") {
        error!("Validation failed: Task description is empty.");
        return Err(AppError::Validation(
            "Task description cannot be empty.".to_string(),
        ));
    }

    match tasks::update_task_in_db(&pool, task_id, payload).await? {
        TaskMutation::Applied(task) => {
            info!("Task with ID {} updated successfully.", task_id);
            Ok(Json(task))
        }
        TaskMutation::NotFound => Err(AppError::NotFound(format!(
            "Task with ID {} not found.",
            task_id
        ))),
        TaskMutation::AlreadyCompleted => Err(AppError::AlreadyCompleted(task_id)),
    }
}

/// Handler for deleting a task by ID.
#[allow(clippy::uninlined_format_args)]
pub async fn delete_task(
    State(pool): State<SqlitePool>,
    Path(task_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = tasks::delete_task_in_db(&pool, task_id).await?;

    if deleted {
        info!("Task with ID {} deleted successfully.", task_id);
        Ok(Json(serde_json::json!({ "deleted": true, "id": task_id })))
    } else {
        error!("Task with ID {} not found for deletion.", task_id);
        Err(AppError::NotFound(format!(
            "Task with ID {} not found for deletion.",
            task_id
        )))
    }
}

/// Handler for completing a task and crediting its rewards.
///
/// The two writes are separate statements against separate rows, so a
/// credit failure leaves a completed task with no matching ledger entry.
/// That window is logged with enough detail for manual reconciliation
/// before the error is surfaced.
#[allow(clippy::uninlined_format_args)]
pub async fn complete_task(
    State(pool): State<SqlitePool>,
    Path(task_id): Path<i64>,
    payload: Option<Json<CompleteTaskPayload>>,
) -> Result<Json<Task>, AppError> {
    let scope_user = payload.and_then(|Json(body)| body.user_id);
    debug!(
        "Received request to complete task {} (scope: {:?})",
        task_id, scope_user
    );

    let task = match tasks::complete_task_in_db(&pool, task_id, scope_user.as_deref()).await? {
        TaskMutation::Applied(task) => task,
        TaskMutation::NotFound => {
            return Err(AppError::NotFound(format!(
                "Task with ID {} not found.",
                task_id
            )));
        }
        TaskMutation::AlreadyCompleted => return Err(AppError::AlreadyCompleted(task_id)),
    };

    // The credit always goes to the task's stored owner, never to the
    // caller-supplied identity.
    match ledger::credit_completion(&pool, &task.user_id, task.point_reward, task.time_reward).await
    {
        Ok(account) => {
            info!(
                "Task {} completed for user {}: +{} points, +{} minutes ({} tasks completed in total).",
                task.id, task.user_id, task.point_reward, task.time_reward, account.tasks_completed
            );
            Ok(Json(task))
        }
        Err(e) => {
            error!(
                "Task {} is marked completed but crediting user {} failed; undelivered rewards: {} points, {} minutes: {:?}",
                task.id, task.user_id, task.point_reward, task.time_reward, e
            );
            Err(AppError::Store(e))
        }
    }
}

/// Handler for spending points against the accumulated balance.
#[allow(clippy::uninlined_format_args)]
pub async fn spend_points(
    State(pool): State<SqlitePool>,
    Json(payload): Json<SpendPointsPayload>,
) -> Result<Json<SpendPointsReceipt>, AppError> {
    let amount = require_positive_amount(payload.amount, "amount")?;
    let user_id = resolve_user_id(payload.user_id);

    match ledger::spend_points(&pool, &user_id, amount).await? {
        SpendOutcome::Spent { new_balance } => {
            info!(
                "User {} spent {} points on '{}'.",
                user_id,
                amount,
                payload.description.as_deref().unwrap_or("unspecified")
            );
            Ok(Json(SpendPointsReceipt {
                spent: amount,
                new_balance,
            }))
        }
        SpendOutcome::Insufficient { balance } => Err(AppError::InsufficientBalance {
            currency: "point",
            requested: amount,
            available: balance,
        }),
    }
}

/// Handler for spending earned minutes on an activity.
#[allow(clippy::uninlined_format_args)]
pub async fn spend_time(
    State(pool): State<SqlitePool>,
    Json(payload): Json<SpendTimePayload>,
) -> Result<Json<SpendTimeReceipt>, AppError> {
    let minutes = require_positive_amount(payload.minutes, "minutes")?;
    let user_id = resolve_user_id(payload.user_id);

    match ledger::spend_time(&pool, &user_id, minutes).await? {
        SpendOutcome::Spent { new_balance } => {
            info!(
                "User {} spent {} minutes on '{}'.",
                user_id,
                minutes,
                payload.activity.as_deref().unwrap_or("unspecified")
            );
            Ok(Json(SpendTimeReceipt {
                spent: minutes,
                new_time_balance: new_balance,
                activity: payload.activity,
            }))
        }
        SpendOutcome::Insufficient { balance } => Err(AppError::InsufficientBalance {
            currency: "time",
            requested: minutes,
            available: balance,
        }),
    }
}

/// Handler for the per-user reward summary.
#[allow(clippy::uninlined_format_args)]
pub async fn rewards_summary(
    State(pool): State<SqlitePool>,
    Query(scope): Query<UserScopeQuery>,
) -> Result<Json<RewardSummary>, AppError> {
    let user_id = resolve_user_id(scope.user_id);
    let account = ledger::get_or_create_account(&pool, &user_id).await?;
    info!("Summary retrieved for user {}.", user_id);
    Ok(Json(account.summary()))
}

/// Handler for the administrative wipe of all task and ledger data.
pub async fn cleanup(
    State(pool): State<SqlitePool>,
) -> Result<Json<serde_json::Value>, AppError> {
    debug!("Received request to wipe all data.");

    let (tasks_deleted, users_deleted) = database::wipe_all_in_db(&pool).await?;

    Ok(Json(serde_json::json!({
        "tasks_deleted": tasks_deleted,
        "users_deleted": users_deleted
    })))
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// --- Custom Error Handling ---
// This is a good practice for transforming our internal errors
// (e.g., from the database) into appropriate HTTP responses.

/// Our custom error type for the application.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid required input.
    #[error("{0}")]
    Validation(String),

    /// The referenced task does not exist (under the requested scope).
    #[error("{0}")]
    NotFound(String),

    /// The task already went through its terminal transition.
    #[error("Task with ID {0} is already completed.")]
    AlreadyCompleted(i64),

    /// A spend exceeded the available balance. The response body carries
    /// both figures.
    #[error("Insufficient {currency} balance: requested {requested}, available {available}.")]
    InsufficientBalance {
        currency: &'static str,
        requested: i64,
        available: i64,
    },

    /// Any underlying store failure (coming from the database layer).
    #[error("An internal error occurred: {0}")]
    Store(#[from] anyhow::Error),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::AlreadyCompleted(_)
            | AppError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Allows Axum to convert our `AppError` into an HTTP `Response`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        tracing::error!(
            "Responding with error: status_code={}, message={}",
            code.as_u16(),
            self
        );
        let body = match &self {
            AppError::InsufficientBalance {
                requested,
                available,
                ..
            } => serde_json::json!({
                "error": self.to_string(),
                "requested": requested,
                "balance": available,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    // Helper to create a payload for tests
    fn create_test_payload(
        description: &str,
        point_reward: Option<i64>,
        time_reward: Option<i64>,
    ) -> Json<CreateTaskPayload> {
        Json(CreateTaskPayload {
            description: Some(description.to_string()),
            point_reward,
            time_reward,
            category: None,
            priority: None,
            notes: None,
            user_id: None,
        })
    }

    async fn setup_test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        database::init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_task_validation_empty_description() {
        // Arrange
        // The validation fails before any DB access, so no schema is needed.
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let payload = create_test_payload("", Some(5), None);

        // Act
        let result = create_task(State(pool), payload).await;

        // Assert
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        match err {
            AppError::Validation(message) => {
                assert_eq!(message, "Task description cannot be empty.")
            }
            other => panic!("Expected a validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_task_validation_no_reward() {
        // Arrange
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        // Negative values coerce to zero first, so this counts as rewardless.
        let payload = create_test_payload("A valid description", Some(-5), None);

        // Act
        let result = create_task(State(pool), payload).await;

        // Assert
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        match err {
            AppError::Validation(message) => {
                assert!(message.contains("positive point or time reward"))
            }
            other => panic!("Expected a validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_task_defaults_to_sentinel_user() {
        // Arrange
        let pool = setup_test_pool().await;
        let payload = create_test_payload("Read a book", Some(10), None);

        // Act
        let (status, Json(task)) = create_task(State(pool), payload).await.unwrap();

        // Assert
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(task.user_id, DEFAULT_USER_ID);
        assert!(!task.completed);
    }

    #[tokio::test]
    async fn test_spend_points_rejects_non_positive_amount() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();

        for amount in [None, Some(0), Some(-3)] {
            let payload = Json(SpendPointsPayload {
                amount,
                description: None,
                user_id: None,
            });

            let result = spend_points(State(pool.clone()), payload).await;

            let err = result.unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            match err {
                AppError::Validation(message) => {
                    assert_eq!(message, "'amount' must be a positive integer.")
                }
                other => panic!("Expected a validation error, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_spend_time_rejects_non_positive_minutes() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let payload = Json(SpendTimePayload {
            minutes: Some(0),
            activity: Some("gaming".to_string()),
            user_id: None,
        });

        let result = spend_time(State(pool), payload).await;

        let err = result.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_resolve_user_id_falls_back_to_sentinel() {
        assert_eq!(resolve_user_id(None), DEFAULT_USER_ID);
        assert_eq!(resolve_user_id(Some(String::new())), DEFAULT_USER_ID);
        assert_eq!(resolve_user_id(Some("alice".to_string())), "alice");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::Validation("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("missing".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::AlreadyCompleted(7).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InsufficientBalance {
                currency: "point",
                requested: 15,
                available: 10
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Store(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
