// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::handlers;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::SqlitePool;

/// Creates and configures the application router.
pub fn create_router(pool: SqlitePool) -> Router {
    Router::new()
        // Associates the `GET /api/tasks` route with the `list_tasks` handler
        .route("/api/tasks", get(handlers::list_tasks))
        // Associates the `POST /api/tasks` route with the `create_task` handler
        .route("/api/tasks", post(handlers::create_task))
        // Associates the `PUT /api/tasks/{id}` route with the `update_task` handler
        .route("/api/tasks/{id}", put(handlers::update_task))
        // Associates the `DELETE /api/tasks/{id}` route with the `delete_task` handler
        .route("/api/tasks/{id}", delete(handlers::delete_task))
        // Completion is the one operation that touches both the task and the ledger
        .route("/api/tasks/{id}/complete", post(handlers::complete_task))
        // Reward ledger: spend and read
        .route("/api/rewards/use", post(handlers::spend_points))
        .route("/api/rewards/use-time", post(handlers::spend_time))
        .route("/api/rewards/summary", get(handlers::rewards_summary))
        // Administrative wipe of both collections
        .route("/api/admin/cleanup", delete(handlers::cleanup))
        .route("/api/health", get(handlers::health))
        // Adds the database pool to the application state
        .with_state(pool)
}
