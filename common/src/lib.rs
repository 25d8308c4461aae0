// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier credited or charged when a request carries no explicit
/// `user_id`. Every endpoint that accepts an identity falls back to it.
pub const DEFAULT_USER_ID: &str = "default-user";

#[allow(clippy::doc_overindented_list_items)]
/// Represents a task within the system.
///
/// Derivation attributes (derive):
/// - `Serialize`, `Deserialize`: Allows conversion to/from JSON.
/// - `Debug`: Enables displaying the structure for debugging (e.g., `println!("{:?}", task)`).
/// - `Clone`: Allows creating copies of the object.
/// - `sqlx::FromRow`: Allows `sqlx` to create a `Task` instance directly
///    from a database result row.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Task {
    #[sqlx(rename = "id")]
    pub id: i64,

    #[sqlx(rename = "user_id")]
    pub user_id: String,

    #[sqlx(rename = "description")]
    pub description: String,

    // Rewards are non-negative integers; time is counted in minutes.
    #[sqlx(rename = "point_reward")]
    pub point_reward: i64,

    #[sqlx(rename = "time_reward")]
    pub time_reward: i64,

    #[sqlx(rename = "completed")]
    pub completed: bool,

    #[sqlx(rename = "category")]
    pub category: Option<String>,

    #[sqlx(rename = "priority")]
    pub priority: Option<i32>, // (e.g., 1 = high, lower number = higher priority)

    #[sqlx(rename = "notes")]
    pub notes: Option<String>,

    #[sqlx(rename = "created_at")]
    pub created_at: DateTime<Utc>,

    // Set exactly once, at the moment `completed` flips to true.
    #[sqlx(rename = "completed_at")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Structure used to receive task creation data from the API.
/// It's a good practice to separate database models (`Task`)
/// from API models (`CreateTaskPayload`), as they may have different fields.
/// Older clients send `name` instead of `description` and `reward` instead
/// of `point_reward`; both spellings are accepted.
#[derive(Deserialize, Debug)]
pub struct CreateTaskPayload {
    // Optional at the serde level so a missing description surfaces as a
    // 400 from our own validation rather than a body-rejection.
    #[serde(alias = "name")]
    pub description: Option<String>,
    #[serde(alias = "reward")]
    pub point_reward: Option<i64>,
    pub time_reward: Option<i64>,
    pub category: Option<String>,
    pub priority: Option<i32>,
    pub notes: Option<String>,
    pub user_id: Option<String>,
}

/// A creation record that already went through validation: the user is
/// resolved and both rewards are coerced to non-negative integers.
#[derive(Debug)]
pub struct NewTask {
    pub user_id: String,
    pub description: String,
    pub point_reward: i64,
    pub time_reward: i64,
    pub category: Option<String>,
    pub priority: Option<i32>,
    pub notes: Option<String>,
}

/// Mutable task attributes for `PUT /api/tasks/{id}`.
/// Absent fields keep their current values.
#[derive(Deserialize, Debug, Default)]
pub struct UpdateTaskPayload {
    pub description: Option<String>,
    #[serde(alias = "reward")]
    pub point_reward: Option<i64>,
    pub time_reward: Option<i64>,
    pub category: Option<String>,
    pub priority: Option<i32>,
    pub notes: Option<String>,
}

/// Optional body of `POST /api/tasks/{id}/complete`. When `user_id` is
/// given, the lookup is scoped to that owner.
#[derive(Deserialize, Debug, Default)]
pub struct CompleteTaskPayload {
    pub user_id: Option<String>,
}

/// Per-user reward ledger entry. The four counters only ever grow;
/// balances are derived on demand and never stored.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct RewardAccount {
    pub id: String,
    pub points_earned: i64,
    pub points_used: i64,
    pub time_earned: i64,
    pub time_used: i64,
    pub tasks_completed: i64,
}

impl RewardAccount {
    pub fn point_balance(&self) -> i64 {
        self.points_earned - self.points_used
    }

    pub fn time_balance(&self) -> i64 {
        self.time_earned - self.time_used
    }

    /// Flattens the ledger entry into the read-only summary shape served
    /// by `GET /api/rewards/summary`.
    pub fn summary(&self) -> RewardSummary {
        RewardSummary {
            points_earned: self.points_earned,
            points_used: self.points_used,
            point_balance: self.point_balance(),
            tasks_completed: self.tasks_completed,
            time_earned: self.time_earned,
            time_used: self.time_used,
            time_balance: self.time_balance(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RewardSummary {
    pub points_earned: i64,
    pub points_used: i64,
    pub point_balance: i64,
    pub tasks_completed: i64,
    pub time_earned: i64,
    pub time_used: i64,
    pub time_balance: i64,
}

/// Body of `POST /api/rewards/use`. The optional description is only
/// recorded in the server log.
#[derive(Deserialize, Debug)]
pub struct SpendPointsPayload {
    pub amount: Option<i64>,
    pub description: Option<String>,
    pub user_id: Option<String>,
}

/// Body of `POST /api/rewards/use-time`.
#[derive(Deserialize, Debug)]
pub struct SpendTimePayload {
    pub minutes: Option<i64>,
    pub activity: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SpendPointsReceipt {
    pub spent: i64,
    pub new_balance: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SpendTimeReceipt {
    pub spent: i64,
    pub new_time_balance: i64,
    pub activity: Option<String>,
}

/// Coerces a raw reward value from the API into a non-negative integer.
/// Missing or negative input becomes 0 instead of failing the request.
pub fn coerce_reward(raw: Option<i64>) -> i64 {
    raw.unwrap_or(0).max(0)
}
