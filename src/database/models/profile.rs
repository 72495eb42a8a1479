use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Base identity record from `mdl_user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LearnerProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub city: String,
    /// Unix seconds
    pub timecreated: i64,
    pub lastname: String,
    pub firstname: String,
    pub loginday: Option<i64>,
}
