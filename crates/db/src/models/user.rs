//! User entity model and DTOs.

use canopy_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user row from the `users` table.
///
/// Contains the password hash -- NEVER serialize this to API responses
/// directly. Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub phone_number: Option<String>,
    pub password_hash: String,
    pub full_name: String,
    pub avatar: Option<String>,
    pub role: String,
    pub total_points: i64,
    pub available_points: i64,
    pub is_active: bool,
    pub is_verified: bool,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub email: String,
    pub phone_number: Option<String>,
    pub full_name: String,
    pub avatar: Option<String>,
    pub role: String,
    pub total_points: i64,
    pub available_points: i64,
    pub is_active: bool,
    pub is_verified: bool,
    pub referral_code: Option<String>,
    pub created_at: Timestamp,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id,
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
            role: user.role.clone(),
            total_points: user.total_points,
            available_points: user.available_points,
            is_active: user.is_active,
            is_verified: user.is_verified,
            referral_code: user.referral_code.clone(),
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub phone_number: Option<String>,
    pub password_hash: String,
    pub full_name: String,
    pub referral_code: String,
    pub referred_by: Option<String>,
}
