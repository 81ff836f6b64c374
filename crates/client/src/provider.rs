//! The `AuthApi` trait defines the interface for the account backend
//! (REST, or a test double).

use async_trait::async_trait;
use lh_domain::error::Result;
use lh_domain::user::{Activity, LearningProfile, User};

use crate::types::{
    AuthResponse, Credential, LoginRequest, PasswordChange, PasswordResetConfirm,
    PasswordResetRequest, ProfileFields, ProfileUpdate, Registration,
};

/// Abstraction over the `/api/auth/` surface.
///
/// Implementations hold no session state: every authenticated call takes
/// the credential explicitly, so the caller that owns the session decides
/// which token goes out on each request.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Fetch the user the credential belongs to (GET /api/auth/me/).
    async fn current_user(&self, credential: &Credential) -> Result<User>;

    /// Exchange email + password for a token (POST /api/auth/login/).
    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse>;

    /// Create an account and receive a token (POST /api/auth/register/).
    async fn register(&self, req: &Registration) -> Result<AuthResponse>;

    /// Invalidate the server-side session (POST /api/auth/logout/).
    async fn logout(&self, credential: &Credential) -> Result<()>;

    /// Partial profile update (PUT /api/auth/profile/update/). Returns the
    /// editable fields as the server stored them.
    async fn update_profile(
        &self,
        credential: &Credential,
        update: &ProfileUpdate,
    ) -> Result<ProfileFields>;

    /// POST /api/auth/password/change/.
    async fn change_password(&self, credential: &Credential, change: &PasswordChange)
        -> Result<()>;

    /// Learning statistics (GET /api/auth/profile/detail/).
    async fn learning_profile(&self, credential: &Credential) -> Result<LearningProfile>;

    /// Activity log, newest first (GET /api/auth/activities/).
    async fn activities(&self, credential: &Credential) -> Result<Vec<Activity>>;

    /// Ask for a reset email (POST /api/auth/password/reset/).
    async fn request_password_reset(&self, req: &PasswordResetRequest) -> Result<()>;

    /// Complete a reset (POST /api/auth/password/reset/confirm/).
    async fn confirm_password_reset(&self, req: &PasswordResetConfirm) -> Result<()>;
}
