//! Accounts: registration, profiles and password recovery.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use modhub_shared::errors::{AppError, AppResult, ErrorCode};
use modhub_shared::types::auth::{AuthUser, UserRole};

use crate::mailer::Mailer;
use crate::models::{PasswordReset, ProfileChanges, User};
use crate::store::{constraints, Store};
use crate::views::{PrivateProfile, PublicProfile};

/// Returned whether or not the address belongs to an account.
pub const RESET_REQUESTED_MESSAGE: &str = "If an account with this email exists, a reset link has been sent.";

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    pub username: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(length(max = 500, message = "bio must be at most 500 characters"))]
    pub bio: Option<String>,
    #[validate(url(message = "avatar_url must be a valid URL"))]
    pub avatar_url: Option<String>,
    #[validate(length(max = 100, message = "country must be at most 100 characters"))]
    pub country: Option<String>,
    #[validate(length(max = 255, message = "website must be at most 255 characters"))]
    pub website: Option<String>,
    #[validate(length(max = 50, message = "discord handle must be at most 50 characters"))]
    pub discord_handle: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequestInput {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetConfirmInput {
    pub token: String,
    pub password: String,
}

/// Where reset links point and how long they stay valid.
#[derive(Debug, Clone)]
pub struct ResetSettings {
    pub frontend_url: String,
    pub ttl_minutes: i64,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < 8 {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must be at least 8 characters"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one number"));
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(AppError::new(ErrorCode::PasswordTooWeak, "password must contain at least one letter"));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if !(3..=30).contains(&len) {
        return Err(AppError::new(ErrorCode::InvalidUsername, "username must be between 3 and 30 characters"));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AppError::new(
            ErrorCode::InvalidUsername,
            "username can only contain letters, numbers, and underscores",
        ));
    }
    Ok(())
}

fn username_taken() -> AppError {
    AppError::new(ErrorCode::UsernameTaken, "username is already taken")
}

fn email_taken() -> AppError {
    AppError::new(ErrorCode::EmailAlreadyExists, "an account with this email already exists")
}

pub fn register(store: &dyn Store, input: RegisterInput) -> AppResult<PrivateProfile> {
    input.validate()?;
    let username = input.username.trim().to_string();
    validate_username(&username)?;
    validate_password(&input.password)?;
    let email = input.email.trim().to_lowercase();

    if store.find_user_by_username(&username)?.is_some() {
        return Err(username_taken());
    }
    if store.find_user_by_email(&email)?.is_some() {
        return Err(email_taken());
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::now_v7(),
        username,
        email,
        password_hash: hash_password(&input.password)?,
        role: UserRole::User.as_str().to_string(),
        modder_status: "regular".into(),
        bio: String::new(),
        avatar_url: None,
        country: String::new(),
        website: String::new(),
        discord_handle: String::new(),
        created_at: now,
        updated_at: now,
    };
    store.insert_user(&user).map_err(|e| {
        if e.is_duplicate_of(constraints::USERS_USERNAME) {
            username_taken()
        } else if e.is_duplicate_of(constraints::USERS_EMAIL) {
            email_taken()
        } else {
            e.into()
        }
    })?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

fn user_not_found() -> AppError {
    AppError::new(ErrorCode::UserNotFound, "user not found")
}

pub fn me(store: &dyn Store, caller: &AuthUser) -> AppResult<PrivateProfile> {
    Ok(store.find_user(caller.id)?.ok_or_else(user_not_found)?.into())
}

pub fn update_me(store: &dyn Store, caller: &AuthUser, input: ProfileInput) -> AppResult<PrivateProfile> {
    input.validate()?;
    if store.find_user(caller.id)?.is_none() {
        return Err(user_not_found());
    }
    let changes = ProfileChanges {
        bio: input.bio,
        avatar_url: input.avatar_url,
        country: input.country,
        website: input.website,
        discord_handle: input.discord_handle,
        updated_at: Some(Utc::now()),
    };
    Ok(store.update_profile(caller.id, &changes)?.into())
}

pub fn public_profile(store: &dyn Store, username: &str) -> AppResult<PublicProfile> {
    Ok(store.find_user_by_username(username)?.ok_or_else(user_not_found)?.into())
}

fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues a reset token for a known address. The answer never reveals
/// whether the address exists; mail failures are only logged.
pub fn request_password_reset(
    store: &dyn Store,
    mailer: &dyn Mailer,
    settings: &ResetSettings,
    input: ResetRequestInput,
) -> AppResult<&'static str> {
    input.validate()?;
    let email = input.email.trim().to_lowercase();

    if let Some(user) = store.find_user_by_email(&email)? {
        let token = generate_reset_token();
        let now = Utc::now();
        store.insert_password_reset(&PasswordReset {
            id: Uuid::now_v7(),
            user_id: user.id,
            token_hash: token_hash(&token),
            expires_at: now + Duration::minutes(settings.ttl_minutes),
            used_at: None,
            created_at: now,
        })?;

        let link = format!("{}/reset-password?token={token}", settings.frontend_url.trim_end_matches('/'));
        if let Err(e) = mailer.send_password_reset(&user.email, &link) {
            tracing::error!(error = %e, user_id = %user.id, "failed to send reset email");
        }
    }

    Ok(RESET_REQUESTED_MESSAGE)
}

pub fn confirm_password_reset(store: &dyn Store, input: ResetConfirmInput) -> AppResult<&'static str> {
    let invalid = || AppError::new(ErrorCode::ResetTokenInvalid, "The reset link is invalid");

    let reset = store.find_password_reset(&token_hash(input.token.trim()))?.ok_or_else(invalid)?;
    if reset.used_at.is_some() || reset.expires_at < Utc::now() {
        return Err(invalid());
    }
    validate_password(&input.password)?;

    if !store.consume_password_reset(reset.id, Utc::now())? {
        return Err(invalid());
    }
    store.set_password_hash(reset.user_id, &hash_password(&input.password)?)?;

    tracing::info!(user_id = %reset.user_id, "password reset");
    Ok("Your password has been reset.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    use std::sync::Mutex;

    fn verify_password(password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
            .unwrap_or(false)
    }

    #[derive(Default)]
    struct RecordingMailer {
        links: Mutex<Vec<(String, String)>>,
    }

    impl Mailer for RecordingMailer {
        fn send_password_reset(&self, email: &str, reset_link: &str) -> anyhow::Result<()> {
            self.links.lock().unwrap().push((email.to_string(), reset_link.to_string()));
            Ok(())
        }
    }

    fn settings() -> ResetSettings {
        ResetSettings { frontend_url: "https://modhub.example.com/".into(), ttl_minutes: 30 }
    }

    fn register_input(username: &str, email: &str) -> RegisterInput {
        RegisterInput { username: username.into(), email: email.into(), password: "trucker123".into() }
    }

    #[test]
    fn passwords_need_letters_and_digits() {
        assert_eq!(validate_password("short1").unwrap_err().code(), ErrorCode::PasswordTooWeak);
        assert_eq!(validate_password("lettersonly").unwrap_err().code(), ErrorCode::PasswordTooWeak);
        assert_eq!(validate_password("12345678").unwrap_err().code(), ErrorCode::PasswordTooWeak);
        assert!(validate_password("trucker123").is_ok());
    }

    #[test]
    fn usernames_are_restricted() {
        assert_eq!(validate_username("ab").unwrap_err().code(), ErrorCode::InvalidUsername);
        assert_eq!(validate_username("bad name").unwrap_err().code(), ErrorCode::InvalidUsername);
        assert!(validate_username("road_king_42").is_ok());
    }

    #[test]
    fn duplicate_accounts_conflict() {
        let store = MemoryStore::new();
        register(&store, register_input("road_king", "King@Example.com")).unwrap();

        let err = register(&store, register_input("road_king", "other@example.com")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UsernameTaken);

        let err = register(&store, register_input("road_queen", "king@example.com")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmailAlreadyExists);
    }

    #[test]
    fn reset_answer_is_identical_for_unknown_addresses() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        register(&store, register_input("road_king", "king@example.com")).unwrap();

        let known = request_password_reset(&store, &mailer, &settings(), ResetRequestInput { email: "king@example.com".into() }).unwrap();
        let unknown = request_password_reset(&store, &mailer, &settings(), ResetRequestInput { email: "nobody@example.com".into() }).unwrap();

        assert_eq!(known, unknown);
        assert_eq!(known, RESET_REQUESTED_MESSAGE);
        assert_eq!(mailer.links.lock().unwrap().len(), 1);
    }

    #[test]
    fn reset_token_works_once() {
        let store = MemoryStore::new();
        let mailer = RecordingMailer::default();
        let profile = register(&store, register_input("road_king", "king@example.com")).unwrap();
        request_password_reset(&store, &mailer, &settings(), ResetRequestInput { email: "king@example.com".into() }).unwrap();

        let link = mailer.links.lock().unwrap()[0].1.clone();
        assert!(link.starts_with("https://modhub.example.com/reset-password?token="));
        let token = link.rsplit('=').next().unwrap().to_string();

        let confirm = |token: &str| {
            confirm_password_reset(&store, ResetConfirmInput { token: token.into(), password: "newpass456".into() })
        };
        confirm(&token).unwrap();
        assert_eq!(confirm(&token).unwrap_err().code(), ErrorCode::ResetTokenInvalid);
        assert_eq!(confirm("not-a-token").unwrap_err().code(), ErrorCode::ResetTokenInvalid);

        let user = store.find_user(profile.id).unwrap().unwrap();
        assert!(verify_password("newpass456", &user.password_hash));
        assert!(!verify_password("trucker123", &user.password_hash));
    }

    #[test]
    fn public_profile_hides_email() {
        let store = MemoryStore::new();
        register(&store, register_input("road_king", "king@example.com")).unwrap();

        let json = serde_json::to_value(public_profile(&store, "road_king").unwrap()).unwrap();
        assert!(json.get("email").is_none());
        assert_eq!(json["username"], "road_king");
    }
}
