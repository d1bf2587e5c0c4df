//! Account and session handlers
//!
//! Registration is OTP-gated: a new (or still-unverified) account gets a
//! 6-digit code mailed to it and becomes usable once verified. Password
//! reset follows the same OTP flow and exchanges the verified code for a
//! short-lived reset token.

use crate::api::auth_middleware::CurrentUser;
use crate::auth::{
    generate_otp, generate_username, hash_password, issue_reset_token, issue_session_token,
    verify_password,
};
use crate::{db, ApiError, ApiResult, AppState};
use axum::extract::State;
use axum::{Extension, Form, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub email: String,
    pub otp_sent: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp_code: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// OAuth2-style password form (`username` carries the email address)
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyResetOtpRequest {
    pub email: String,
    pub otp_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    let existing = db::users::find_by_email(&state.pool, &req.email).await?;
    if let Some(user) = &existing {
        if user.is_verified() {
            return Err(ApiError::BadRequest(
                "Email already registered. Please log in.".to_string(),
            ));
        }
    }

    let (otp_code, otp_expires) = generate_otp();
    let hashed = hash_password(&req.password);

    match existing {
        Some(user) => {
            info!(email = %req.email, "Unverified account re-registered, issuing new OTP");
            let username = if user.username.is_none() {
                Some(generate_username(&state.pool, &req.first_name, &req.last_name).await?)
            } else {
                None
            };
            db::users::update_registration(
                &state.pool,
                user.id,
                &req.first_name,
                &req.last_name,
                &hashed,
                username.as_deref(),
                &otp_code,
                otp_expires,
            )
            .await?;
        }
        None => {
            let username =
                generate_username(&state.pool, &req.first_name, &req.last_name).await?;
            info!(email = %req.email, username = %username, "Creating new user");
            db::users::insert(
                &state.pool,
                &req.email,
                &username,
                &req.first_name,
                &req.last_name,
                &hashed,
                &otp_code,
                otp_expires,
            )
            .await?;
        }
    }

    let otp_sent = state.mailer.send_otp(&req.email, &otp_code).await;

    let message = if otp_sent {
        "Registration successful! Please check your email for the verification code.".to_string()
    } else {
        "Registration successful! However, we couldn't send the verification email. \
         Please contact support or try again later."
            .to_string()
    };

    Ok(Json(RegisterResponse {
        message,
        email: req.email,
        otp_sent,
    }))
}

/// POST /auth/verify-otp
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = db::users::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or_else(|| {
            ApiError::BadRequest("User not found. Please register first.".to_string())
        })?;

    if user.is_verified() {
        return Err(ApiError::BadRequest(
            "Email already verified. Please login.".to_string(),
        ));
    }

    check_otp(&user.otp_code, user.otp_expires, &req.otp_code)?;

    db::users::mark_verified(&state.pool, user.id).await?;

    let issued = issue_session_token();
    db::sessions::insert(&state.pool, &issued.token_hash, user.id, issued.expires_at).await?;

    Ok(Json(TokenResponse {
        access_token: issued.token,
        token_type: "bearer".to_string(),
        message: Some("Email verified successfully".to_string()),
    }))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    // Exact match first, then case-insensitive for addresses typed with
    // different capitalization than at registration.
    let user = match db::users::find_by_email(&state.pool, &form.username).await? {
        Some(user) => Some(user),
        None => db::users::find_by_email_ci(&state.pool, &form.username).await?,
    };

    let Some(user) = user else {
        return Err(unauthorized_login());
    };

    if !verify_password(&form.password, &user.hashed_password) {
        return Err(unauthorized_login());
    }

    // Backfill a username for accounts predating username generation
    if user.username.is_none() && (user.first_name.is_some() || user.last_name.is_some()) {
        let username = generate_username(
            &state.pool,
            user.first_name.as_deref().unwrap_or("user"),
            user.last_name.as_deref().unwrap_or(""),
        )
        .await?;
        db::users::set_username(&state.pool, user.id, &username).await?;
        info!(email = %user.email, username = %username, "Backfilled username");
    }

    let issued = issue_session_token();
    db::sessions::insert(&state.pool, &issued.token_hash, user.id, issued.expires_at).await?;

    Ok(Json(TokenResponse {
        access_token: issued.token,
        token_type: "bearer".to_string(),
        message: None,
    }))
}

/// POST /auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let Some(user) = db::users::find_by_email(&state.pool, &req.email).await? else {
        // Don't reveal whether the address is registered
        return Ok(Json(serde_json::json!({
            "message": "If that email exists, a verification code has been sent."
        })));
    };

    let (otp_code, otp_expires) = generate_otp();
    db::users::set_otp(&state.pool, user.id, &otp_code, otp_expires).await?;

    let otp_sent = state.mailer.send_otp(&user.email, &otp_code).await;

    let message = if otp_sent {
        "Verification code sent to your email. Please check your inbox."
    } else {
        "Failed to send verification email. Please try again later."
    };

    Ok(Json(serde_json::json!({
        "message": message,
        "otp_sent": otp_sent,
    })))
}

/// POST /auth/verify-reset-otp
pub async fn verify_reset_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyResetOtpRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = db::users::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or_else(|| ApiError::BadRequest("User not found".to_string()))?;

    check_otp(&user.otp_code, user.otp_expires, &req.otp_code)?;

    let (reset_token, expires) = issue_reset_token();
    db::users::set_reset_token(&state.pool, user.id, &reset_token, expires).await?;

    Ok(Json(serde_json::json!({
        "message": "Verification code verified successfully",
        "reset_token": reset_token,
    })))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let user = db::users::find_by_reset_token(&state.pool, &req.token)
        .await?
        .ok_or_else(|| {
            ApiError::BadRequest("Invalid or expired reset token".to_string())
        })?;

    let expired = user
        .reset_token_expires
        .map(|expires| expires < Utc::now())
        .unwrap_or(true);
    if expired {
        return Err(ApiError::BadRequest("Reset token has expired".to_string()));
    }

    db::users::update_password(&state.pool, user.id, &hash_password(&req.new_password)).await?;

    Ok(Json(serde_json::json!({
        "message": "Password reset successfully"
    })))
}

/// POST /auth/change-password (authenticated)
pub async fn change_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if !verify_password(&req.current_password, &user.hashed_password) {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    db::users::update_password(&state.pool, user.id, &hash_password(&req.new_password)).await?;

    Ok(Json(serde_json::json!({
        "message": "Password changed successfully"
    })))
}

/// Validate a submitted OTP against the stored code and expiry
fn check_otp(
    stored_code: &Option<String>,
    expires: Option<chrono::DateTime<Utc>>,
    submitted: &str,
) -> Result<(), ApiError> {
    let valid = stored_code
        .as_deref()
        .map(|code| code == submitted)
        .unwrap_or(false);
    if !valid {
        return Err(ApiError::BadRequest(
            "Invalid verification code.".to_string(),
        ));
    }

    let expired = expires.map(|e| e < Utc::now()).unwrap_or(true);
    if expired {
        return Err(ApiError::BadRequest(
            "Verification code has expired. Please request a new one.".to_string(),
        ));
    }

    Ok(())
}

fn unauthorized_login() -> ApiError {
    ApiError::Unauthorized("Incorrect email or password".to_string())
}
