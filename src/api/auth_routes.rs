//! Session, account and user administration handlers

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::extract::{ApiJson, ApiPath};
use super::routes::ApiResponse;
use super::server::AppState;
use crate::auth::models::{
    validate_password, LoginRequest, LoginResponse, PasswordResetRequest, RecoveryRequest,
    RegistrationRequest, RolesUpdate,
};
use crate::auth::{CurrentUser, Principal, PrincipalLoader, Role, UserInfo, UserStore};
use crate::error::{Error, Result};

// Session

/// Check the credentials and hand out the token cookie
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let principal = state
        .users
        .load_principal(&req.username)
        .await?
        .filter(|p| p.active);

    // Unknown names cost one bcrypt check too, so timing does not reveal them
    let hash = match &principal {
        Some(p) => p.password_hash.clone(),
        None => state.decoy_hash.to_string(),
    };
    let matches = state.hasher.verify_blocking(req.password, hash).await;

    let principal = match principal {
        Some(principal) if matches => principal,
        _ => {
            tracing::warn!("Failed login for '{}'", req.username);
            return Err(Error::BadCredentials);
        }
    };

    let cookie = state.auth.login_cookie(&principal.username)?;
    tracing::info!("User '{}' logged in", principal.username);

    let body = LoginResponse {
        user: UserInfo::from(&principal),
        expires_in: state.auth.codec.validity_secs(),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(ApiResponse::ok(body))))
}

/// Self-service sign-up; new accounts get the USER role
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegistrationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserInfo>>)> {
    req.validate()?;

    let hash = state.hasher.hash_blocking(req.password).await?;
    let principal = Principal::new(&req.username, hash, [Role::User]).with_email(req.email);
    state.users.create_user(principal.clone()).await?;

    tracing::info!("Registered user '{}'", principal.username);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(UserInfo::from(&principal))),
    ))
}

/// Expire the token cookie; the token itself stays valid until it expires
pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let cookie = state.auth.logout_cookie()?;
    Ok(([(header::SET_COOKIE, cookie)], Json(ApiResponse::ok("logged out"))))
}

// Password recovery

/// Issue a recovery code. The answer is the same whether or not the user exists.
pub async fn request_recovery(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RecoveryRequest>,
) -> Result<Json<ApiResponse<&'static str>>> {
    match state.users.load_principal(&req.username).await? {
        Some(principal) if principal.active => {
            let code = state.recovery.issue(&principal.username).await;
            tracing::info!(
                username = %principal.username,
                code = %code,
                "Password recovery code issued"
            );
        }
        _ => tracing::debug!("Recovery requested for unknown user '{}'", req.username),
    }
    Ok(Json(ApiResponse::ok(
        "If the account exists, a recovery code has been issued",
    )))
}

/// Redeem a recovery code and set a new password
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PasswordResetRequest>,
) -> Result<Json<ApiResponse<&'static str>>> {
    validate_password(&req.new_password)?;

    if !state.recovery.redeem(&req.username, &req.code).await {
        tracing::warn!("Invalid recovery code for '{}'", req.username);
        return Err(Error::InvalidRecoveryCode);
    }

    let hash = state.hasher.hash_blocking(req.new_password).await?;
    state.users.update_password(&req.username, &hash).await?;
    tracing::info!("Password reset for '{}'", req.username);
    Ok(Json(ApiResponse::ok("password updated")))
}

// Users

pub async fn me(user: CurrentUser) -> Json<ApiResponse<UserInfo>> {
    Json(ApiResponse::ok(UserInfo::from(&*user)))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<UserInfo>>>> {
    let users = state.users.list_users().await?;
    Ok(Json(ApiResponse::ok(
        users.iter().map(UserInfo::from).collect(),
    )))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(username): ApiPath<String>,
) -> Result<Json<ApiResponse<UserInfo>>> {
    let principal = state
        .users
        .load_principal(&username)
        .await?
        .ok_or_else(|| Error::not_found("user", &username))?;
    Ok(Json(ApiResponse::ok(UserInfo::from(&principal))))
}

/// Replace a user's roles; takes effect on their next request
pub async fn set_roles(
    State(state): State<AppState>,
    ApiPath(username): ApiPath<String>,
    ApiJson(req): ApiJson<RolesUpdate>,
) -> Result<Json<ApiResponse<UserInfo>>> {
    state.users.set_roles(&username, req.roles).await?;
    let principal = state
        .users
        .load_principal(&username)
        .await?
        .ok_or_else(|| Error::not_found("user", &username))?;
    tracing::info!("Roles of '{}' set to {:?}", username, principal.roles);
    Ok(Json(ApiResponse::ok(UserInfo::from(&principal))))
}

pub async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(username): ApiPath<String>,
) -> Result<StatusCode> {
    if user.username == username {
        return Err(Error::Conflict("cannot delete your own account".into()));
    }
    state.users.delete_user(&username).await?;
    tracing::info!("User '{}' deleted by '{}'", username, user.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_roles() -> Json<ApiResponse<Vec<Role>>> {
    Json(ApiResponse::ok(Role::ALL.to_vec()))
}
