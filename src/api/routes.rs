//! Catalog and order route handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath};
use super::server::AppState;
use crate::auth::CurrentUser;
use crate::catalog::{
    Cinema, Entity, Hall, Movie, NewOrder, NewReview, Order, OrderDetails, Program, Projection, Review,
};
use crate::error::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// Health check

pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok("healthy"))
}

// Generic entity routes

/// `GET path`, `POST path` and `GET|PUT|DELETE path/{id}` for one entity type
pub fn crud<T: Entity>(path: &str) -> Router<AppState> {
    Router::new()
        .route(path, get(list::<T>).post(create::<T>))
        .route(
            &format!("{}/{{id}}", path),
            get(find::<T>).put(update::<T>).delete(remove::<T>),
        )
}

pub async fn list<T: Entity>(State(state): State<AppState>) -> Json<ApiResponse<Vec<T>>> {
    Json(ApiResponse::ok(T::repository(&state.catalog).find_all().await))
}

pub async fn find<T: Entity>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<T>>> {
    let entity = state.catalog.get::<T>(id).await?;
    Ok(Json(ApiResponse::ok(entity)))
}

pub async fn create<T: Entity>(
    State(state): State<AppState>,
    ApiJson(entity): ApiJson<T>,
) -> Result<(StatusCode, Json<ApiResponse<T>>)> {
    let created = state.catalog.create(entity).await?;
    tracing::info!("Created {} {}", T::KIND, created.id());
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

pub async fn update<T: Entity>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(entity): ApiJson<T>,
) -> Result<Json<ApiResponse<T>>> {
    let updated = state.catalog.update(id, entity).await?;
    tracing::info!("Updated {} {}", T::KIND, id);
    Ok(Json(ApiResponse::ok(updated)))
}

pub async fn remove<T: Entity>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<T>>> {
    let removed = state.catalog.delete::<T>(id).await?;
    tracing::info!("Deleted {} {}", T::KIND, id);
    Ok(Json(ApiResponse::ok(removed)))
}

// Nested reads

pub async fn cinema_halls(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Vec<Hall>>>> {
    state.catalog.get::<Cinema>(id).await?;
    let halls = state.catalog.halls.find_by(|h| h.cinema_id == id).await;
    Ok(Json(ApiResponse::ok(halls)))
}

pub async fn cinema_programs(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Vec<Program>>>> {
    state.catalog.get::<Cinema>(id).await?;
    let programs = state.catalog.programs.find_by(|p| p.cinema_id == id).await;
    Ok(Json(ApiResponse::ok(programs)))
}

pub async fn movie_projections(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Vec<Projection>>>> {
    state.catalog.get::<Movie>(id).await?;
    let mut projections = state.catalog.projections.find_by(|p| p.movie_id == id).await;
    projections.sort_by_key(|p| p.starts_at);
    Ok(Json(ApiResponse::ok(projections)))
}

pub async fn movie_reviews(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Vec<Review>>>> {
    state.catalog.get::<Movie>(id).await?;
    let reviews = state.catalog.reviews.find_by(|r| r.movie_id == id).await;
    Ok(Json(ApiResponse::ok(reviews)))
}

// Reviews

pub async fn create_review(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<NewReview>,
) -> Result<(StatusCode, Json<ApiResponse<Review>>)> {
    let review = Review {
        id: Uuid::nil(),
        movie_id: req.movie_id,
        username: user.username.clone(),
        rating: req.rating,
        comment: req.comment,
        created_at: Utc::now(),
    };
    let review = state.catalog.create(review).await?;
    tracing::info!("Review {} posted by '{}'", review.id, user.username);
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(review))))
}

// Orders

pub async fn place_order(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<NewOrder>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetails>>)> {
    let details = state.catalog.place_order(&user.username, req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(details))))
}

pub async fn list_orders(State(state): State<AppState>) -> Json<ApiResponse<Vec<Order>>> {
    let mut orders = state.catalog.orders.find_all().await;
    orders.sort_by_key(|o| o.created_at);
    Json(ApiResponse::ok(orders))
}

pub async fn my_orders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<ApiResponse<Vec<Order>>> {
    let mut orders = state.catalog.orders_of(&user.username).await;
    orders.sort_by_key(|o| o.created_at);
    Json(ApiResponse::ok(orders))
}

/// Owners see their own orders; admins see every order
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<OrderDetails>>> {
    let details = state.catalog.order_details(id).await?;
    if details.order.username != user.username && !user.is_admin() {
        return Err(Error::Forbidden);
    }
    Ok(Json(ApiResponse::ok(details)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<Order>>> {
    let order = state.catalog.cancel_order(id).await?;
    tracing::info!("Order {} cancelled", order.id);
    Ok(Json(ApiResponse::ok(order)))
}
