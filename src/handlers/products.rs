use crate::{
    auth::AuthUser,
    entities::product,
    errors::ServiceError,
    handlers::common::{
        ensure_admin, DataResponse, PaginatedResponse, DEFAULT_PAGE, DEFAULT_PAGE_SIZE,
    },
    services::catalog::{
        CreateProductRequest, ProductFilter, ProductFormOption, UpdateProductRequest,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListProductsParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub category: Option<String>,
}

/// Create a product (admin only).
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = product::Model),
        (status = 400, description = "Validation failed", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<DataResponse<product::Model>>), ServiceError> {
    ensure_admin(&auth)?;

    let product = state.catalog.create_product(request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(product))))
}

/// Fetch a product by id.
#[utoipa::path(
    get,
    path = "/api/v1/products/:id",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = product::Model),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<product::Model>>, ServiceError> {
    let product = state.catalog.get_product(id).await?;
    Ok(Json(DataResponse::new(product)))
}

async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<DataResponse<product::Model>>, ServiceError> {
    ensure_admin(&auth)?;

    let product = state.catalog.update_product(id, request).await?;
    Ok(Json(DataResponse::new(product)))
}

async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DataResponse<&'static str>>, ServiceError> {
    ensure_admin(&auth)?;

    state.catalog.delete_product(id).await?;
    Ok(Json(DataResponse::new("product deleted successfully")))
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListProductsParams>,
) -> Result<Json<PaginatedResponse<product::Model>>, ServiceError> {
    let filter = ProductFilter {
        page: params.page.unwrap_or(DEFAULT_PAGE),
        page_size: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        search: params.search,
        category: params.category,
    };

    let (products, total) = state.catalog.list_products(&filter).await?;
    Ok(Json(PaginatedResponse::new(
        products,
        filter.page,
        filter.page_size,
        total,
    )))
}

async fn product_form_options(
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Vec<ProductFormOption>>>, ServiceError> {
    let options = state.catalog.form_options().await?;
    Ok(Json(DataResponse::new(options)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products", get(list_products))
        .route("/products/form", get(product_form_options))
        .route("/products/:id", get(get_product))
        .route("/products/:id", put(update_product))
        .route("/products/:id", delete(delete_product))
}
