// src/handlers/catalog.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedCompany,
    models::catalog::{
        Category, CategoryPayload, Product, ProductFilter, ProductPayload, StockAdjustmentPayload,
    },
};

// =============================================================================
//  CATEGORIAS
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "Catálogo",
    request_body = CategoryPayload,
    responses(
        (status = 201, description = "Categoria criada", body = Category),
        (status = 409, description = "Já existe uma categoria com esse nome")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_category(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Json(payload): Json<CategoryPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let category = app_state
        .catalog_service
        .create_category(company.id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "Catálogo",
    responses(
        (status = 200, description = "Categorias da empresa", body = Vec<Category>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_categories(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = app_state.catalog_service.list_categories(company.id).await?;
    Ok(Json(categories))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    tag = "Catálogo",
    request_body = CategoryPayload,
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 200, description = "Categoria atualizada", body = Category),
        (status = 404, description = "Categoria não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_category(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(category_id): Path<Uuid>,
    Json(payload): Json<CategoryPayload>,
) -> Result<Json<Category>, AppError> {
    payload.validate()?;

    let category = app_state
        .catalog_service
        .update_category(company.id, category_id, &payload)
        .await?;

    Ok(Json(category))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    tag = "Catálogo",
    params(("id" = Uuid, Path, description = "ID da categoria")),
    responses(
        (status = 204, description = "Categoria removida; os produtos ficam sem categoria"),
        (status = 404, description = "Categoria não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_category(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(category_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state
        .catalog_service
        .delete_category(company.id, category_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  PRODUTOS
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Catálogo",
    request_body = ProductPayload,
    responses(
        (status = 201, description = "Produto criado", body = Product),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Categoria não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Json(payload): Json<ProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let product = app_state
        .catalog_service
        .create_product(company.id, &payload)
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Catálogo",
    params(ProductFilter),
    responses(
        (status = 200, description = "Produtos da empresa", body = Vec<Product>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_products(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = app_state
        .catalog_service
        .list_products(company.id, &filter)
        .await?;
    Ok(Json(products))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "Catálogo",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto", body = Product),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_product(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = app_state
        .catalog_service
        .get_product(company.id, product_id)
        .await?;
    Ok(Json(product))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    tag = "Catálogo",
    request_body = ProductPayload,
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto atualizado", body = Product),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<ProductPayload>,
) -> Result<Json<Product>, AppError> {
    payload.validate()?;

    let product = app_state
        .catalog_service
        .update_product(company.id, product_id, &payload)
        .await?;

    Ok(Json(product))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    tag = "Catálogo",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 204, description = "Produto removido"),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_product(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state
        .catalog_service
        .delete_product(company.id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/products/{id}/stock",
    tag = "Catálogo",
    request_body = StockAdjustmentPayload,
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Estoque ajustado", body = Product),
        (status = 409, description = "O estoque ficaria negativo")
    ),
    security(("api_jwt" = []))
)]
pub async fn adjust_stock(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<StockAdjustmentPayload>,
) -> Result<Json<Product>, AppError> {
    if payload.delta == 0 {
        return Err(AppError::BadRequest("O ajuste de estoque não pode ser zero.".into()));
    }

    let product = app_state
        .catalog_service
        .adjust_stock(company.id, product_id, payload.delta)
        .await?;

    Ok(Json(product))
}
