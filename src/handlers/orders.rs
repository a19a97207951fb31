// src/handlers/orders.rs

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
    models::order::{
        CreateOrderPayload, NewOrder, Order, OrderDetail, OrderFilter, UpdateOrderStatusPayload,
    },
};

#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "Pedidos",
    params(OrderFilter),
    responses(
        (status = 200, description = "Pedidos da empresa, mais recentes primeiro", body = Vec<Order>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_orders(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = app_state
        .order_service
        .list_orders(company.id, filter.status)
        .await?;
    Ok(Json(orders))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "Pedidos",
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Pedido com itens", body = OrderDetail),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderDetail>, AppError> {
    let order = app_state.order_service.get_order(company.id, order_id).await?;
    Ok(Json(order))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "Pedidos",
    request_body = CreateOrderPayload,
    responses(
        (status = 201, description = "Pedido criado e estoque baixado", body = OrderDetail),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Produto não encontrado"),
        (status = 409, description = "Estoque insuficiente")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_order(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Json(payload): Json<CreateOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let order = app_state
        .order_service
        .create_order(company.id, NewOrder::from_payload(payload))
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    patch,
    path = "/api/orders/{id}/status",
    tag = "Pedidos",
    request_body = UpdateOrderStatusPayload,
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Status atualizado", body = Order),
        (status = 409, description = "Transição de status inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_order_status(
    State(app_state): State<AppState>,
    AuthenticatedCompany(company): AuthenticatedCompany,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusPayload>,
) -> Result<Json<Order>, AppError> {
    let order = app_state
        .order_service
        .update_status(company.id, order_id, payload.status)
        .await?;
    Ok(Json(order))
}
