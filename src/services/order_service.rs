// src/services/order_service.rs

use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CatalogRepository, OrderRepository},
    models::{
        catalog::Product,
        order::{NewOrder, Order, OrderDetail, OrderLinePayload, OrderStatus},
    },
};

/// Linha já precificada: nome e preço congelados no momento do pedido.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Junta linhas repetidas do mesmo produto, mantendo a ordem da primeira aparição.
pub fn merge_lines(lines: &[OrderLinePayload]) -> Result<Vec<OrderLinePayload>, AppError> {
    let mut merged: Vec<OrderLinePayload> = Vec::with_capacity(lines.len());
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for line in lines {
        if line.quantity < 1 {
            return Err(AppError::BadRequest("A quantidade deve ser pelo menos 1.".into()));
        }
        match index.get(&line.product_id) {
            Some(&i) => {
                merged[i].quantity = merged[i]
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| AppError::BadRequest("Quantidade muito grande.".into()))?;
            }
            None => {
                index.insert(line.product_id, merged.len());
                merged.push(line.clone());
            }
        }
    }
    Ok(merged)
}

/// Precifica as linhas contra os produtos travados.
/// Produto ausente ou inativo é 404; estoque menor que a quantidade é 409.
pub fn price_order_lines(
    products: &[Product],
    lines: &[OrderLinePayload],
) -> Result<Vec<PricedLine>, AppError> {
    if lines.is_empty() {
        return Err(AppError::BadRequest("O pedido precisa de pelo menos um item.".into()));
    }

    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();

    merge_lines(lines)?
        .into_iter()
        .map(|line| {
            let product = by_id
                .get(&line.product_id)
                .filter(|p| p.is_active)
                .ok_or(AppError::NotFound("Produto"))?;

            if product.stock_quantity < line.quantity {
                return Err(AppError::InsufficientStock { product: product.name.clone() });
            }

            Ok(PricedLine {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: line.quantity,
                unit_price: product.effective_price(),
            })
        })
        .collect()
}

pub fn order_total(lines: &[PricedLine]) -> Decimal {
    lines.iter().map(PricedLine::subtotal).sum()
}

#[derive(Clone)]
pub struct OrderService {
    order_repo: OrderRepository,
    catalog_repo: CatalogRepository,
    pool: PgPool,
}

impl OrderService {
    pub fn new(order_repo: OrderRepository, catalog_repo: CatalogRepository, pool: PgPool) -> Self {
        Self { order_repo, catalog_repo, pool }
    }

    pub async fn list_orders(
        &self,
        company_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, AppError> {
        self.order_repo.list(company_id, status).await
    }

    pub async fn get_order(&self, company_id: Uuid, order_id: Uuid) -> Result<OrderDetail, AppError> {
        let header = self.order_repo.get(&self.pool, company_id, order_id).await?;
        let items = self.order_repo.items(&self.pool, order_id).await?;
        Ok(OrderDetail { header, items })
    }

    /// Único caminho de criação de pedido (API e assistente).
    pub async fn create_order(&self, company_id: Uuid, order: NewOrder) -> Result<OrderDetail, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Trava os produtos envolvidos (ordenados por id, evita deadlock entre pedidos)
        let mut product_ids: Vec<Uuid> = order.items.iter().map(|l| l.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        let products = self
            .catalog_repo
            .lock_products(&mut *tx, company_id, &product_ids)
            .await?;

        // 2. Preço e estoque
        let lines = price_order_lines(&products, &order.items)?;
        let total = order_total(&lines);

        // 3. Cabeçalho, itens e baixa no estoque, tudo na mesma transação
        let header = self
            .order_repo
            .insert_order(&mut *tx, company_id, &order, total)
            .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            self.catalog_repo
                .adjust_stock(&mut *tx, company_id, line.product_id, -line.quantity)
                .await?
                .ok_or_else(|| AppError::InsufficientStock { product: line.product_name.clone() })?;

            let item = self
                .order_repo
                .insert_item(
                    &mut *tx,
                    header.id,
                    line.product_id,
                    &line.product_name,
                    line.quantity,
                    line.unit_price,
                )
                .await?;
            items.push(item);
        }

        tx.commit().await?;

        tracing::info!(
            "🛒 Pedido #{} criado para a empresa {} (total {}, origem {:?})",
            header.order_number,
            company_id,
            header.total_amount,
            header.source
        );

        Ok(OrderDetail { header, items })
    }

    /// Troca o status seguindo a máquina de estados. Cancelar devolve o estoque.
    pub async fn update_status(
        &self,
        company_id: Uuid,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .order_repo
            .get_for_update(&mut *tx, company_id, order_id)
            .await?;

        if !current.status.can_transition_to(next) {
            return Err(AppError::InvalidOrderTransition {
                from: current.status.to_string(),
                to: next.to_string(),
            });
        }

        if next == OrderStatus::Cancelled {
            let items = self.order_repo.items(&mut *tx, order_id).await?;
            for item in items {
                // Produto apagado depois do pedido: não há estoque a devolver
                let Some(product_id) = item.product_id else { continue };
                self.catalog_repo
                    .adjust_stock(&mut *tx, company_id, product_id, item.quantity)
                    .await?;
            }
        }

        let updated = self.order_repo.set_status(&mut *tx, order_id, next).await?;
        tx.commit().await?;

        tracing::info!(
            "🔁 Pedido #{}: {} -> {}",
            updated.order_number,
            current.status,
            updated.status
        );
        Ok(updated)
    }
}
