// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

// --- 1. Categorias ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    #[schema(example = "Camisetas")]
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- 2. Produtos ---
// Uma única forma de produto (antes existiam products, products_temp e ecommerce_products).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    pub category_id: Option<Uuid>,
    #[schema(example = "Camiseta Básica Preta")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "59.90")]
    pub price: Decimal,
    #[schema(example = "49.90")]
    pub sale_price: Option<Decimal>,
    #[schema(example = 12)]
    pub stock_quantity: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Só vem preenchido nas consultas que juntam a categoria (o catálogo do assistente)
    #[sqlx(default)]
    #[schema(example = "Camisetas")]
    pub category_name: Option<String>,
}

impl Product {
    /// Preço cobrado de fato: a promoção, quando existe.
    pub fn effective_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }

    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

fn validate_stock(val: i32) -> Result<(), ValidationError> {
    if val < 0 {
        let mut err = ValidationError::new("range");
        err.message = Some("O estoque não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

// Nome só com espaços conta como vazio.
fn validate_not_blank(val: &str) -> Result<(), ValidationError> {
    if val.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("O nome é obrigatório.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPayload {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_sale_price"))]
pub struct ProductPayload {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,

    #[validate(custom(function = "validate_not_negative"))]
    pub price: Decimal,

    pub sale_price: Option<Decimal>,

    #[validate(custom(function = "validate_stock"))]
    #[serde(default)]
    pub stock_quantity: i32,

    #[validate(url(message = "A URL da imagem é inválida."))]
    pub image_url: Option<String>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

// Regra: o preço promocional não pode ser negativo nem maior que o preço cheio.
fn validate_sale_price(payload: &ProductPayload) -> Result<(), ValidationError> {
    if let Some(sale) = payload.sale_price {
        if sale.is_sign_negative() || sale > payload.price {
            let mut err = ValidationError::new("salePrice");
            err.message = Some("O preço promocional deve estar entre 0 e o preço.".into());
            return Err(err);
        }
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    /// Busca por nome (ILIKE)
    pub search: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustmentPayload {
    /// Positivo para entrada, negativo para saída
    #[schema(example = -2)]
    pub delta: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn payload(price: Decimal, sale: Option<Decimal>) -> ProductPayload {
        ProductPayload {
            name: "Camiseta".into(),
            description: None,
            category_id: None,
            price,
            sale_price: sale,
            stock_quantity: 3,
            image_url: None,
            is_active: true,
        }
    }

    #[test]
    fn sale_price_must_not_exceed_price() {
        assert!(payload(dec("50.00"), Some(dec("40.00"))).validate().is_ok());
        assert!(payload(dec("50.00"), None).validate().is_ok());
        assert!(payload(dec("50.00"), Some(dec("60.00"))).validate().is_err());
        assert!(payload(dec("50.00"), Some(dec("-1"))).validate().is_err());
    }

    #[test]
    fn negative_values_are_rejected() {
        assert!(payload(dec("-5"), None).validate().is_err());
        let mut p = payload(dec("10"), None);
        p.stock_quantity = -1;
        assert!(p.validate().is_err());
    }

    #[test]
    fn stock_check_takes_the_quantity_by_value() {
        assert!(validate_stock(0).is_ok());
        assert!(validate_stock(7).is_ok());
        assert_eq!(validate_stock(-3).unwrap_err().code, "range");
    }

    #[test]
    fn blank_names_are_rejected() {
        let category = |name: &str| CategoryPayload { name: name.into(), description: None };
        assert!(category("Camisetas").validate().is_ok());
        assert!(category("").validate().is_err());

        let errors = category("   ").validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));

        let mut product = payload(dec("10"), None);
        product.name = " \t ".into();
        assert!(product.validate().is_err());
    }
}
