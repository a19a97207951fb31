// src/models/maintenance.rs

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrphanConversation {
    pub conversation_id: Uuid,
    pub company_id: Uuid,
    pub page_id: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ForeignCategoryProduct {
    pub product_id: Uuid,
    pub company_id: Uuid,
    pub category_id: Uuid,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRef {
    pub company_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PageRef {
    pub id: Uuid,
    pub company_id: Uuid,
    pub page_id: String,
}

/// Inconsistências encontradas na base. Nada aqui altera dados.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub orphan_conversations: Vec<OrphanConversation>,
    pub mismatched_messages: i64,
    pub foreign_category_products: Vec<ForeignCategoryProduct>,
    pub companies_without_gemini: Vec<CompanyRef>,
    pub active_pages_of_suspended: Vec<PageRef>,
}

impl MaintenanceReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_conversations.is_empty()
            && self.mismatched_messages == 0
            && self.foreign_category_products.is_empty()
            && self.companies_without_gemini.is_empty()
            && self.active_pages_of_suspended.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairSummary {
    pub applied: bool,
    pub messages_realigned: u64,
    pub categories_detached: u64,
    pub pages_deactivated: u64,
}

impl RepairSummary {
    pub fn total(&self) -> u64 {
        self.messages_realigned + self.categories_detached + self.pages_deactivated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_clean() {
        assert!(MaintenanceReport::default().is_clean());

        let report = MaintenanceReport { mismatched_messages: 2, ..Default::default() };
        assert!(!report.is_clean());
    }
}
