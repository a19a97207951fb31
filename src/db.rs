pub mod assistant_store;
pub mod catalog_repo;
pub mod company_repo;
pub mod conversation_repo;
pub mod gemini_repo;
pub mod maintenance_repo;
pub mod order_repo;
pub mod outbox_queue;
pub mod page_repo;

pub use assistant_store::AssistantStoreImpl;
pub use catalog_repo::CatalogRepository;
pub use company_repo::CompanyRepository;
pub use conversation_repo::ConversationRepository;
pub use gemini_repo::GeminiSettingsRepository;
pub use maintenance_repo::MaintenanceRepository;
pub use order_repo::OrderRepository;
pub use outbox_queue::PgOutboxQueue;
pub use page_repo::PageRepository;
