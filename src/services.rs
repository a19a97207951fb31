pub mod assistant_tools;
pub mod auth;
pub mod auto_reply;
pub mod catalog_service;
pub mod conversation_service;
pub mod maintenance;
pub mod order_service;
pub mod page_service;
pub mod prompt;
