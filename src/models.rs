pub mod assistant;
pub mod catalog;
pub mod company;
pub mod conversation;
pub mod facebook;
pub mod gemini;
pub mod maintenance;
pub mod order;
