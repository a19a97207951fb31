pub mod auth;
pub mod catalog;
pub mod companies;
pub mod conversations;
pub mod gemini;
pub mod orders;
pub mod pages;
pub mod webhook;
