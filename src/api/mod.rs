pub(crate) mod common;
pub mod health;
pub mod ingress;
pub mod models;

pub use ingress::openai_chat;
