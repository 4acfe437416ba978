pub(crate) mod common;
pub mod health;
pub mod ingress;

pub use ingress::openai_chat;
