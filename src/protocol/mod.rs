pub mod error_shapes;
pub mod openai_chat;
pub mod reasoning;
pub mod upstream;
