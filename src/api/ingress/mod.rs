pub mod openai_chat;
