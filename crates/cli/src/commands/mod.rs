pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod events;
pub mod runtime;
pub mod tools;
