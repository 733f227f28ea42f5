//! Record model and document codec shared by the `taskdesk` client.

pub mod codec;
pub mod document;
pub mod task;
