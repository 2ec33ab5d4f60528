// Core modules implementing the record model, id generation, storage, and errors.
pub mod error;
pub mod file_store;
pub mod object_id;
pub mod record;
pub mod store;
