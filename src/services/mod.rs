pub mod pagination;
pub mod summary;
pub mod transaction_service;
pub mod user_service;
