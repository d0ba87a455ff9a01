pub mod health;
pub mod transactions;
pub mod users;
