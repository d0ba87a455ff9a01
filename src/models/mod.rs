pub mod envelope;
pub mod pagination;
pub mod transaction;
pub mod user;

pub use envelope::{ApiResponse, ErrorResponse, Message, PaginatedResponse};
pub use pagination::{
    ListTransactionsParams, Page, PageMeta, SortField, SortOrder, TransactionQuery,
};
pub use transaction::{
    Category, CategoryTotal, CreateTransaction, Transaction, TransactionChanges,
    TransactionRecord, TransactionSummary, UpdateTransaction, ValidTransaction,
};
pub use user::{UpsertUser, User, UserProfile};
