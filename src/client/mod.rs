//! Client side of the API: request gateway, keyed query cache, optimistic
//! delete and the accumulating list feed.

pub mod api;
pub mod cache;
pub mod feed;
pub mod gateway;
pub mod mutations;
pub mod notify;

pub use api::TransactionsClient;
pub use cache::{CachedValue, QueryCache, QueryKey};
pub use feed::TransactionFeed;
pub use gateway::{GatewayError, RequestGateway};
pub use notify::{Notice, NoticeLevel, Notifier, SessionHandler, TokenProvider};
