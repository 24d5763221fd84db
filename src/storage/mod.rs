mod client_store;
mod message_store;
mod migrations;
mod sqlite_store;
mod sync_log_store;
mod ticket_store;
mod util;

pub use sqlite_store::SqliteStore;
pub(crate) use util::now_unix_ms;
