pub mod dedup;
pub mod identity;
pub mod pipeline;
pub mod sync_state;
pub mod tickets;
