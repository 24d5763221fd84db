pub mod application;
pub mod domain;
pub mod ingest;
pub mod interfaces;
pub mod mapping;
pub mod security;
pub mod storage;
