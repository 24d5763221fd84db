pub(crate) mod adapter_common;
pub mod desk;
pub mod http;
pub mod whatsapp;
