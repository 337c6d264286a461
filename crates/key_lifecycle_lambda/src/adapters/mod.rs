pub mod account;
pub mod key_service;
