//! Signs customer records and forwards them to the Langchao inSuite
//! `mdm_customer/create` gateway.

pub mod api;
pub mod config;
pub mod models;
pub mod services;
