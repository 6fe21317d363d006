pub mod common;
pub mod customer;
pub mod field_map;
pub mod responses;
