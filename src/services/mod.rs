pub mod diagnostics;
pub mod insuite_service;
pub mod middleware;
pub mod signer;
