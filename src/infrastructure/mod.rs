pub mod biometric;
pub mod db;
pub mod encryption;
pub mod log_redact;
pub mod logging;
pub mod network_manager;
pub mod preferences;
pub mod rpc_client;
pub mod secure_enclave;
pub mod send_lock;
