pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod fingerprint;
pub mod pipeline;
pub mod sarif;
pub mod status;
pub mod store;
pub mod upload;
pub mod util;
pub mod validate;
