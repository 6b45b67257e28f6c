//! Core state machine, credential formats and refresh logic for the OAuth
//! authorization-code broker. The `actix-web` adapter lives in `broker-web`.
#![warn(missing_debug_implementations, rust_2018_idioms)]

pub mod authid;
pub mod cache;
pub mod catalog;
pub mod cli_token;
pub mod error;
pub mod flow;
pub mod http_client;
pub mod ids;
pub mod password;
pub mod refresh;
pub mod state;
pub mod store;

pub use authid::AuthId;
pub use catalog::{ServiceCatalog, ServiceConfig};
pub use error::{Error, Result};
pub use flow::{
    Broker, CliTokenLoginParams, CompleteLoginOutcome, CompleteLoginParams, FetchOutcome,
    LoginRedirect, RefreshOutcome, RefreshReply, RevokeOutcome,
};
pub use http_client::ClientPool;
pub use store::EncryptedStore;
