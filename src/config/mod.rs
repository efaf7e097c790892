//! Configuration for launching the Claude CLI.
//!
//! - [`ClientConfig`] and [`ClientConfigBuilder`] collect every option and
//!   validate them once, at build time
//! - [`AuthMethod`] decides which credential, if any, reaches the subprocess
//! - [`Model`], [`PermissionMode`] and [`SessionId`] type the option values
//! - [`tools`] names the built-in tools
//!
//! A built config turns into a [`LaunchSpec`](crate::process::LaunchSpec)
//! with [`ClientConfig::launch_spec`].
//!
//! # Example
//!
//! ```ignore
//! use claude_subprocess::config::{AuthMethod, ClientConfig, Model};
//!
//! let config = ClientConfig::builder()
//!     .api_key_from_env()
//!     .fallback(AuthMethod::Inherit)
//!     .model(Model::Sonnet)
//!     .add_dir("../shared")
//!     .remove_env("HTTP_PROXY")
//!     .build()?;
//! ```

mod args;
pub mod auth;
pub mod builder;
pub mod options;

pub use auth::{AuthMethod, ENV_API_KEY, ENV_OAUTH_TOKEN};
pub use builder::{ClientConfig, ClientConfigBuilder, ENTRYPOINT, ENV_BASE_URL, ENV_ENTRYPOINT};
pub use options::{tools, Model, PermissionMode, SessionId};
