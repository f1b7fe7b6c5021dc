//! stepwise: run step scripts against LLM providers.
//!
//! A step script is a line-oriented list of directives (`.llm`, `.user`,
//! `.exec`, ...) that builds a conversation, sends it to a provider, and lets
//! the model call local tools until it answers with text.
//!
//! ```no_run
//! use std::sync::Arc;
//! use stepwise::auth::{CredentialResolver, FileCredentialStore};
//! use stepwise::catalog::ModelCatalog;
//! use stepwise::engine::{Engine, EngineContext};
//! use stepwise::provider::ProviderRegistry;
//! use stepwise::script::Script;
//! use stepwise::tools::ToolRegistry;
//! use stepwise::util::StdinPrompter;
//!
//! # async fn example() -> stepwise::error::Result<()> {
//! let credentials = CredentialResolver::new(
//!     Arc::new(FileCredentialStore::new_default()),
//!     Arc::new(StdinPrompter),
//! );
//! let ctx = EngineContext::new(
//!     ModelCatalog::builtin(),
//!     ProviderRegistry::builtin(),
//!     Arc::new(ToolRegistry::new()),
//!     credentials,
//! )?;
//! let script = Script::parse("hello", ".llm \"model\": \"gpt-4o-mini\"\n.user Say hi\n")?;
//! let outcome = Engine::run(&ctx, &script).await?;
//! println!("{}", outcome.totals);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod provider;
pub mod script;
pub mod tools;
pub mod transcript;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
