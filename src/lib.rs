//! TwinMaker access layer
//!
//! Catalog queries and credential brokering for the IoT TwinMaker dashboard
//! backend. Queries go through the [`QueryExecutor`], which follows
//! continuation tokens and hands back one [`AggregatedResult`] per list
//! operation. Dashboard credentials come from the [`SessionBroker`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use twinmaker_access::{DataSourceSettings, RequestContext, TwinMakerApi, TwinMakerClient, TwinMakerQuery};
//!
//! # async fn run() -> twinmaker_access::Result<()> {
//! let client = TwinMakerClient::new(DataSourceSettings::from_env())?;
//! let ctx = RequestContext::background();
//! let entities = client
//!     .list_entities(&ctx, &TwinMakerQuery::for_workspace("CookieFactory"))
//!     .await?;
//! println!("{} entities", entities.len());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Cancellation and deadlines for remote calls
pub mod context;

// Request and wire types
pub mod models;
pub mod query;

// Settings and ambient credentials
pub mod config;
pub mod credentials;

// Core components
pub mod broker;
pub mod executor;
pub mod policy;

// Remote services, sessions and the client surface
pub mod facade;

pub use broker::{CredentialStrategy, SessionBroker};
pub use config::{AuthType, DataSourceSettings};
pub use context::{CancelHandle, RequestContext};
pub use error::{Result, TwinMakerError};
pub use executor::QueryExecutor;
pub use facade::{CatalogService, TokenService, TwinMakerApi, TwinMakerClient};
pub use models::{AggregatedResult, Page};
pub use policy::{PolicySynthesizer, WorkspaceReadPolicy};
pub use query::TwinMakerQuery;
