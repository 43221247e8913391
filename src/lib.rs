//! Client-side session engine for federated eduVPN-style portals — OAuth 2.1 + PKCE,
//! endpoint discovery, and protocol negotiation in one crate.
//!
//! The crate owns the per-server OAuth token lifecycle, performs authorized HTTP
//! request/response with transparent refresh and re-authorization, negotiates the VPN
//! configuration over content-type-aware HTTP, and caches well-known endpoint documents
//! across concurrent callers. It deliberately does not run the VPN tunnel, persist
//! tokens to disk, or discover servers from a catalog. See [`session::Session`] for the
//! caller-facing surface.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod domain;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod negotiate;
pub mod oauth;
pub mod obs;
pub mod profile;
pub mod session;

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use url;
#[cfg(feature = "reqwest")] pub use reqwest;
#[cfg(all(test, feature = "reqwest"))] use httpmock as _;
#[cfg(test)] use color_eyre as _;
