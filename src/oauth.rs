//! OAuth 2.1 + PKCE engine (C4): authorization URL construction, the loopback
//! callback receiver, authorization-code and refresh-token exchange, and the
//! thread-safe, refresh-on-expiry token cell.

pub mod callbacks;
pub mod engine;
mod loopback;
pub mod pkce;
pub mod token;

pub use callbacks::Callbacks;
pub use engine::{Engine, RedirectMode};
pub use token::{RefreshedToken, Token, TokenCell};
