//! Google Chat integration - Pub/Sub push bot interface
//!
//! This crate provides the chat-facing core for pushbot:
//! - **Envelope decoding** (`envelope`) - Pub/Sub push wrapper → chat event
//! - **Slash commands** (`commands`) - classification and dispatch
//! - **Authorization flow** (`oauth`) - consent URL + code exchange
//! - **Outbound messages** (`sender`) - Chat API message posting
//! - **Credential lookup** (`credentials`) - stored-token boundary (stub)
//!
//! # Architecture
//!
//! ```text
//! Pub/Sub push → decode() → route() → CommandRouter
//!                                        ├─ AuthFlow (consent URL / token exchange)
//!                                        └─ MessageSender (Chat API)
//! ```
//!
//! Every inbound envelope is processed independently; the only shared
//! state is the pending-authorization nonce store inside [`AuthFlow`].

pub mod commands;
pub mod credentials;
pub mod envelope;
pub mod oauth;
pub mod sender;

pub use commands::{route, CommandRouter, RoutingDecision};
pub use credentials::{CredentialStore, StubCredentialStore};
pub use envelope::{decode, ChatEvent, DecodedPush, EnvelopeError, PushEnvelope};
pub use oauth::{AuthFlow, AuthFlowError, AuthorizedTokens, TokenExchangeError, TokenResponse};
pub use sender::{ChatApiSender, MessageSender, SendError, SenderInitError, UnavailableSender};
