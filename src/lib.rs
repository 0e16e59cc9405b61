//! # Wallet Tracker
//!
//! Live-synchronized personal finance data: accounts and transaction
//! records stored per user in a document database, mirrored into in-memory
//! lists that refresh whenever the store changes.
//!
//! ## Core Concepts
//!
//! - **Document store**: Per-user collections of JSON documents with
//!   snapshot listeners ([`DocumentDb`], [`MemoryDb`])
//! - **Repository**: Typed, user-scoped add/update/delete and lazy snapshot
//!   streams ([`Repository`], [`Snapshots`])
//! - **Wallet**: Two live lists plus fire-and-forget mutations whose
//!   failures land in a single notification slot ([`Wallet`])
//! - **Identity**: Pluggable sign-in providers behind [`AuthClient`]
//!
//! ## Example
//!
//! ```ignore
//! use wallet_tracker::{AuthClient, MemoryDb, MemoryIdentity, Session, WalletConfig};
//!
//! let auth = Arc::new(AuthClient::new(MemoryIdentity::new()));
//! auth.sign_up_with_email("ana@example.com", "secret1", "secret1");
//!
//! let db = Arc::new(MemoryDb::in_memory());
//! let session = Session::start(auth, db, WalletConfig::default())?;
//!
//! let account = AccountDraft { name: "Cash".into(), last4_digits: "0000".into(),
//!     amount: "100".into(), ..Default::default() }.build()?;
//! session.wallet().add_account(account);
//! ```

pub mod auth;
pub mod color;
pub mod currency;
pub mod docstore;
pub mod error;
pub mod filter;
pub mod forms;
pub mod repository;
pub mod session;
pub mod types;
pub mod wallet;

// Re-exports
pub use auth::{AuthClient, AuthResult, AuthState, Credential, IdentityProvider, MemoryIdentity, SignInResult};
pub use color::{Color, PackedColor};
pub use currency::{totals_by_currency, Currency};
pub use docstore::{CollectionPath, DbConfig, DocumentDb, Fault, MemoryDb};
pub use error::{Result, WalletError};
pub use filter::RecordFilter;
pub use forms::{AccountDraft, RecordDraft};
pub use repository::{Collection, Document, Repository, Snapshots};
pub use session::Session;
pub use types::*;
pub use wallet::{Wallet, WalletConfig, WalletEvent};
