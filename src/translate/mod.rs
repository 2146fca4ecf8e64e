//! Translation service client.
//!
//! Formulas and connection records are translated by an external HTTP
//! service. The client probes the service once, then issues one POST per
//! formula with a bounded retry loop.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  TranslationClient<T>                     │
//! │  - Availability cached per instance (reprobe on demand)   │
//! │  - RetryPolicy: bounded retries, exponential backoff      │
//! │  - Ordered entity unescaping of results                   │
//! └───────────────────────────────────────────────────────────┘
//!                              │ Transport (GET / POST JSON)
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │       Translation service: /health, /convert, M code      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bimigrate::translate::{ClientOptions, HttpTransport, TranslationClient};
//!
//! let transport = HttpTransport::new("http://localhost:8000")?;
//! let client = TranslationClient::connect(transport, ClientOptions::default()).await;
//! let result = client.translate("SUM([Sales])", "Orders", None).await;
//! ```

mod client;
mod error;
pub mod protocol;
mod transport;

pub use client::{unescape_entities, Availability, ClientOptions, RetryPolicy, TranslationClient};
pub use error::{TranslateError, TranslateResult};
pub use protocol::{TranslationRequest, TranslationResult};
pub use transport::{HttpResponse, HttpTransport, Transport, REQUEST_ID_HEADER};
