//! Application bootstrap and lifecycle management.
//!
//! [`GeoVisitApp`] builds every component from an [`AppConfig`], the stores,
//! and a transport, then runs the ingestion workers until shutdown.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         GeoVisitApp                              │
//! │                                                                  │
//! │  Transport ──► IngestionLoop × N ──► EventProcessor              │
//! │                                        │                         │
//! │                     ZoneCatalog ◄──────┤                         │
//! │                                        ▼                         │
//! │  TrackingService ─────────────────► VisitTracker ──► VisitStore  │
//! │    │                                                             │
//! │    ├── QueryCache (+ expiry sweeper)                             │
//! │    └── Publisher (optional) ──► Transport                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use geovisit::app::{AppConfig, GeoVisitApp};
//!
//! let app = GeoVisitApp::start(AppConfig::from_config_file(&file), stores, queue).await?;
//! let service = app.service();
//! app.shutdown().await?;
//! ```

mod bootstrap;
mod config;
mod error;

pub use bootstrap::GeoVisitApp;
pub use config::AppConfig;
pub use error::AppError;
