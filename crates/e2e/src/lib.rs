//! Playrun E2E session core
//!
//! Orchestrates scenario-driven UI tests across parallel workers on one
//! machine:
//! - starts the browser and database engines once per process and shares them
//! - gives every worker its own artifact namespace
//! - gives every test a fresh browsing context that is always released
//! - finalizes screenshots and videos under a capture policy
//! - writes one result record per test and aggregates them into an HTML report
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Session                                                      │
//! │    ├── EngineRegistry      acquire(kind) / release_all()      │
//! │    ├── ArtifactLayout      reports/{videos,screenshots,logs}  │
//! │    └── Worker (master | gw0..gwN)                             │
//! │          └── run_test(TestCase)                               │
//! │                ├── TestResourceScope  open / close            │
//! │                ├── capture            screenshot, video       │
//! │                ├── summary            one-line failure        │
//! │                └── ResultRecord       <uuid>-result.json      │
//! ├───────────────────────────────────────────────────────────────┤
//! │  finish()  load_all -> summarize -> render_html               │
//! │            reports/shareable_report.html                      │
//! └───────────────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod capture;
pub mod engine;
pub mod error;
pub mod identity;
pub mod logging;
pub mod namespace;
pub mod record;
pub mod registry;
pub mod report;
pub mod scope;
pub mod session;
pub mod summary;

pub use capture::{ArtifactRecord, Screenshot, VideoOutcome};
pub use engine::{BrowserContext, BrowserEngine, ContextOptions, DatabaseBridge, Engine, Page, Row};
pub use error::{E2eError, E2eResult};
pub use identity::{derive_test_id, TestIdentity};
pub use namespace::{ArtifactLayout, WorkerContext};
pub use record::ResultRecord;
pub use registry::{AnyEngine, EngineHandle, EngineRegistry};
pub use report::{ReportModel, ReportRow};
pub use scope::{ScopeOptions, TestResourceScope};
pub use session::{Session, TestCase, TestContext, TestOutcome, Worker};
