//! Repeatable headless-browser performance audits.
//!
//! `sitegauge` drives one headless Chromium session through N audit
//! iterations of M named run configurations. Each run can replace the global
//! request blocklist and script injection; each iteration persists a scored
//! report, raw artifacts, and (when available) a screenshot and trace. Two
//! companion binaries summarize and compare previously saved result trees.
//!
//! # Example
//!
//! ```no_run
//! use sitegauge::{aggregate, AuditRunner, Config};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_file("audit.json5")?;
//! let runner = AuditRunner::new(config);
//! let results = runner.run().await?;
//! print!("{}", aggregate::render(&results));
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Config files are JSON5 (comments and trailing commas allowed):
//!
//! ```json5
//! {
//!     outputDir: "results",
//!     iterations: 9,
//!     url: "https://example.com/",
//!     block: ["analytics", "doubleclick"],
//!     runs: [
//!         { name: "control", block: [] },
//!         { name: "blocked" },
//!     ],
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod inject;
pub mod intercept;
pub mod runner;
pub mod stats;
pub mod summarize;

// Re-export main types for convenience
pub use config::Config;
pub use runner::{AuditRunner, RunRecord, RunResults};
