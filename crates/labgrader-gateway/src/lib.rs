//! Labgrader-Gateway: HTTP adapters for the grading collaborators
//!
//! Implements the `labgrader-state` traits against real services.
//!
//! ## Layer 1 - Adapters
//!
//! Focus: faithful status mapping and no surprises on the wire.
//!
//! - `GithubClient`: [`SourceHost`](labgrader_state::SourceHost) over the GitHub REST API
//! - `SheetsClient`: [`Spreadsheet`](labgrader_state::Spreadsheet) over Google Sheets v4

pub mod github;
mod http;
pub mod sheets;

pub use github::{GithubClient, GithubConfig};
pub use sheets::{SheetsClient, SheetsConfig};
