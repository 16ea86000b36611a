//! jenkins-reporter - test failure reports for Jenkins views
//!
//! A library for turning a Jenkins view into an HTML failure report:
//! - View listings and per-job test reports fetched over the remote API
//! - Streaming parser for both report schema variants (plain and matrix jobs)
//! - View-level aggregation of job and test counts
//! - Dark-theme HTML report of failing jobs and their failing cases

pub mod config;
pub mod jenkins;
pub mod model;
pub mod parser;
pub mod report;

pub use model::{CaseStatus, JenkinsView, Job, JobColor, TestCase, TestReport};
pub use parser::{parse_report, parse_report_string, ParseError};
