//! Entity model for Jenkins views, jobs and test reports.
//!
//! Everything here is plain data produced by the fetch/parse pipeline and
//! consumed read-only by the report renderer. View-level statistics are
//! computed on demand from the current job collection, never cached.

use std::fmt;

/// Outcome of a single test case as reported by Jenkins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
    /// Passed in an earlier build, fails now.
    Regression,
    /// Failed in an earlier build, passes now.
    Fixed,
    /// Any status token this tool does not recognize, kept verbatim.
    Other(String),
}

impl CaseStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "PASSED" => CaseStatus::Passed,
            "FAILED" => CaseStatus::Failed,
            "SKIPPED" => CaseStatus::Skipped,
            "REGRESSION" => CaseStatus::Regression,
            "FIXED" => CaseStatus::Fixed,
            other => CaseStatus::Other(other.to_string()),
        }
    }

    /// Whether a case with this status counts as failing. Only failing
    /// cases are kept in a [`TestReport`].
    pub fn is_failing(&self) -> bool {
        matches!(self, CaseStatus::Failed | CaseStatus::Regression)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CaseStatus::Passed => "PASSED",
            CaseStatus::Failed => "FAILED",
            CaseStatus::Skipped => "SKIPPED",
            CaseStatus::Regression => "REGRESSION",
            CaseStatus::Fixed => "FIXED",
            CaseStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failing test case retained from a report.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub class_name: String,
    pub method_name: String,
    pub status: CaseStatus,
    /// Number of consecutive builds this case has been failing.
    pub age: u32,
    pub error_details: Option<String>,
    pub error_stack_trace: Option<String>,
}

/// Per-job test summary plus the failing cases.
///
/// `test_cases` holds only cases whose status is FAILED or REGRESSION, in
/// document order.
#[derive(Debug, Clone, Default)]
pub struct TestReport {
    pub pass_count: u32,
    pub fail_count: u32,
    pub skip_count: u32,
    pub total_count: u32,
    pub test_cases: Vec<TestCase>,
}

/// Build-result classification from the view listing's `color` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobColor {
    /// Stable build.
    Blue,
    /// Build failed outright.
    Red,
    /// Unstable build (typically failing tests).
    Yellow,
    Aborted,
    Disabled,
    NotBuilt,
    Grey,
    Other(String),
}

impl JobColor {
    pub fn parse(raw: &str) -> Self {
        // A trailing "_anime" marks a build in progress; classification
        // uses the base color.
        let base = raw.strip_suffix("_anime").unwrap_or(raw);
        match base {
            "blue" => JobColor::Blue,
            "red" => JobColor::Red,
            "yellow" => JobColor::Yellow,
            "aborted" => JobColor::Aborted,
            "disabled" => JobColor::Disabled,
            "notbuilt" => JobColor::NotBuilt,
            "grey" => JobColor::Grey,
            other => JobColor::Other(other.to_string()),
        }
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, JobColor::Blue)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobColor::Blue => "blue",
            JobColor::Red => "red",
            JobColor::Yellow => "yellow",
            JobColor::Aborted => "aborted",
            JobColor::Disabled => "disabled",
            JobColor::NotBuilt => "notbuilt",
            JobColor::Grey => "grey",
            JobColor::Other(raw) => raw,
        }
    }
}

impl fmt::Display for JobColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One job of a view, with the parsed report of its last completed build.
///
/// `test_report` is `None` when the job has no test report or its report
/// could not be processed; counts then read as zero.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub url: String,
    pub color: JobColor,
    pub test_report: Option<TestReport>,
}

impl Job {
    /// Whether the build-result classification marks this job as good.
    pub fn is_good(&self) -> bool {
        self.color.is_stable()
    }

    pub fn has_report(&self) -> bool {
        self.test_report.is_some()
    }

    pub fn pass_count(&self) -> u32 {
        self.test_report.as_ref().map_or(0, |r| r.pass_count)
    }

    pub fn fail_count(&self) -> u32 {
        self.test_report.as_ref().map_or(0, |r| r.fail_count)
    }

    pub fn skip_count(&self) -> u32 {
        self.test_report.as_ref().map_or(0, |r| r.skip_count)
    }

    pub fn total_count(&self) -> u32 {
        self.test_report.as_ref().map_or(0, |r| r.total_count)
    }
}

/// A named view with its jobs, in listing order.
#[derive(Debug, Clone, Default)]
pub struct JenkinsView {
    pub name: String,
    pub url: String,
    /// Number of jobs the view listed, before any name filtering.
    pub jobs_total: u32,
    pub jobs: Vec<Job>,
}

impl JenkinsView {
    /// Failing tests summed over every job in the view.
    pub fn fail_count(&self) -> u64 {
        self.jobs.iter().map(|job| u64::from(job.fail_count())).sum()
    }

    /// Tests summed over every job in the view.
    pub fn tests_total(&self) -> u64 {
        self.jobs.iter().map(|job| u64::from(job.total_count())).sum()
    }

    /// Failing tests as a percentage of all tests; 0 when the view ran no
    /// tests at all.
    pub fn failure_rate(&self) -> f64 {
        let total = self.tests_total();
        if total != 0 {
            100.0 * self.fail_count() as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Jobs classified bad, in view order.
    pub fn failed_jobs(&self) -> Vec<&Job> {
        self.jobs.iter().filter(|job| !job.is_good()).collect()
    }

    /// Jobs classified good, in view order.
    pub fn passed_jobs(&self) -> Vec<&Job> {
        self.jobs.iter().filter(|job| job.is_good()).collect()
    }
}
