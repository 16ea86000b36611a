//! Jenkins remote API client.
//!
//! Fetches a view's job listing and, job by job, the test report of each
//! job's last completed build, assembling a populated [`JenkinsView`].

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::StatusCode;

use crate::config::Config;
use crate::model::{JenkinsView, Job, JobColor, TestReport};
use crate::parser;

pub struct JenkinsClient {
    http: reqwest::Client,
    base_url: String,
    view_prefix: String,
    username: Option<String>,
    api_token: Option<String>,
    job_prefix: Option<String>,
}

impl JenkinsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if config.jenkins.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            view_prefix: config.view_prefix(),
            username: config.jenkins.username.clone(),
            api_token: config.jenkins.api_token.clone(),
            job_prefix: config.report.job_prefix.clone(),
        })
    }

    /// Fetch the view listing and every job's test report.
    pub async fn view_data(&self, view_path: &str) -> Result<JenkinsView> {
        let view_url = build_view_url(&self.base_url, &self.view_prefix, view_path);
        println!("\n{} Fetching view {}", "→".blue(), view_url.dimmed());

        let api_url = format!("{view_url}/api/xml");
        let response = self.get(&api_url).await?;
        if !response.status().is_success() {
            bail!("Jenkins returned {} for {}", response.status(), api_url);
        }
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response from {api_url}"))?;

        let listing = parse_view_listing(body.as_ref())
            .with_context(|| format!("Failed to decode view listing from {api_url}"))?;

        let (mut view, entries) =
            prepare_view(view_path, &view_url, listing, self.job_prefix.as_deref());
        for entry in entries {
            let job = self.fetch_job(entry).await;
            view.jobs.push(job);
        }

        Ok(view)
    }

    /// Fetch one job's report and fold fetch or parse problems into a job
    /// without test data, so a single broken job never sinks the view.
    async fn fetch_job(&self, entry: JobEntry) -> Job {
        let color = entry
            .color
            .as_deref()
            .map(JobColor::parse)
            .unwrap_or(JobColor::Grey);

        let (test_report, problem) = match self.fetch_test_report(&entry.url).await {
            Ok(report) => (report, None),
            Err(e) => (None, Some(format!("{e:#}"))),
        };

        let job = Job {
            name: entry.name,
            url: entry.url,
            color,
            test_report,
        };

        let symbol = if job.is_good() {
            "✓".green()
        } else {
            "✗".red()
        };
        let detail = match (&job.test_report, problem) {
            (_, Some(reason)) => format!("skipped: {reason}").yellow().to_string(),
            (Some(r), None) if r.fail_count > 0 => {
                format!("{}/{} failed", r.fail_count, r.total_count)
                    .red()
                    .to_string()
            }
            (Some(r), None) => format!("{} tests", r.total_count).dimmed().to_string(),
            (None, None) => "no test data".dimmed().to_string(),
        };
        println!("  {} {} {}", symbol, job.name.cyan(), detail);

        job
    }

    /// Report of a job's last completed build; `None` when the job never
    /// published one (Jenkins answers 404).
    async fn fetch_test_report(&self, job_url: &str) -> Result<Option<TestReport>> {
        let url = test_report_url(job_url);
        let response = self.get(&url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            bail!("Jenkins returned {} for {}", response.status(), url);
        }
        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response from {url}"))?;

        let report = parser::parse_report(body.as_ref())
            .with_context(|| format!("Invalid test report at {url}"))?;
        Ok(Some(report))
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut request = self.http.get(url);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.api_token.as_deref());
        }
        request
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))
    }
}

/// Full URL of a view; each segment of a nested view path gets the view
/// prefix and percent-encoding.
fn build_view_url(base_url: &str, view_prefix: &str, view_path: &str) -> String {
    let mut url = base_url.to_string();
    for segment in view_path.split('/').filter(|s| !s.is_empty()) {
        url.push_str(view_prefix);
        url.push_str(&urlencoding::encode(segment));
    }
    url
}

/// Test-report endpoint of a job's last completed build.
fn test_report_url(job_url: &str) -> String {
    format!(
        "{}/lastCompletedBuild/testReport/api/xml",
        job_url.trim_end_matches('/')
    )
}

/// Turn a decoded listing into the view shell plus the job entries left
/// after prefix filtering. `jobs_total` counts the listing before the
/// filter.
fn prepare_view(
    view_path: &str,
    view_url: &str,
    listing: ViewListing,
    job_prefix: Option<&str>,
) -> (JenkinsView, Vec<JobEntry>) {
    let jobs_total = listing.jobs.len() as u32;
    let entries: Vec<JobEntry> = match job_prefix {
        Some(prefix) => listing
            .jobs
            .into_iter()
            .filter(|job| job.name.starts_with(prefix))
            .collect(),
        None => listing.jobs,
    };

    let view = JenkinsView {
        name: if listing.name.is_empty() {
            view_path.to_string()
        } else {
            listing.name
        },
        url: if listing.url.is_empty() {
            view_url.to_string()
        } else {
            listing.url
        },
        jobs_total,
        jobs: Vec::with_capacity(entries.len()),
    };
    (view, entries)
}

/// One `<job>` entry from a view listing.
#[derive(Debug, Default)]
struct JobEntry {
    name: String,
    url: String,
    color: Option<String>,
}

/// Decoded view listing: the view's own identity plus its job entries.
#[derive(Debug, Default)]
struct ViewListing {
    name: String,
    url: String,
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingField {
    Name,
    Url,
    Color,
}

/// Decode a view's `api/xml` listing.
///
/// The view's own `name` and `url` use the same tag names as each job's,
/// so capture is routed by context: inside a `<job>` element the value
/// belongs to the entry, as a direct child of the root it belongs to the
/// view itself.
fn parse_view_listing(xml: &[u8]) -> Result<ViewListing> {
    let mut reader = Reader::from_reader(xml);

    let mut listing = ViewListing::default();
    let mut entry: Option<JobEntry> = None;
    let mut field: Option<ListingField> = None;
    let mut text = String::new();
    let mut depth = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                match e.name().as_ref() {
                    b"job" if depth == 2 => entry = Some(JobEntry::default()),
                    b"name" if entry.is_some() || depth == 2 => {
                        field = Some(ListingField::Name);
                        text.clear();
                    }
                    b"url" if entry.is_some() || depth == 2 => {
                        field = Some(ListingField::Url);
                        text.clear();
                    }
                    b"color" if entry.is_some() => {
                        field = Some(ListingField::Color);
                        text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                match e.name().as_ref() {
                    b"job" => {
                        if let Some(done) = entry.take() {
                            listing.jobs.push(done);
                        }
                    }
                    b"name" if field == Some(ListingField::Name) => {
                        let value = text.trim().to_string();
                        match entry.as_mut() {
                            Some(job) => job.name = value,
                            None => listing.name = value,
                        }
                        field = None;
                    }
                    b"url" if field == Some(ListingField::Url) => {
                        let value = text.trim().to_string();
                        match entry.as_mut() {
                            Some(job) => job.url = value,
                            None => listing.url = value,
                        }
                        field = None;
                    }
                    b"color" if field == Some(ListingField::Color) => {
                        if let Some(job) = entry.as_mut() {
                            job.color = Some(text.trim().to_string());
                        }
                        field = None;
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(ref e)) => {
                if field.is_some() {
                    text.push_str(&e.unescape()?);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(anyhow!("Error parsing view listing XML: {}", e)),
        }
        buf.clear();
    }

    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_url_inserts_prefix_per_segment() {
        assert_eq!(
            build_view_url("https://jenkins.example.com", "/view/", "QA"),
            "https://jenkins.example.com/view/QA"
        );
        assert_eq!(
            build_view_url("https://jenkins.example.com", "/view/", "Team Alpha/CI"),
            "https://jenkins.example.com/view/Team%20Alpha/view/CI"
        );
    }

    #[test]
    fn test_report_url_handles_trailing_slash() {
        assert_eq!(
            test_report_url("https://jenkins/job/app/"),
            "https://jenkins/job/app/lastCompletedBuild/testReport/api/xml"
        );
        assert_eq!(
            test_report_url("https://jenkins/job/app"),
            "https://jenkins/job/app/lastCompletedBuild/testReport/api/xml"
        );
    }

    #[test]
    fn test_parse_view_listing() {
        let xml = r#"<listView>
            <description>Nightly builds</description>
            <job>
                <name>app-build &amp; test</name>
                <url>https://jenkins/job/app-build/</url>
                <color>blue</color>
            </job>
            <job>
                <name>app-deploy</name>
                <url>https://jenkins/job/app-deploy/</url>
                <color>red_anime</color>
            </job>
            <job>
                <name>folder-entry</name>
                <url>https://jenkins/job/folder-entry/</url>
            </job>
            <name>Nightly</name>
            <url>https://jenkins/view/Nightly/</url>
            <property>
                <name>not-the-view-name</name>
            </property>
        </listView>"#;

        let listing = parse_view_listing(xml.as_bytes()).unwrap();
        assert_eq!(listing.name, "Nightly");
        assert_eq!(listing.url, "https://jenkins/view/Nightly/");
        assert_eq!(listing.jobs.len(), 3);

        assert_eq!(listing.jobs[0].name, "app-build & test");
        assert_eq!(listing.jobs[0].url, "https://jenkins/job/app-build/");
        assert_eq!(listing.jobs[0].color.as_deref(), Some("blue"));

        assert_eq!(listing.jobs[1].color.as_deref(), Some("red_anime"));
        assert_eq!(listing.jobs[2].color, None);
    }

    #[test]
    fn test_prepare_view_filters_by_prefix_and_keeps_total() {
        let listing = ViewListing {
            name: "Nightly".to_string(),
            url: "https://jenkins/view/Nightly/".to_string(),
            jobs: vec![
                JobEntry {
                    name: "team-app".to_string(),
                    ..Default::default()
                },
                JobEntry {
                    name: "other-app".to_string(),
                    ..Default::default()
                },
                JobEntry {
                    name: "team-lib".to_string(),
                    ..Default::default()
                },
            ],
        };

        let (view, entries) = prepare_view("Nightly", "https://jenkins/x", listing, Some("team-"));
        assert_eq!(view.jobs_total, 3);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["team-app", "team-lib"]);
    }

    #[test]
    fn test_prepare_view_falls_back_to_request_identity() {
        let (view, entries) = prepare_view(
            "Group/Inner",
            "https://jenkins/view/Group/view/Inner",
            ViewListing::default(),
            None,
        );
        assert_eq!(view.name, "Group/Inner");
        assert_eq!(view.url, "https://jenkins/view/Group/view/Inner");
        assert_eq!(view.jobs_total, 0);
        assert!(entries.is_empty());
    }
}
