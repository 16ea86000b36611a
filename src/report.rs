use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::{JenkinsView, Job, TestCase};

/// Generate the HTML report for one view
pub fn generate_report(view: &JenkinsView, output_path: &Path) -> Result<()> {
    let html = build_html(view);
    fs::write(output_path, html)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;
    Ok(())
}

/// Default report location: a timestamped file in `output_dir`, or in the
/// system temp directory when unset. Slashes in a nested view path become
/// dashes so the whole path stays in the file name.
pub fn default_output_path(
    output_dir: Option<&Path>,
    view_path: &str,
    started: &DateTime<Local>,
) -> PathBuf {
    let dir = output_dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
    let file_name = format!(
        "{}-jenkins-report-{}.html",
        view_path.replace('/', "-"),
        started.format("%Y-%m-%d_%H.%M.%S")
    );
    dir.join(file_name)
}

fn build_html(view: &JenkinsView) -> String {
    let failed_jobs = view.failed_jobs();
    let passed_jobs = view.passed_jobs();
    let analyzed = view.jobs.len();
    let failed_count = failed_jobs.len();
    let passed_count = passed_jobs.len();
    let tests_total = view.tests_total();
    let fail_count = view.fail_count();
    let failure_rate = view.failure_rate();
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let failed_section = if failed_jobs.is_empty() {
        r#"<p class="empty">No failed jobs.</p>"#.to_string()
    } else {
        failed_jobs.iter().map(|job| build_job_card(job)).collect()
    };

    let passed_section = if passed_jobs.is_empty() {
        r#"<p class="no-cases">None.</p>"#.to_string()
    } else {
        let rows: String = passed_jobs.iter().map(|job| build_passed_row(job)).collect();
        format!(
            r#"<table class="jobs-table">
        <thead><tr><th>Job</th><th>Color</th><th>Tests</th></tr></thead>
        <tbody>{rows}</tbody>
    </table>"#
        )
    };

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{view_name} - Jenkins Test Report</title>
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #0f0f1a;
            color: #eee;
            min-height: 100vh;
        }}
        .header {{
            background: linear-gradient(135deg, #1a1a2e 0%, #16213e 100%);
            padding: 20px 30px;
            border-bottom: 1px solid #2d2d44;
        }}
        .header h1 {{ color: #00d4ff; font-size: 28px; margin-bottom: 5px; }}
        .header p {{ color: #888; font-size: 14px; }}
        .header a {{ color: #888; }}
        .summary {{
            display: flex;
            gap: 20px;
            padding: 20px 30px;
            background: #1a1a2e;
            border-bottom: 1px solid #2d2d44;
            flex-wrap: wrap;
        }}
        .summary-card {{
            background: #16213e;
            padding: 15px 25px;
            border-radius: 10px;
            text-align: center;
            min-width: 120px;
        }}
        .summary-card.failure {{ border-left: 4px solid #ef5350; }}
        .summary-card.success {{ border-left: 4px solid #26a69a; }}
        .summary-card.tests {{ border-left: 4px solid #00d4ff; }}
        .summary-card.rate {{ border-left: 4px solid #ffd700; }}
        .summary-value {{ font-size: 28px; font-weight: bold; }}
        .summary-value.green {{ color: #26a69a; }}
        .summary-value.red {{ color: #ef5350; }}
        .summary-value.blue {{ color: #00d4ff; }}
        .summary-value.gold {{ color: #ffd700; }}
        .summary-label {{ font-size: 12px; color: #888; margin-top: 5px; }}
        .section {{ padding: 30px; }}
        .section-title {{ color: #00d4ff; font-size: 22px; margin-bottom: 20px; }}
        .job-card {{
            background: #1a1a2e;
            border: 1px solid #2d2d44;
            border-left: 4px solid #ef5350;
            border-radius: 12px;
            padding: 20px;
            margin-bottom: 20px;
        }}
        .job-header {{
            display: flex;
            justify-content: space-between;
            align-items: center;
            margin-bottom: 12px;
        }}
        .job-title {{ font-size: 18px; }}
        .job-title a {{ color: #00d4ff; text-decoration: none; }}
        .job-title a:hover {{ text-decoration: underline; }}
        .color-badge {{
            padding: 3px 10px;
            border-radius: 12px;
            font-size: 11px;
            font-weight: bold;
            background: #2d2d44;
            color: #aaa;
            text-transform: uppercase;
        }}
        .job-counts {{ color: #888; font-size: 13px; margin-bottom: 12px; }}
        .job-counts .fail {{ color: #ef5350; font-weight: bold; }}
        .case-table {{ width: 100%; border-collapse: collapse; }}
        .case-table th, .case-table td {{
            padding: 10px 12px;
            text-align: left;
            border: 1px solid #2d2d44;
            vertical-align: top;
        }}
        .case-table th {{ background: #16213e; color: #00d4ff; }}
        .case-table tr:nth-child(even) {{ background: rgba(22, 33, 62, 0.5); }}
        .case-name {{ font-family: 'SF Mono', Menlo, Consolas, monospace; font-size: 13px; }}
        .status {{
            padding: 3px 10px;
            border-radius: 12px;
            font-size: 11px;
            font-weight: bold;
        }}
        .status.fail {{ background: #4a1c1c; color: #ef5350; }}
        details {{ margin-top: 8px; }}
        summary {{ cursor: pointer; color: #888; font-size: 12px; }}
        details pre {{
            background: #0f0f1a;
            border: 1px solid #2d2d44;
            border-radius: 8px;
            padding: 12px;
            margin-top: 8px;
            font-size: 12px;
            overflow-x: auto;
            white-space: pre-wrap;
        }}
        .jobs-table {{ width: 100%; border-collapse: collapse; }}
        .jobs-table th, .jobs-table td {{
            padding: 10px 12px;
            text-align: left;
            border: 1px solid #2d2d44;
        }}
        .jobs-table th {{ background: #16213e; color: #00d4ff; }}
        .jobs-table tr:nth-child(even) {{ background: rgba(22, 33, 62, 0.5); }}
        .jobs-table a {{ color: #eee; text-decoration: none; }}
        .jobs-table a:hover {{ color: #00d4ff; }}
        .no-cases {{ color: #888; }}
        .empty {{ color: #26a69a; }}
    </style>
</head>
<body>
    <div class="header">
        <h1>{view_name}</h1>
        <p>Jenkins test report - {timestamp} - <a href="{view_url}">{view_url}</a></p>
    </div>

    <div class="summary">
        <div class="summary-card">
            <div class="summary-value">{analyzed} / {jobs_total}</div>
            <div class="summary-label">Jobs Analyzed</div>
        </div>
        <div class="summary-card failure">
            <div class="summary-value red">{failed_count}</div>
            <div class="summary-label">Failed Jobs</div>
        </div>
        <div class="summary-card success">
            <div class="summary-value green">{passed_count}</div>
            <div class="summary-label">Passed Jobs</div>
        </div>
        <div class="summary-card tests">
            <div class="summary-value blue">{tests_total}</div>
            <div class="summary-label">Tests</div>
        </div>
        <div class="summary-card failure">
            <div class="summary-value red">{fail_count}</div>
            <div class="summary-label">Failing Tests</div>
        </div>
        <div class="summary-card rate">
            <div class="summary-value gold">{failure_rate:.1}%</div>
            <div class="summary-label">Failure Rate</div>
        </div>
    </div>

    <div class="section">
        <h2 class="section-title">Failed Jobs ({failed_count})</h2>
        {failed_section}
    </div>

    <div class="section">
        <h2 class="section-title">Passed Jobs ({passed_count})</h2>
        {passed_section}
    </div>
</body>
</html>"##,
        view_name = escape_html(&view.name),
        view_url = escape_html(&view.url),
        timestamp = timestamp,
        analyzed = analyzed,
        jobs_total = view.jobs_total,
        failed_count = failed_count,
        passed_count = passed_count,
        tests_total = tests_total,
        fail_count = fail_count,
        failure_rate = failure_rate,
        failed_section = failed_section,
        passed_section = passed_section,
    )
}

fn build_job_card(job: &Job) -> String {
    let body = match &job.test_report {
        Some(report) => {
            let counts = format!(
                r#"<div class="job-counts"><span class="fail">{} failed</span> · {} passed · {} skipped · {} total</div>"#,
                report.fail_count, report.pass_count, report.skip_count, report.total_count
            );
            let cases = if report.test_cases.is_empty() {
                r#"<p class="no-cases">No failing test cases; the build itself is unhealthy.</p>"#
                    .to_string()
            } else {
                let rows: String = report.test_cases.iter().map(build_case_row).collect();
                format!(
                    r#"<table class="case-table">
            <thead><tr><th>Test</th><th>Status</th><th>Age</th></tr></thead>
            <tbody>{rows}</tbody>
        </table>"#
                )
            };
            format!("{counts}\n        {cases}")
        }
        None => r#"<p class="no-cases">No test data for the last completed build.</p>"#.to_string(),
    };

    format!(
        r#"<div class="job-card">
        <div class="job-header">
            <span class="job-title"><a href="{url}">{name}</a></span>
            <span class="color-badge">{color}</span>
        </div>
        {body}
    </div>"#,
        url = escape_html(&job.url),
        name = escape_html(&job.name),
        color = escape_html(job.color.as_str()),
        body = body,
    )
}

fn build_case_row(case: &TestCase) -> String {
    let mut details = String::new();
    if let Some(text) = &case.error_details {
        details.push_str(&format!(
            r#"<details><summary>Error details</summary><pre>{}</pre></details>"#,
            escape_html(text)
        ));
    }
    if let Some(text) = &case.error_stack_trace {
        details.push_str(&format!(
            r#"<details><summary>Stack trace</summary><pre>{}</pre></details>"#,
            escape_html(text)
        ));
    }

    format!(
        r#"<tr>
                <td><div class="case-name">{class}.{method}</div>{details}</td>
                <td><span class="status fail">{status}</span></td>
                <td>{age}</td>
            </tr>"#,
        class = escape_html(&case.class_name),
        method = escape_html(&case.method_name),
        details = details,
        status = escape_html(case.status.as_str()),
        age = case.age,
    )
}

fn build_passed_row(job: &Job) -> String {
    let tests = match &job.test_report {
        Some(report) => format!("{} / {} passed", report.pass_count, report.total_count),
        None => "no test data".to_string(),
    };
    format!(
        r#"<tr><td><a href="{url}">{name}</a></td><td>{color}</td><td>{tests}</td></tr>"#,
        url = escape_html(&job.url),
        name = escape_html(&job.name),
        color = escape_html(job.color.as_str()),
        tests = tests,
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
