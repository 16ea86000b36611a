use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use jenkins_reporter::config::Config;
use jenkins_reporter::jenkins::JenkinsClient;
use jenkins_reporter::model::JenkinsView;
use jenkins_reporter::report;

const CONFIG_FILE: &str = "jenkins-reporter.toml";

#[derive(Parser)]
#[command(name = "jenkins-reporter")]
#[command(about = "HTML test-failure reports for Jenkins views")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: jenkins-reporter.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Jenkins base URL, e.g. https://jenkins.example.com
    #[arg(long, global = true)]
    url: Option<String>,

    /// Username for HTTP basic auth
    #[arg(long, global = true)]
    username: Option<String>,

    /// API token used as the basic-auth password
    #[arg(long, global = true)]
    api_token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an HTML report for one or more views
    Report {
        /// View names; nested paths like "Group/Inner" are allowed
        #[arg(required = true)]
        views: Vec<String>,

        /// Output file (single view only; default: timestamped file per view)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only include jobs whose name starts with this prefix
        #[arg(long)]
        job_prefix: Option<String>,
    },

    /// List a view's jobs and failing tests without writing a report
    List {
        /// View name; nested paths like "Group/Inner" are allowed
        view: String,

        /// Only include jobs whose name starts with this prefix
        #[arg(long)]
        job_prefix: Option<String>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Report {
            views,
            output,
            job_prefix,
        } => {
            if let Some(prefix) = job_prefix {
                config.report.job_prefix = Some(prefix);
            }
            if output.is_some() && views.len() > 1 {
                bail!("--output only works with a single view");
            }
            cmd_report(&config, &views, output.as_deref())
        }
        Commands::List { view, job_prefix } => {
            if let Some(prefix) = job_prefix {
                config.report.job_prefix = Some(prefix);
            }
            cmd_list(&config, &view)
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        // An explicitly requested config file must exist.
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(Path::new(CONFIG_FILE))?,
    };

    if let Some(url) = &cli.url {
        config.jenkins.url = Some(url.clone());
    }
    if let Some(username) = &cli.username {
        config.jenkins.username = Some(username.clone());
    }
    if let Some(api_token) = &cli.api_token {
        config.jenkins.api_token = Some(api_token.clone());
    }
    if cli.insecure {
        config.jenkins.insecure = true;
    }

    config.validate()?;

    Ok(config)
}

#[tokio::main]
async fn cmd_report(config: &Config, views: &[String], output: Option<&Path>) -> Result<()> {
    let client = JenkinsClient::new(config)?;
    let started = Local::now();

    for view_path in views {
        let view = client.view_data(view_path).await?;
        print_view_summary(&view);

        let output_path = match output {
            Some(path) => path.to_path_buf(),
            None => report::default_output_path(
                config.report.output_dir.as_deref(),
                view_path,
                &started,
            ),
        };
        if let Some(dir) = output_path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Could not create directory {}", dir.display()))?;
            }
        }
        report::generate_report(&view, &output_path)?;

        println!(
            "\n{} Report generated: {}",
            "📊".cyan(),
            output_path.display().to_string().green()
        );
    }

    Ok(())
}

#[tokio::main]
async fn cmd_list(config: &Config, view_path: &str) -> Result<()> {
    let client = JenkinsClient::new(config)?;
    let view = client.view_data(view_path).await?;
    print_view_summary(&view);

    let failed = view.failed_jobs();
    if failed.is_empty() {
        println!("\n  {}", "All jobs passing".green());
        return Ok(());
    }

    println!("\n{}", "Failing jobs:".bold());
    for job in failed {
        println!("  {} {} {}", "•".red(), job.name.cyan(), job.url.dimmed());
        if let Some(report) = &job.test_report {
            for case in &report.test_cases {
                println!(
                    "      {} {}.{} {}",
                    "✗".red(),
                    case.class_name,
                    case.method_name,
                    format!("(age {})", case.age).dimmed()
                );
            }
        }
    }

    Ok(())
}

fn print_view_summary(view: &JenkinsView) {
    println!("\n{}", "━".repeat(50).dimmed());
    println!("{} {}", "📦".cyan(), view.name.bold());
    println!(
        "  {} passed, {} failed of {} jobs ({} in view)",
        view.passed_jobs().len().to_string().green(),
        view.failed_jobs().len().to_string().red(),
        view.jobs.len(),
        view.jobs_total
    );
    println!(
        "  {} of {} tests failing ({:.1}%)",
        view.fail_count().to_string().red(),
        view.tests_total(),
        view.failure_rate()
    );
}
