mod client;
mod compose;
mod config;
mod request;
mod request_id;
mod server;
mod status;

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::client::{TestingFarmClient, TestingFarmGateway};
use crate::compose::{filter_composes, Ranch};
use crate::config::{Config, DEFAULT_TIMEOUT_SECS};
use crate::request::{build_payload, Architecture, SubmitParams};
use crate::request_id::extract_request_id;
use crate::server::McpServer;
use crate::status::describe_request;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "MCP server and CLI for the Testing Farm API")]
struct Cli {
    /// Testing Farm API token.
    #[arg(
        long,
        global = true,
        env = "TESTING_FARM_API_TOKEN",
        hide_env_values = true
    )]
    api_token: Option<String>,

    /// Override the Testing Farm API base URL.
    #[arg(long, global = true, env = "TESTING_FARM_API_URL")]
    api_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(
        long,
        global = true,
        env = "TESTING_FARM_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    timeout_secs: u64,

    /// Log level filter, e.g. info,debug,trace.
    #[arg(long, global = true, env = "TESTING_FARM_MCP_LOG", default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum CliCommand {
    /// Serve the Testing Farm tools over stdio (default).
    Serve,
    /// Submit a test request from the command line.
    Submit(SubmitArgs),
    /// List available composes for a ranch.
    Composes(ComposesArgs),
    /// Show the status of a request by ID or any string containing one.
    Request(RequestArgs),
}

#[derive(Debug, Clone, Args)]
struct SubmitArgs {
    /// Git repository URL containing the tmt metadata.
    #[arg(long)]
    url: String,
    /// Compose to run tests against.
    #[arg(long)]
    compose: String,
    /// Git branch, tag or commit specifying the desired git revision.
    #[arg(long = "ref", default_value = request::DEFAULT_GIT_REF)]
    git_ref: String,
    /// Path to the metadata tree root directory.
    #[arg(long, default_value = request::DEFAULT_METADATA_ROOT_DIR)]
    metadata_root_dir: String,
    /// Architecture to test against.
    #[arg(long, default_value = "x86_64")]
    arch: String,
    /// Selected plans to be executed. Can be a regular expression.
    #[arg(long)]
    plan_name: Option<String>,
    /// Select tests to be executed. Can be a regular expression.
    #[arg(long)]
    test_name: Option<String>,
    /// TMT context variable as KEY=VALUE; may be repeated.
    #[arg(long = "context")]
    context: Vec<String>,
    /// TMT environment variable as KEY=VALUE; may be repeated.
    #[arg(long = "environment")]
    environment: Vec<String>,
}

#[derive(Debug, Clone, Args)]
struct ComposesArgs {
    /// Ranch to list composes for, redhat or public.
    #[arg(long, default_value = "public")]
    ranch: String,
}

#[derive(Debug, Clone, Args)]
struct RequestArgs {
    /// Request ID or a string containing one, like an API or artifacts URL.
    id_or_text: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    let config = Config::resolve(
        cli.api_url.as_deref(),
        cli.api_token.as_deref(),
        cli.timeout_secs,
    )?;

    match cli.command.unwrap_or(CliCommand::Serve) {
        CliCommand::Serve => McpServer::new(config).run_stdio().await,
        CliCommand::Submit(args) => run_submit_command(config, args).await,
        CliCommand::Composes(args) => run_composes_command(config, args).await,
        CliCommand::Request(args) => run_request_command(config, args).await,
    }
}

async fn run_submit_command(config: Config, args: SubmitArgs) -> Result<()> {
    let params = SubmitParams {
        url: args.url,
        compose: args.compose,
        git_ref: args.git_ref,
        metadata_root_dir: args.metadata_root_dir,
        arch: Architecture::parse(&args.arch)?,
        plan_name: args.plan_name,
        test_name: args.test_name,
        context: parse_key_value_pairs(&args.context)?,
        environment: parse_key_value_pairs(&args.environment)?,
    };

    let client = TestingFarmClient::new(&config)?;
    let response = client.submit_request(&build_payload(&params)).await?;
    print_json_value(&response);
    Ok(())
}

async fn run_composes_command(config: Config, args: ComposesArgs) -> Result<()> {
    let ranch = Ranch::parse(&args.ranch)?;
    let client = TestingFarmClient::new(&config)?;
    let names = filter_composes(client.list_composes(ranch).await?);
    for name in names {
        println!("{name}");
    }
    Ok(())
}

async fn run_request_command(config: Config, args: RequestArgs) -> Result<()> {
    let request_id = extract_request_id(&args.id_or_text)
        .ok_or_else(|| anyhow!("could not find request ID in {}", args.id_or_text))?;

    let client = TestingFarmClient::new(&config)?;
    let record = client.get_request(request_id).await?;
    println!("{}", describe_request(&record));
    Ok(())
}

fn parse_key_value_pairs(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got `{pair}`"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(anyhow!("expected KEY=VALUE, got `{pair}`"));
        }
        out.insert(key.to_owned(), value.to_owned());
    }
    Ok(out)
}

fn print_json_value(value: &Value) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    println!("{rendered}");
}

fn init_logging(filter: &str) {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    // stdout carries the MCP transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_to_serve_command() {
        let cli = Cli::parse_from(["testing-farm-mcp-rs"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cli.log, "info");
    }

    #[test]
    fn cli_parses_submit_command_with_repeated_pairs() {
        let cli = Cli::parse_from([
            "testing-farm-mcp-rs",
            "submit",
            "--url",
            "https://x/tests.git",
            "--compose",
            "fedora-41",
            "--ref",
            "devel",
            "--arch",
            "s390x",
            "--context",
            "distro=fedora",
            "--context",
            "arch=s390x",
        ]);
        match cli.command {
            Some(CliCommand::Submit(args)) => {
                assert_eq!(args.git_ref, "devel");
                assert_eq!(args.arch, "s390x");
                assert_eq!(args.context.len(), 2);
            }
            _ => panic!("expected submit command"),
        }
    }

    #[test]
    fn cli_parses_request_command() {
        let cli = Cli::parse_from([
            "testing-farm-mcp-rs",
            "request",
            "https://x/requests/3fa85f64-5717-4562-b3fc-2c963f66afa6",
        ]);
        match cli.command {
            Some(CliCommand::Request(args)) => {
                assert!(args.id_or_text.contains("3fa85f64"));
            }
            _ => panic!("expected request command"),
        }
    }

    #[test]
    fn key_value_pairs_parse_and_reject_malformed_input() {
        let parsed = parse_key_value_pairs(&[
            "distro=centos-stream".to_owned(),
            "ROOTLESS_USER=ec2-user".to_owned(),
        ])
        .expect("parse pairs");
        assert_eq!(parsed["distro"], "centos-stream");
        assert_eq!(parsed["ROOTLESS_USER"], "ec2-user");

        assert!(parse_key_value_pairs(&["no-separator".to_owned()]).is_err());
        assert!(parse_key_value_pairs(&["=value".to_owned()]).is_err());
    }
}
