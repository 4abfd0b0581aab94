use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs object-store steps against an S3-compatible endpoint", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single step
    Run {
        #[command(flatten)]
        run_command: Box<RunCmd>,
    },
    /// List the commands a step may name
    Commands,
}

#[derive(Parser, Debug, Clone)]
pub struct RunCmd {
    /// YAML file holding the step. Flags and environment variables override its fields.
    #[arg(env = "S3_EXECUTOR_STEP_FILE", long, value_name = "PATH")]
    pub step_file: Option<PathBuf>,

    #[command(flatten)]
    pub step_args: StepCliArgs,

    /// Encoding used for the step result on stdout
    #[arg(env = "S3_EXECUTOR_OUTPUT", long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,
}

/// Step fields settable from the command line. A step file deserializes into the same shape.
#[derive(Debug, Clone, Default, Args, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepCliArgs {
    /// One of the commands listed by `s3-executor commands`
    #[arg(env = "S3_EXECUTOR_COMMAND", long)]
    pub command: Option<String>,

    /// Store address as host[:port]
    #[arg(env = "S3_EXECUTOR_ENDPOINT", long)]
    pub endpoint: Option<String>,

    /// Access key
    #[arg(env = "S3_EXECUTOR_USER", long)]
    pub user: Option<String>,

    /// Secret key
    #[arg(env = "S3_EXECUTOR_PASSWORD", long, hide_env_values = true)]
    pub password: Option<String>,

    /// Talk to the endpoint over https
    #[arg(env = "S3_EXECUTOR_USE_SSL", long)]
    pub use_ssl: Option<bool>,

    #[arg(env = "S3_EXECUTOR_BUCKET_NAME", long)]
    pub bucket_name: Option<String>,

    #[arg(env = "S3_EXECUTOR_OBJECT_NAME", long)]
    pub object_name: Option<String>,

    #[arg(env = "S3_EXECUTOR_OBJECT_CONTENT", long)]
    pub object_content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}
