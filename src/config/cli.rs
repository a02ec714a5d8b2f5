use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Vitrine binary.
#[derive(Debug, Parser)]
#[command(name = "vitrine", version, about = "Vitrine query optimizer host")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VITRINE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Load a page and its sections through the optimizer.
    Page(PageArgs),
    /// Load one or more menus through the optimizer.
    Menu(MenuArgs),
}

impl Command {
    pub fn overrides(&self) -> &Overrides {
        match self {
            Command::Page(args) => &args.overrides,
            Command::Menu(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct PageArgs {
    #[command(flatten)]
    pub overrides: Overrides,

    /// Identifier of the page to load.
    #[arg(value_name = "PAGE_ID")]
    pub page_id: String,

    /// Number of times to load the page; later loads are served from cache.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub repeat: u32,

    /// Hand media URLs of heavy-media sections to the asset preloader.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub preload: bool,
}

#[derive(Debug, Args, Clone)]
pub struct MenuArgs {
    #[command(flatten)]
    pub overrides: Overrides,

    /// Menu locations to load.
    #[arg(value_name = "LOCATION", required = true)]
    pub locations: Vec<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the GraphQL endpoint URL.
    #[arg(long = "endpoint", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Override the per-request timeout.
    #[arg(long = "timeout-ms", value_name = "MILLISECONDS")]
    pub timeout_ms: Option<u64>,

    /// Override the tenant identifier sent with every request.
    #[arg(long = "tenant", value_name = "TENANT")]
    pub tenant: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}
