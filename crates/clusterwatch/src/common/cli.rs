use clap::Parser;

use crate::client::commands::diagnose::{BootstrapErrorsOpts, DiagnoseOpts};
use crate::client::commands::monitor::{ScaleOpts, ScalingTestOpts, WatchNodesOpts};
use crate::client::output::outputs::Outputs;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorPolicy {
    /// Use colors if the stdout is detected to be a terminal.
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

// Common CLI options
#[derive(Parser)]
pub struct CommonOpts {
    /// Sets console color policy
    #[arg(
        long,
        default_value_t = ColorPolicy::Auto,
        value_enum,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub colors: ColorPolicy,

    /// Sets output formatting
    #[arg(
        long,
        env = "CLUSTERWATCH_OUTPUT_MODE",
        default_value_t = Outputs::CLI,
        value_enum,
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub output_mode: Outputs,

    /// Enables more detailed log output
    #[arg(
        long,
        env = "CLUSTERWATCH_DEBUG",
        global = true,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub debug: bool,
}

// Root CLI options
#[derive(Parser)]
#[command(
    author,
    about,
    version(crate::CLUSTERWATCH_VERSION),
    disable_help_subcommand(true),
    help_expected(true)
)]
pub struct RootOptions {
    #[clap(flatten)]
    pub common: CommonOpts,

    #[clap(subcommand)]
    pub subcmd: SubCommand,
}

#[derive(Parser)]
pub enum SubCommand {
    /// Monitor a scaling operation until both the cloud and the scheduler report the target size
    Scale(ScaleOpts),
    /// Wait until the scheduler reports exactly the target number of compute nodes
    WatchNodes(WatchNodesOpts),
    /// Run the scaling phases described in a TOML file
    ScalingTest(ScalingTestOpts),
    /// Classify why the cluster stack failed to be created
    Diagnose(DiagnoseOpts),
    /// Collect console logs of compute nodes that reported bootstrap errors
    BootstrapErrors(BootstrapErrorsOpts),
}
