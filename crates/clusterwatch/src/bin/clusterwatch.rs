use std::io::IsTerminal;

use clap::{CommandFactory, FromArgMatches};
use cli_table::ColorChoice;

use clusterwatch::client::commands::diagnose::{command_bootstrap_errors, command_diagnose};
use clusterwatch::client::commands::monitor::{
    command_scale, command_scaling_test, command_watch_nodes,
};
use clusterwatch::client::globalsettings::GlobalSettings;
use clusterwatch::client::output::cli::CliOutput;
use clusterwatch::client::output::json::JsonOutput;
use clusterwatch::client::output::outputs::{Output, Outputs};
use clusterwatch::client::output::quiet::Quiet;
use clusterwatch::common::cli::{ColorPolicy, CommonOpts, RootOptions, SubCommand};
use clusterwatch::common::setup::setup_logging;

fn make_global_settings(opts: CommonOpts) -> GlobalSettings {
    let color_policy = match opts.colors {
        ColorPolicy::Always => ColorChoice::AlwaysAnsi,
        ColorPolicy::Auto => {
            if std::io::stdout().is_terminal() {
                ColorChoice::Auto
            } else {
                ColorChoice::Never
            }
        }
        ColorPolicy::Never => ColorChoice::Never,
    };

    let printer: Box<dyn Output> = match opts.output_mode {
        Outputs::CLI => {
            match color_policy {
                ColorChoice::Always | ColorChoice::AlwaysAnsi => {
                    colored::control::set_override(true)
                }
                ColorChoice::Never => colored::control::set_override(false),
                _ => {}
            }
            Box::new(CliOutput::new(color_policy))
        }
        Outputs::JSON => Box::<JsonOutput>::default(),
        Outputs::Quiet => Box::<Quiet>::default(),
    };

    GlobalSettings::new(printer)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> clusterwatch::Result<()> {
    let matches = RootOptions::command().get_matches();
    let top_opts = match RootOptions::from_arg_matches(&matches) {
        Ok(opts) => opts,
        Err(error) => error.exit(),
    };

    setup_logging(top_opts.common.debug);

    let gsettings = make_global_settings(top_opts.common);

    let result = match top_opts.subcmd {
        SubCommand::Scale(opts) => command_scale(&gsettings, opts).await,
        SubCommand::WatchNodes(opts) => command_watch_nodes(&gsettings, opts).await,
        SubCommand::ScalingTest(opts) => command_scaling_test(&gsettings, opts).await,
        SubCommand::Diagnose(opts) => command_diagnose(&gsettings, opts).await,
        SubCommand::BootstrapErrors(opts) => command_bootstrap_errors(&gsettings, opts).await,
    };

    if let Err(e) = result {
        gsettings.printer().print_error(e);
        std::process::exit(1);
    }

    Ok(())
}
