use orphan_report::cli::{handle_report, CliArgs};
use orphan_report::util::logging::{config_from_env, init_logging, parse_level};
use orphan_report::VERSION;

use clap::Parser;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("orphan-report v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = handle_report(&args).await;

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        Some(parse_level(level_str))
    } else if args.verbose {
        Some(Level::DEBUG)
    } else if args.quiet {
        Some(Level::ERROR)
    } else {
        None
    };

    init_logging(config_from_env(level));
}
