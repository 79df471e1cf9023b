// CLI modules
mod api;
mod args;
mod logging;
mod op;
mod ops;
mod state;

use args::Args;
use clap::{Parser, Subcommand};
use op::Op;
use ops::{Init, Team, Version};

command_enum! {
    (Init, Init),
    (Team, Team),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let state = state::AppState::load(args.config_path.clone()).ok();
    let guard = logging::init_logging(&logging::log_level(args.log_level, state.as_ref()));

    let ctx = op::OpContext::new(args.remote, args.config_path);

    let code = match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            1
        }
    };

    // flush buffered log lines before exiting
    drop(guard);
    std::process::exit(code);
}
