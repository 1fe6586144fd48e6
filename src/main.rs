// src/main.rs

use action_graph::{cli, logging, run};

/// Exit code for errors raised before or instead of a run.
const ERROR_EXIT_CODE: i32 = 2;

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("action-graph error: {err:?}");
            std::process::exit(ERROR_EXIT_CODE);
        }
    }
}

async fn run_main() -> anyhow::Result<i32> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let status = run(args).await?;
    Ok(status.exit_code())
}
