// src/main.rs

use launchgate::{cli, logging, run};

#[tokio::main]
async fn main() {
    let code = match run_main().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("launchgate error: {err:?}");
            1
        }
    };
    // The stdin reader sits in a blocking read that cannot be cancelled;
    // exit without waiting for the runtime to wind it down.
    std::process::exit(code);
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
