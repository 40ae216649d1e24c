use std::env;
use std::process;

use podium::cli;

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let args: Vec<String> = env::args().collect();
    process::exit(cli::run_with_args(&args));
}
