use std::process::ExitCode;

use cow_bench::{run_suite, BenchConfig};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match BenchConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("cow-bench: {err}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(?config, "configured");

    println!("=== Microbenchmarking cow_ptr (scale 1/{}) ===", config.scale);
    for comparison in run_suite(&config) {
        println!();
        println!("{comparison}");
    }
    ExitCode::SUCCESS
}
