//! Testit grader CLI.
//!
//! With no arguments, grades the current submission and writes the
//! feedback report. With `--setup`, seeds the grading service with the
//! instructor's default tests.

use testit_grader::config::Settings;
use testit_grader::executor::CurlExecutor;
use testit_grader::pipeline::Grader;
use testit_grader::server::NodeServerLauncher;
use testit_grader::service::TestitClient;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let setup_mode = match args.len() {
        1 => false,
        2 if args[1] == "--setup" => true,
        2 => {
            eprintln!("Invalid argument. Use --setup in autograder setup.");
            std::process::exit(1);
        }
        _ => {
            eprintln!("Invalid number of arguments. Use --setup in autograder setup.");
            std::process::exit(1);
        }
    };

    let settings = Settings::from_env();
    let service = TestitClient::new(
        settings.service_base_url(),
        settings.auth_token.clone(),
        settings.service_timeout(),
    );
    let lifecycle = NodeServerLauncher::new(settings.settle_delay());
    let executor = CurlExecutor::new(settings.test_timeout());
    let grader = Grader::new(settings, service, lifecycle, executor);

    if setup_mode {
        match grader.run_setup().await {
            Ok(narrative) => println!("{}", narrative),
            Err(e) => {
                eprintln!("Setup failed: {}", e);
                std::process::exit(1);
            }
        }
    } else if let Err(e) = grader.run().await {
        eprintln!("Grading failed: {}", e);
        std::process::exit(1);
    }
}
