use std::process::ExitCode;

use truck_tracker::config::Config;
use truck_tracker::lifecycle::{self, Action, PidFile, UsageError, USAGE};
use truck_tracker::run_daemon;
use truck_tracker::utils::Utils;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let action = match Action::from_args(&args) {
        Ok(action) => action,
        Err(UsageError::Unknown(command)) => {
            eprintln!("Unknown command '{}'", command);
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
        Err(UsageError::Missing) => {
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    Utils::logger_init(&config.log_level, &config.log_file)
        .unwrap_or_else(|e| eprintln!("Cannot initialize the logger: {}", e));

    let pid_file = PidFile::new(&config.pid_file);
    let result = match action {
        Action::Start => lifecycle::start(&pid_file, || run_daemon(&config)),
        Action::Stop => lifecycle::stop(&pid_file),
        Action::Restart => lifecycle::restart(&pid_file, || run_daemon(&config)),
    };

    match result {
        Ok(()) => {
            log::info!("The application terminated successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
