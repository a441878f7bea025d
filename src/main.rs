use clap::Parser;
use std::io::IsTerminal;
use taskshare::cli::{Cli, Commands};
use taskshare::cli_handlers::{
    handle_auth_command, handle_shared_command, handle_task_command, handle_watch_command,
    OutputOptions,
};
use taskshare::client::ClientContext;
use taskshare::config::AppConfig;
use taskshare::error::Result;
use taskshare::logging::{log_file_path, ApplicationMode, LoggingConfig};

#[tokio::main]
async fn main() {
    // Parse CLI arguments first to get logging configuration
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };

    let mut log_config = LoggingConfig::from_args(cli.quiet, cli.verbose, cli.json);

    // A redirected watch session is long-running; send its logs to a file
    if matches!(cli.command, Commands::Watch { .. }) && !std::io::stdout().is_terminal() {
        log_config = LoggingConfig::for_mode(ApplicationMode::Watch);
        log_config.file_output = Some(log_file_path(&config.log_dir(), ApplicationMode::Watch));
    }

    if let Err(e) = taskshare::logging::init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(&cli, config).await {
        exit_with(&e);
    }
}

fn exit_with(e: &taskshare::error::TaskError) -> ! {
    let error_response = e.to_error_response();
    match serde_json::to_string_pretty(&error_response) {
        Ok(body) => eprintln!("{}", body),
        Err(_) => eprintln!("{}", e),
    }
    std::process::exit(1);
}

async fn run(cli: &Cli, config: AppConfig) -> Result<()> {
    let client = ClientContext::open(config).await?;
    let output = OutputOptions {
        json: cli.json,
        quiet: cli.quiet,
    };

    match cli.command.clone() {
        Commands::Auth(auth_cmd) => handle_auth_command(&client, auth_cmd, output).await?,

        Commands::Task(task_cmd) => handle_task_command(&client, task_cmd, output).await?,

        Commands::Shared(shared_cmd) => handle_shared_command(&client, shared_cmd, output).await?,

        Commands::Watch {
            search,
            filter,
            sort,
        } => handle_watch_command(&client, search, &filter, &sort, output).await?,
    }

    Ok(())
}
