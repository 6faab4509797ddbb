use crate::report::{run_allocate, run_window, AllocateArgs, WindowArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use elective_allocation::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Elective Allocation",
    about = "Allocate students to optional-course packages and serve the allocation API",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run the allocation for one package and print the report
    Allocate(AllocateArgs),
    /// Show the enrollment window of one package
    Window(WindowArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Roster directory to seed the store from (defaults to the built-in sample roster)
    #[arg(long)]
    pub(crate) data_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Allocate(args) => run_allocate(args),
        Command::Window(args) => run_window(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["elective-allocation"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn allocate_requires_a_package() {
        assert!(Cli::try_parse_from(["elective-allocation", "allocate"]).is_err());

        let cli = Cli::try_parse_from([
            "elective-allocation",
            "allocate",
            "--package",
            "cs-iii",
            "--json",
        ])
        .expect("parses");
        match cli.command {
            Some(Command::Allocate(args)) => {
                assert_eq!(args.package, "cs-iii");
                assert!(args.json);
                assert!(args.data_dir.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn window_rejects_unreadable_timestamps() {
        assert!(Cli::try_parse_from([
            "elective-allocation",
            "window",
            "--package",
            "cs-iii",
            "--now",
            "tomorrow",
        ])
        .is_err());
    }
}
