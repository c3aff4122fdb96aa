use crate::demo::{print_departments, run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use saga_recruit::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "SAGA Recruit",
    about = "Run the recruitment tracking service or walk through its workflow",
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
    /// Take one applicant from sign-up to offer and print every step
    Demo(DemoArgs),
    /// List the department codes applicants can choose from
    Departments,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Departments => {
            print_departments();
            Ok(())
        }
    }
}
