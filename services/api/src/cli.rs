use crate::demo::{run_demo, DemoArgs};
use crate::infra::{parse_seed_user, SeedUser};
use crate::server;
use clap::{Args, Parser, Subcommand};
use listing_review::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Listing Review Service",
    about = "Run the property listing review service or walk through a scripted review",
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
    /// Walk a listing through submission, rejection, resubmission and sale
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Register a user before serving, as `id:role` (role is `agent` or `admin`). Repeatable.
    #[arg(long = "seed-user", value_parser = parse_seed_user)]
    pub(crate) seed_users: Vec<SeedUser>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
    }
}
