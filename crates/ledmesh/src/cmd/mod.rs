use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use ledmesh_proto::{IoConfig, ProfileId};

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

mod client;
pub mod profile;
pub mod serve;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the registry server.
    Serve(ServeArgs),
    /// Create, enable, disable or delete routing profiles.
    Profile(ProfileArgs),
    /// Show nodes and profiles known to a running registry.
    Status(RegistryArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => runtime()?.block_on(serve::run(args)),
        Command::Profile(args) => runtime()?.block_on(profile::run(args, format)),
        Command::Status(args) => runtime()?.block_on(status::run(args, format)),
        Command::Version(args) => version::run(args),
    }
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// TCP port to accept node and operator connections on.
    #[arg(long, env = "LEDMESH_PORT", default_value_t = ledmesh_registry::DEFAULT_PORT)]
    pub port: u16,
    /// File holding the persisted registry state.
    #[arg(long, env = "LEDMESH_STATE", default_value = "ledmesh-state.json")]
    pub state: PathBuf,
}

#[derive(Args, Debug)]
pub struct RegistryArgs {
    /// Registry address to connect to.
    #[arg(long, env = "LEDMESH_REGISTRY", default_value = "127.0.0.1:2110", global = true)]
    pub registry: SocketAddr,
    /// Connect and request timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,
    #[command(subcommand)]
    pub action: ProfileAction,
}

#[derive(Subcommand, Debug)]
pub enum ProfileAction {
    /// Create a profile from INPUT=OUTPUT routes.
    Create {
        name: String,
        #[arg(required = true, value_name = "INPUT=OUTPUT")]
        routes: Vec<IoConfig>,
    },
    /// Start routing a profile.
    Enable { id: ProfileId },
    /// Stop routing a profile.
    Disable { id: ProfileId },
    /// Remove an inactive profile.
    Delete { id: ProfileId },
    /// List stored profiles.
    List,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
