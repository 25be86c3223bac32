use crate::cmd::client::RegistryClient;
use crate::cmd::RegistryArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_state, OutputFormat};

pub async fn run(args: RegistryArgs, format: OutputFormat) -> CliResult<i32> {
    let client = RegistryClient::connect(&args).await?;
    let state = client.state().await;
    client.close();
    print_state(&state?, format);
    Ok(SUCCESS)
}
