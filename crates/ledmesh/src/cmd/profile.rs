use ledmesh_proto::Event;

use crate::cmd::client::{unexpected, RegistryClient};
use crate::cmd::{ProfileAction, ProfileArgs};
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_profile, print_profile_status, print_profiles, OutputFormat};

pub async fn run(args: ProfileArgs, format: OutputFormat) -> CliResult<i32> {
    let client = RegistryClient::connect(&args.registry).await?;
    let result = apply(&client, args.action, format).await;
    client.close();
    result.map(|()| SUCCESS)
}

async fn apply(client: &RegistryClient, action: ProfileAction, format: OutputFormat) -> CliResult<()> {
    match action {
        ProfileAction::Create { name, routes } => {
            let reply = client
                .request(Event::CreateProfile { name, io: routes })
                .await?;
            match reply {
                Event::ProfileCreated { profile } => {
                    print_profile(&profile, format);
                    Ok(())
                }
                Event::Ack { error: Some(reason) } => Err(CliError::new(FAILURE, reason)),
                other => Err(unexpected(&other)),
            }
        }
        ProfileAction::Enable { id } => {
            client.command(Event::EnableProfile { id: id.clone() }).await?;
            print_profile_status(id.as_str(), "enabled", format);
            Ok(())
        }
        ProfileAction::Disable { id } => {
            client.command(Event::DisableProfile { id: id.clone() }).await?;
            print_profile_status(id.as_str(), "disabled", format);
            Ok(())
        }
        ProfileAction::Delete { id } => {
            client.command(Event::DeleteProfile { id: id.clone() }).await?;
            print_profile_status(id.as_str(), "deleted", format);
            Ok(())
        }
        ProfileAction::List => {
            let state = client.state().await?;
            print_profiles(&state, format);
            Ok(())
        }
    }
}
