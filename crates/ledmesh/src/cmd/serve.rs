use ledmesh_registry::{JsonFileStateHolder, RegistryConfig, RegistryServer};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{io_error, registry_error, CliResult, SUCCESS};

pub async fn run(args: ServeArgs) -> CliResult<i32> {
    let config = RegistryConfig {
        port: Some(args.port),
        state_path: args.state,
        ..RegistryConfig::default()
    };
    let store = JsonFileStateHolder::new(config.state_path.clone());
    let running = RegistryServer::start(store, &config)
        .map_err(|err| registry_error("registry start failed", err))?;
    let listener = running
        .listen(&config)
        .await
        .map_err(|err| registry_error("listen failed", err))?;

    if let Some(addr) = listener.local_addr() {
        info!(
            addr = %addr,
            state = %config.state_path.display(),
            "registry listening"
        );
    }
    let accept = tokio::spawn(listener.run());

    tokio::signal::ctrl_c()
        .await
        .map_err(|err| io_error("signal handler setup failed", err))?;
    info!("shutting down");
    running.endpoint.shutdown();
    let _ = accept.await;
    Ok(SUCCESS)
}
