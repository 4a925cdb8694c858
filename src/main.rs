use tube_mp3_server::utils::logging::init_tracing;
use tube_mp3_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(None);

    let state = AppState::load();
    tracing::info!(
        "Using {:?} strategy with {:?} naming via {}",
        state.config.download.strategy,
        state.config.download.naming,
        state.config.tool.program
    );

    let mut settings: Vec<_> = state.config.to_env_vars().into_iter().collect();
    settings.sort();
    for (key, value) in settings {
        tracing::debug!("{}={}", key, value);
    }

    tube_mp3_server::serve(state).await
}
