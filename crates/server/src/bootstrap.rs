use std::sync::Arc;

use promptrelay_core::config::AppConfig;
use promptrelay_core::{CommandRegistry, RegistryError};
use promptrelay_deploy::{DeploymentError, DeploymentInvoker, HttpDeploymentClient};
use promptrelay_slack::{
    BotIdentity, Dispatcher, SlackApiError, SlackMessenger, SlackWebClient, TokioSpawner,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub bot: BotIdentity,
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("deployment client setup failed: {0}")]
    DeploymentClient(#[source] DeploymentError),
    #[error("slack client setup failed: {0}")]
    SlackClient(#[source] SlackApiError),
    #[error("slack auth.test failed, check the bot token: {0}")]
    SlackAuth(#[source] SlackApiError),
}

/// Builds the clients and resolves the bot's own user id, which event
/// handling needs to ignore the bot's own posts.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let registry = CommandRegistry::new(config.deployment.key_prefix.clone())?;
    let deployments = HttpDeploymentClient::from_config(&config.deployment)
        .map_err(BootstrapError::DeploymentClient)?;
    let slack: Arc<dyn SlackMessenger> =
        Arc::new(SlackWebClient::from_config(&config.slack).map_err(BootstrapError::SlackClient)?);

    let bot = slack.auth_test().await.map_err(BootstrapError::SlackAuth)?;
    info!(
        event_name = "system.bootstrap.slack_identity",
        bot_user_id = %bot.user_id,
        team = bot.team.as_deref().unwrap_or("unknown"),
        "resolved slack bot identity"
    );

    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        DeploymentInvoker::new(Arc::new(deployments)),
        slack,
        Arc::new(TokioSpawner),
        bot.user_id.clone(),
    );
    info!(
        event_name = "system.bootstrap.ready",
        deployment_endpoint = %config.deployment.base_url,
        key_prefix = %dispatcher.registry().key_prefix(),
        "application bootstrap complete"
    );

    Ok(Application { config, bot, dispatcher: Arc::new(dispatcher) })
}
