use std::sync::Arc;

use futures::future::join_all;
use promptrelay_core::{
    DeploymentOutcome, InputMapping, InvocationPlan, PersonaTarget, RelayError, UpstreamStage,
};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::client::{DeploymentClient, DeploymentRequest};

const PERSONA_SEPARATOR: &str = "\n\n";

#[derive(Clone)]
pub struct DeploymentInvoker {
    client: Arc<dyn DeploymentClient>,
}

impl DeploymentInvoker {
    pub fn new(client: Arc<dyn DeploymentClient>) -> Self {
        Self { client }
    }

    /// Executes a plan. Every failure is folded into the returned outcome.
    pub async fn run(&self, plan: &InvocationPlan) -> DeploymentOutcome {
        match plan {
            InvocationPlan::Single { deployment_key, inputs, context } => {
                self.single(deployment_key, inputs, context.clone()).await
            }
            InvocationPlan::ImageChain { prompt_key, image_key, inputs } => {
                self.image_chain(prompt_key, image_key, inputs).await
            }
            InvocationPlan::FanOut { personas, inputs } => self.fan_out(personas, inputs).await,
        }
    }

    async fn single(
        &self,
        deployment_key: &str,
        inputs: &InputMapping,
        context: Option<Map<String, Value>>,
    ) -> DeploymentOutcome {
        let stage =
            if context.is_some() { UpstreamStage::Conversation } else { UpstreamStage::Single };
        let request = DeploymentRequest::new(deployment_key, inputs.clone()).with_context(context);

        match self.client.invoke(&request).await {
            Ok(response) => match response.text() {
                Some(content) => {
                    info!(
                        event_name = "deploy.invoke.succeeded",
                        deployment_key,
                        content_chars = content.chars().count(),
                        "deployment returned content"
                    );
                    DeploymentOutcome::Text(content.to_owned())
                }
                None => {
                    warn!(
                        event_name = "deploy.invoke.empty",
                        deployment_key, "deployment returned no content"
                    );
                    DeploymentOutcome::Failed(RelayError::UpstreamEmpty {
                        deployment_key: deployment_key.to_owned(),
                    })
                }
            },
            Err(error) => {
                warn!(
                    event_name = "deploy.invoke.failed",
                    deployment_key,
                    error = %error,
                    "deployment request could not be processed"
                );
                DeploymentOutcome::Failed(RelayError::UpstreamFailure {
                    deployment_key: deployment_key.to_owned(),
                    stage,
                    detail: error.to_string(),
                })
            }
        }
    }

    async fn image_chain(
        &self,
        prompt_key: &str,
        image_key: &str,
        inputs: &InputMapping,
    ) -> DeploymentOutcome {
        let prompt_request = DeploymentRequest::new(prompt_key, inputs.clone());
        let prompt = match self.client.invoke(&prompt_request).await {
            Ok(response) => response.text().map(str::to_owned),
            Err(error) => {
                warn!(
                    event_name = "deploy.image.prompt_failed",
                    deployment_key = prompt_key,
                    error = %error,
                    "image prompt deployment failed"
                );
                return DeploymentOutcome::Failed(RelayError::PromptGenerationFailed {
                    deployment_key: prompt_key.to_owned(),
                    detail: error.to_string(),
                });
            }
        };
        let Some(prompt) = prompt else {
            warn!(
                event_name = "deploy.image.prompt_failed",
                deployment_key = prompt_key,
                "image prompt deployment returned no content"
            );
            return DeploymentOutcome::Failed(RelayError::PromptGenerationFailed {
                deployment_key: prompt_key.to_owned(),
                detail: "no content returned".to_owned(),
            });
        };

        let image_request =
            DeploymentRequest::new(image_key, InputMapping::new().with("prompt", prompt));
        match self.client.invoke(&image_request).await {
            Ok(response) => match response.url() {
                Some(url) => {
                    info!(
                        event_name = "deploy.image.succeeded",
                        deployment_key = image_key,
                        "image deployment returned a url"
                    );
                    DeploymentOutcome::Image { url: url.to_owned() }
                }
                None => {
                    warn!(
                        event_name = "deploy.image.render_failed",
                        deployment_key = image_key,
                        "image deployment returned no url"
                    );
                    DeploymentOutcome::Failed(RelayError::ImageGenerationFailed {
                        deployment_key: image_key.to_owned(),
                        detail: "no image url returned".to_owned(),
                    })
                }
            },
            Err(error) => {
                warn!(
                    event_name = "deploy.image.render_failed",
                    deployment_key = image_key,
                    error = %error,
                    "image deployment failed"
                );
                DeploymentOutcome::Failed(RelayError::ImageGenerationFailed {
                    deployment_key: image_key.to_owned(),
                    detail: error.to_string(),
                })
            }
        }
    }

    async fn fan_out(
        &self,
        personas: &[PersonaTarget],
        inputs: &InputMapping,
    ) -> DeploymentOutcome {
        // join_all yields results in input order, whatever order the calls finish in.
        let sections =
            join_all(personas.iter().map(|persona| self.persona_section(persona, inputs))).await;
        DeploymentOutcome::Text(sections.join(PERSONA_SEPARATOR))
    }

    async fn persona_section(&self, persona: &PersonaTarget, inputs: &InputMapping) -> String {
        let request = DeploymentRequest::new(&persona.deployment_key, inputs.clone());
        let failure = match self.client.invoke(&request).await {
            Ok(response) => match response.text() {
                Some(content) => return format!("Persona {}\n{content}", persona.label),
                None => "no content returned".to_owned(),
            },
            Err(error) => error.to_string(),
        };

        warn!(
            event_name = "deploy.persona.failed",
            persona = %persona.label,
            deployment_key = %persona.deployment_key,
            error = %failure,
            "persona deployment failed"
        );
        format!("An error occurred while processing your request for persona: {}", persona.label)
    }
}
