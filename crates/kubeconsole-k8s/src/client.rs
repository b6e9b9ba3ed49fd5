use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};

/// Kubernetes client wrapper
pub struct KubeClient {
    kubeconfig: Kubeconfig,
    current_context: Option<String>,
}

impl KubeClient {
    /// Create a new KubeClient by loading the kubeconfig
    pub fn new() -> Result<Self> {
        let kubeconfig =
            Kubeconfig::read().context("Failed to read kubeconfig. Is kubectl configured?")?;

        let current_context = kubeconfig.current_context.clone();

        Ok(Self {
            kubeconfig,
            current_context,
        })
    }

    /// Names of all contexts in the kubeconfig
    pub fn context_names(&self) -> Vec<String> {
        self.kubeconfig
            .contexts
            .iter()
            .map(|ctx| ctx.name.clone())
            .collect()
    }

    pub fn current_context(&self) -> Option<&str> {
        self.current_context.as_deref()
    }

    /// Namespace configured for a context, if any
    pub fn default_namespace(&self, context_name: &str) -> Option<String> {
        self.kubeconfig
            .contexts
            .iter()
            .find(|ctx| ctx.name == context_name)
            .and_then(|ctx| ctx.context.as_ref())
            .and_then(|ctx| ctx.namespace.clone())
    }

    /// Create a kube::Client for a context (the current one when None)
    pub async fn client_for_context(&self, context_name: Option<&str>) -> Result<kube::Client> {
        let context = context_name
            .map(str::to_string)
            .or_else(|| self.current_context.clone());

        if let Some(name) = &context {
            if !self.kubeconfig.contexts.iter().any(|c| &c.name == name) {
                anyhow::bail!("Context '{}' not found in kubeconfig", name);
            }
        }

        let config = kube::Config::from_custom_kubeconfig(
            self.kubeconfig.clone(),
            &KubeConfigOptions {
                context: context.clone(),
                ..Default::default()
            },
        )
        .await
        .with_context(|| {
            format!(
                "Failed to create config for context: {}",
                context.as_deref().unwrap_or("<current>")
            )
        })?;

        kube::Client::try_from(config).with_context(|| {
            format!(
                "Failed to create client for context: {}",
                context.as_deref().unwrap_or("<current>")
            )
        })
    }
}
