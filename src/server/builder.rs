//! GroupBuilder for registering controllers and resolving relationships

use super::group::{Group, InverseLookup};
use crate::config::ApiConfig;
use crate::controller::{Controller, Resource};
use crate::core::error::ConfigError;
use crate::core::model::{Model, RelationKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for a [`Group`]
///
/// Registration order does not matter: relationships are resolved in
/// [`GroupBuilder::build`], which fails on any dangling target or inverse.
///
/// # Example
///
/// ```ignore
/// let group = GroupBuilder::new()
///     .base_url("/api")
///     .register(Controller::new(post_meta(), store.clone()))
///     .register(Controller::new(comment_meta(), store.clone()))
///     .build()?;
///
/// let app = Router::new().nest("/api", group.router());
/// ```
pub struct GroupBuilder {
    base_url: String,
    config: Option<ApiConfig>,
    resources: Vec<Arc<dyn Resource>>,
}

impl GroupBuilder {
    pub fn new() -> Self {
        Self {
            base_url: String::new(),
            config: None,
            resources: Vec::new(),
        }
    }

    /// Prefix for generated links, e.g. `/api`
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply a configuration: its base URL and per-resource overrides
    ///
    /// Overrides apply to controllers registered after this call.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self = self.base_url(config.base_url.clone());
        self.config = Some(config);
        self
    }

    /// Register a controller
    pub fn register<M: Model>(mut self, controller: Controller<M>) -> Self {
        let overrides = self
            .config
            .as_ref()
            .and_then(|config| config.resource(controller.schema().resource.as_str()));
        let controller = match overrides {
            Some(overrides) => controller.apply_config(overrides),
            None => controller,
        };
        self.resources.push(Arc::new(controller));
        self
    }

    /// Register an already shared resource
    pub fn register_resource(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.push(resource);
        self
    }

    /// Validate every relationship and build the group
    pub fn build(self) -> Result<Arc<Group>, ConfigError> {
        let mut resources: HashMap<String, Arc<dyn Resource>> = HashMap::new();

        for resource in self.resources {
            let schema = resource.schema();

            let mut seen = HashSet::new();
            for field in &schema.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(ConfigError::DuplicateField {
                        resource: schema.resource.clone(),
                        field: field.name.clone(),
                    });
                }
            }

            let name = schema.resource.clone();
            if resources.contains_key(&name) {
                return Err(ConfigError::DuplicateResource(name));
            }
            resources.insert(name, resource);
        }

        let inverses = resolve_inverses(&resources)?;

        let group = Arc::new(Group {
            base_url: self.base_url,
            resources,
            inverses,
        });

        for resource in group.resources.values() {
            resource.attach(Arc::downgrade(&group))?;
        }

        tracing::info!(
            resources = ?group.resource_names(),
            inverses = group.inverses.len(),
            "resource group built"
        );

        Ok(group)
    }

    /// Build the group and serve it with graceful shutdown
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let base_url = self.base_url.clone();
        let group = self.build()?;
        let app = if base_url.is_empty() {
            group.router()
        } else {
            axum::Router::new().nest(&base_url, group.router())
        };

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for GroupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Check targets and resolve the storage location of every has-many inverse
fn resolve_inverses(
    resources: &HashMap<String, Arc<dyn Resource>>,
) -> Result<HashMap<(String, String), InverseLookup>, ConfigError> {
    let mut inverses = HashMap::new();

    for (name, resource) in resources {
        for (field, relationship) in resource.schema().relationships() {
            let target = resources.get(&relationship.target).ok_or_else(|| {
                ConfigError::MissingResource {
                    resource: name.clone(),
                    field: field.name.clone(),
                    target: relationship.target.clone(),
                }
            })?;

            if relationship.kind != RelationKind::HasMany {
                continue;
            }

            let inverse = relationship.inverse.clone().unwrap_or_default();
            let target_schema = target.schema();
            let key = target_schema
                .relationship(&inverse)
                .filter(|(_, candidate)| {
                    matches!(candidate.kind, RelationKind::ToOne | RelationKind::ToMany)
                        && candidate.target == *name
                })
                .and_then(|(candidate, _)| candidate.key.clone())
                .ok_or_else(|| ConfigError::MissingInverse {
                    resource: name.clone(),
                    field: field.name.clone(),
                    target: relationship.target.clone(),
                    inverse: inverse.clone(),
                })?;

            inverses.insert(
                (name.clone(), field.name.clone()),
                InverseLookup {
                    collection: target_schema.collection.clone(),
                    key,
                },
            );
        }
    }

    Ok(inverses)
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
