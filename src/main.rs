mod config;
mod reconcile;
mod store;
mod types;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures_util::stream::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::runtime::controller::Controller;
use kube::runtime::watcher;
use kube::{Client, Resource};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    let client = Client::try_default().await?;

    let data = reconcile::Data {
        client: Arc::new(client.clone()),
        requeue_after: config.requeue_after(),
        error_backoff: config.error_backoff(),
    };

    tracing::info!(namespace = ?config.namespace, "starting hello controller");

    let namespace = config.namespace.as_deref();
    Controller::new(
        scoped_api::<types::Hello>(&client, namespace),
        watcher::Config::default(),
    )
    .owns(
        scoped_api::<Service>(&client, namespace),
        watcher::Config::default(),
    )
    .owns(
        scoped_api::<Deployment>(&client, namespace),
        watcher::Config::default(),
    )
    .shutdown_on_signal()
    .run(reconcile::reconcile, reconcile::error_policy, Arc::new(data))
    .for_each(|res| async move {
        match res {
            Ok(o) => tracing::info!("reconciled {:?}", o),
            Err(e) => tracing::warn!("reconcile failed: {}", e),
        }
    })
    .await;

    tracing::info!("controller terminated");

    Ok(())
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}
