use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use thiserror::Error;
use tracing::Instrument;

use crate::store::KubeClient;
use crate::types::Hello;

const APP_LABEL: &str = "app";
const CONTAINER_IMAGE: &str = "busybox";
const ECHO_COMMAND: &str = "/bin/echo";

const SERVICE_TYPE: &str = "NodePort";
const SERVICE_PROTOCOL: &str = "TCP";
const SERVICE_NODE_PORT: i32 = 31321;
const SERVICE_PORT: i32 = 8375;
const SERVICE_TARGET_PORT: i32 = 8395;

pub struct Data {
    pub client: Arc<dyn KubeClient>,
    /// Delay of the follow-up pass scheduled after a create or update.
    pub requeue_after: Duration,
    pub error_backoff: Duration,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),
    #[error("Failed to get hello: {0}")]
    GetHelloFailed(#[source] kube::Error),
    #[error("Failed to get service: {0}")]
    GetServiceFailed(#[source] kube::Error),
    #[error("Failed to create service: {0}")]
    CreateServiceFailed(#[source] kube::Error),
    #[error("Failed to get deployment: {0}")]
    GetDeploymentFailed(#[source] kube::Error),
    #[error("Failed to create deployment: {0}")]
    CreateDeploymentFailed(#[source] kube::Error),
    #[error("Failed to update deployment: {0}")]
    UpdateDeploymentFailed(#[source] kube::Error),
}

/// Controller entry point. The cached object only supplies the identity, the
/// pass itself always reads fresh state.
pub async fn reconcile(hello: Arc<Hello>, ctx: Arc<Data>) -> Result<Action, Error> {
    reconcile_key(&ObjectRef::from_obj(&*hello), &ctx).await
}

/// Runs one reconciliation pass for the Hello identified by `key`.
///
/// At most one create or update is issued per pass; whenever one is, the
/// pass returns right away with a requeue after `ctx.requeue_after` so the
/// next step observes the new object.
pub async fn reconcile_key(key: &ObjectRef<Hello>, ctx: &Data) -> Result<Action, Error> {
    let namespace = key
        .namespace
        .as_deref()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let span = tracing::info_span!("reconcile", name = %key.name, %namespace);
    reconcile_pass(namespace, &key.name, ctx)
        .instrument(span)
        .await
}

async fn reconcile_pass(namespace: &str, name: &str, ctx: &Data) -> Result<Action, Error> {
    let client = ctx.client.as_ref();

    let hello = match client
        .get_hello(namespace, name)
        .await
        .map_err(Error::GetHelloFailed)?
    {
        Some(hello) => hello,
        None => {
            tracing::info!("hello not found, assuming it was deleted");
            return Ok(Action::await_change());
        }
    };

    tracing::info!(msg = %hello.spec.msg, "observed hello message");

    let service = client
        .get_service(namespace, name)
        .await
        .map_err(Error::GetServiceFailed)?;
    if service.is_none() {
        let service = build_service(&hello)?;
        client
            .create_service(namespace, &service)
            .await
            .map_err(Error::CreateServiceFailed)?;
        tracing::info!("created service");
        return Ok(Action::requeue(ctx.requeue_after));
    }

    let mut deployment = match client
        .get_deployment(namespace, name)
        .await
        .map_err(Error::GetDeploymentFailed)?
    {
        Some(deployment) => deployment,
        None => {
            let deployment = build_deployment(&hello)?;
            client
                .create_deployment(namespace, &deployment)
                .await
                .map_err(Error::CreateDeploymentFailed)?;
            tracing::info!(replicas = hello.spec.size, "created deployment");
            return Ok(Action::requeue(ctx.requeue_after));
        }
    };

    let desired = hello.spec.size;
    let current = deployment.spec.as_ref().and_then(|spec| spec.replicas);
    if current != Some(desired) {
        deployment.spec.get_or_insert_with(Default::default).replicas = Some(desired);
        client
            .replace_deployment(namespace, &deployment)
            .await
            .map_err(Error::UpdateDeploymentFailed)?;
        tracing::info!(?current, desired, "scaled deployment");
        return Ok(Action::requeue(ctx.requeue_after));
    }

    tracing::debug!(replicas = desired, "hello is up to date");
    Ok(Action::await_change())
}

pub fn error_policy(hello: Arc<Hello>, error: &Error, ctx: Arc<Data>) -> Action {
    tracing::error!(
        %error,
        name = %hello.name_any(),
        namespace = ?hello.namespace(),
        "reconcile failed"
    );
    Action::requeue(ctx.error_backoff)
}

/// Labels shared by the Service selector and the Deployment's pods.
pub fn labels_for(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), name.to_string())])
}

/// NodePort Service routing to the pods of `hello`'s Deployment.
pub fn build_service(hello: &Hello) -> Result<Service, Error> {
    let mut metadata = child_metadata(hello)?;
    attach_ownership(&mut metadata, hello)?;

    Ok(Service {
        metadata,
        spec: Some(ServiceSpec {
            type_: Some(SERVICE_TYPE.to_string()),
            selector: Some(labels_for(&hello.name_any())),
            ports: Some(vec![ServicePort {
                protocol: Some(SERVICE_PROTOCOL.to_string()),
                node_port: Some(SERVICE_NODE_PORT),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(SERVICE_TARGET_PORT)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        status: None,
    })
}

/// Deployment running `hello.spec.size` busybox pods that echo `hello.spec.msg`.
///
/// The message is passed to the container command as is.
pub fn build_deployment(hello: &Hello) -> Result<Deployment, Error> {
    let mut metadata = child_metadata(hello)?;
    attach_ownership(&mut metadata, hello)?;

    let name = hello.name_any();
    let labels = labels_for(&name);

    Ok(Deployment {
        metadata,
        spec: Some(DeploymentSpec {
            replicas: Some(hello.spec.size),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..LabelSelector::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name,
                        image: Some(CONTAINER_IMAGE.to_string()),
                        command: Some(vec![ECHO_COMMAND.to_string(), hello.spec.msg.clone()]),
                        ..Container::default()
                    }],
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        status: None,
    })
}

fn child_metadata(hello: &Hello) -> Result<ObjectMeta, Error> {
    Ok(ObjectMeta {
        name: Some(
            hello
                .metadata
                .name
                .clone()
                .ok_or(Error::MissingObjectKey(".metadata.name"))?,
        ),
        namespace: Some(
            hello
                .metadata
                .namespace
                .clone()
                .ok_or(Error::MissingObjectKey(".metadata.namespace"))?,
        ),
        ..ObjectMeta::default()
    })
}

/// Marks `owner` as the controller of the child described by `child`, so
/// the garbage collector removes the child together with its Hello.
fn attach_ownership(child: &mut ObjectMeta, owner: &Hello) -> Result<(), Error> {
    let owner_reference = OwnerReference {
        api_version: Hello::api_version(&()).to_string(),
        kind: Hello::kind(&()).to_string(),
        name: owner
            .metadata
            .name
            .clone()
            .ok_or(Error::MissingObjectKey(".metadata.name"))?,
        uid: owner
            .metadata
            .uid
            .clone()
            .ok_or(Error::MissingObjectKey(".metadata.uid"))?,
        controller: Some(true),
        block_owner_deletion: Some(true),
    };
    child
        .owner_references
        .get_or_insert_with(Vec::new)
        .push(owner_reference);
    Ok(())
}
