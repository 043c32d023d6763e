use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};

#[cfg(test)]
use mockall::automock;

use crate::types::Hello;

/// Calls the reconciler makes against the API server.
///
/// Lookups return `Ok(None)` when the object does not exist, every other
/// failure is passed through untouched.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    async fn get_hello(&self, namespace: &str, name: &str) -> Result<Option<Hello>, kube::Error>;

    async fn get_service(&self, namespace: &str, name: &str)
        -> Result<Option<Service>, kube::Error>;

    async fn create_service(&self, namespace: &str, service: &Service)
        -> Result<Service, kube::Error>;

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, kube::Error>;

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, kube::Error>;

    /// Overwrite an existing Deployment. The object's resource version is
    /// sent along, so a concurrent writer makes this fail with a conflict.
    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, kube::Error>;
}

#[async_trait]
impl KubeClient for Client {
    async fn get_hello(&self, namespace: &str, name: &str) -> Result<Option<Hello>, kube::Error> {
        Api::<Hello>::namespaced(self.clone(), namespace)
            .get_opt(name)
            .await
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, kube::Error> {
        Api::<Service>::namespaced(self.clone(), namespace)
            .get_opt(name)
            .await
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<Service, kube::Error> {
        Api::<Service>::namespaced(self.clone(), namespace)
            .create(&PostParams::default(), service)
            .await
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, kube::Error> {
        Api::<Deployment>::namespaced(self.clone(), namespace)
            .get_opt(name)
            .await
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, kube::Error> {
        Api::<Deployment>::namespaced(self.clone(), namespace)
            .create(&PostParams::default(), deployment)
            .await
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, kube::Error> {
        Api::<Deployment>::namespaced(self.clone(), namespace)
            .replace(&deployment.name_any(), &PostParams::default(), deployment)
            .await
    }
}
