use crate::{
    core::Condition,
    index::{self, Event, KubeResolver, RegistryMetrics},
    k8s::{self, Api, ConfigMap, Secret, Service, WatchEvent},
    routes::{self, Routes},
};
use anyhow::{bail, Result};
use clap::Parser;
use futures::prelude::*;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(
    name = "auth-proxy-targets",
    about = "Discovers auth proxy targets from cluster objects"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "auth_proxy=info,warn",
        env = "AUTH_PROXY_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Only objects in these namespaces define targets. All namespaces are used by default.
    #[clap(long, value_delimiter = ',')]
    namespaces: Option<Vec<String>>,

    /// Restricts the services that are watched.
    #[clap(long)]
    service_selector: Option<String>,

    /// Config maps holding targets files. Config maps are not watched unless this is set.
    #[clap(long)]
    configmap_selector: Option<String>,

    /// Secrets holding targets files. Secrets are not watched unless this is set.
    #[clap(long)]
    secret_selector: Option<String>,

    #[clap(long, value_delimiter = ',')]
    default_allowed_emails: Vec<String>,

    #[clap(long, value_delimiter = ',')]
    default_email_domains: Vec<String>,

    #[clap(long, value_delimiter = ',')]
    default_github_orgs: Vec<String>,

    #[clap(long, value_delimiter = ',')]
    default_github_teams: Vec<String>,

    #[clap(long, value_delimiter = ',')]
    default_github_users: Vec<String>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let default_conditions = self.default_conditions();
        let Self {
            admin,
            client,
            log_level,
            log_format,
            namespaces,
            service_selector,
            configmap_selector,
            secret_selector,
            ..
        } = self;

        let mut prom = <Registry>::default();
        let metrics = RegistryMetrics::register(prom.sub_registry_with_prefix("auth_proxy_targets"));

        let runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let client = runtime.client();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Spawn resource watches.

        let services = k8s::watch(
            Api::<Service>::all(client.clone()),
            selected(service_selector.as_deref()),
        );
        tokio::spawn(forward(services, events_tx.clone()).instrument(info_span!("services")));

        if let Some(selector) = configmap_selector {
            let configmaps = k8s::watch(
                Api::<ConfigMap>::all(client.clone()),
                selected(Some(&selector)),
            );
            tokio::spawn(
                forward(configmaps, events_tx.clone()).instrument(info_span!("configmaps")),
            );
        }

        if let Some(selector) = secret_selector {
            let secrets = k8s::watch(Api::<Secret>::all(client.clone()), selected(Some(&selector)));
            tokio::spawn(forward(secrets, events_tx.clone()).instrument(info_span!("secrets")));
        }
        drop(events_tx);

        let config = index::Config {
            namespaces: namespaces.map(|ns| ns.into_iter().collect()),
            default_conditions,
        };
        let resolver = Arc::new(KubeResolver::new(client));
        let (registry, targets_rx) = index::Registry::new(config, resolver, metrics);

        // The registry publishes deletions for every target once shutdown is signaled, and
        // the route table holds the shutdown handle until it has consumed them.
        let shutdown = runtime.shutdown_handle();
        tokio::spawn(
            registry
                .run(UnboundedReceiverStream::new(events_rx), shutdown.signaled())
                .instrument(info_span!("registry")),
        );

        let routes = Routes::shared();
        let drain = runtime.shutdown_handle();
        tokio::spawn(
            async move {
                routes::run(routes, targets_rx).await;
                drop(drain);
            }
            .instrument(info_span!("routes")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background
        // tasks to complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }

    /// Builds the conditions applied to targets that don't declare GitHub conditions.
    fn default_conditions(&self) -> Vec<Condition> {
        let lowercase = |list: &[String]| -> Vec<String> {
            list.iter().map(|s| s.trim().to_lowercase()).collect()
        };
        let mut conditions = Vec::new();
        if !self.default_github_orgs.is_empty() {
            conditions.push(Condition::GithubAllowedOrganizations(lowercase(
                &self.default_github_orgs,
            )));
        }
        if !self.default_github_teams.is_empty() {
            conditions.push(Condition::GithubAllowedTeams(lowercase(
                &self.default_github_teams,
            )));
        }
        if !self.default_github_users.is_empty() {
            conditions.push(Condition::GithubAllowedUsers(lowercase(
                &self.default_github_users,
            )));
        }
        if !self.default_email_domains.is_empty() {
            conditions.push(Condition::EmailDomains(self.default_email_domains.clone()));
        }
        if !self.default_allowed_emails.is_empty() {
            conditions.push(Condition::AllowedEmails(self.default_allowed_emails.clone()));
        }
        conditions
    }
}

fn selected(selector: Option<&str>) -> watcher::Config {
    match selector {
        Some(selector) => watcher::Config::default().labels(selector),
        None => watcher::Config::default(),
    }
}

/// Feeds a watch into the registry until the registry stops.
async fn forward<K>(watch: impl Stream<Item = WatchEvent<K>>, tx: mpsc::UnboundedSender<Event>)
where
    Event: From<WatchEvent<K>>,
{
    info!("watching");
    tokio::pin!(watch);
    while let Some(event) = watch.next().await {
        if tx.send(event.into()).is_err() {
            tracing::debug!("registry stopped");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_conditions() {
        let args = Args::try_parse_from([
            "auth-proxy-targets",
            "--default-github-orgs=Acme,Umbrella",
            "--default-email-domains=example.com",
            "--default-allowed-emails=Jane@Example.com",
        ])
        .unwrap();
        assert_eq!(
            args.default_conditions(),
            vec![
                Condition::GithubAllowedOrganizations(vec![
                    "acme".to_string(),
                    "umbrella".to_string()
                ]),
                Condition::EmailDomains(vec!["example.com".to_string()]),
                Condition::AllowedEmails(vec!["Jane@Example.com".to_string()]),
            ]
        );
    }

    #[test]
    fn namespaces_and_selectors() {
        let args = Args::try_parse_from([
            "auth-proxy-targets",
            "--namespaces=ns-0,ns-1",
            "--configmap-selector=kube-auth-proxy/targets=true",
        ])
        .unwrap();
        assert_eq!(
            args.namespaces,
            Some(vec!["ns-0".to_string(), "ns-1".to_string()])
        );
        assert_eq!(args.service_selector, None);
        assert_eq!(
            args.configmap_selector.as_deref(),
            Some("kube-auth-proxy/targets=true")
        );
        assert!(args.default_conditions().is_empty());
    }
}
