use crate::{
    admission::Admission,
    annotations::Extractor,
    core::{validate, DefaultBackend, IpNet, SecurityConfiguration, Settings},
    index::Index,
    index_chain::IndexChain,
    k8s,
    metrics::{AdmissionMetrics, IndexMetrics},
    resolver::{ClusterResolver, ServiceIndex},
};
use anyhow::{bail, Result};
use clap::Parser;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "ingress", about = "An ingress annotation controller")]
pub struct Args {
    #[clap(
        long,
        default_value = "ingress_controller=info,warn",
        env = "INGRESS_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    server: kubert::ServerArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Disables the admission controller server.
    #[clap(long)]
    admission_controller_disabled: bool,

    /// The prefix of every annotation key the controller reads.
    #[clap(long, default_value = crate::core::DEFAULT_ANNOTATIONS_PREFIX)]
    annotations_prefix: String,

    /// The highest annotation risk admitted: Low, Medium, High or Critical.
    #[clap(long, default_value = "High")]
    annotations_risk_level: String,

    /// Checks annotation values against their validators.
    ///
    /// When disabled, invalid values are still ignored during extraction,
    /// but the admission controller no longer rejects them.
    #[clap(long, default_value = "true", action = clap::ArgAction::Set)]
    enable_annotation_validation: bool,

    #[clap(flatten)]
    defaults: DefaultsArgs,
}

/// Values applied to Ingresses that do not set the corresponding annotation.
#[derive(Debug, clap::Args)]
struct DefaultsArgs {
    #[clap(long = "default-wallarm-mode", default_value = "off")]
    wallarm_mode: String,

    #[clap(long = "default-wallarm-mode-allow-override", default_value = "on")]
    wallarm_mode_allow_override: String,

    #[clap(long = "default-wallarm-fallback", default_value = "on")]
    wallarm_fallback: String,

    #[clap(long = "default-wallarm-application")]
    wallarm_instance: Option<String>,

    #[clap(long = "default-wallarm-block-page")]
    wallarm_block_page: Option<String>,

    #[clap(long = "default-wallarm-acl-block-page")]
    wallarm_acl_block_page: Option<String>,

    #[clap(long = "default-wallarm-parse-response", default_value = "on")]
    wallarm_parse_response: String,

    #[clap(long = "default-wallarm-parse-websocket", default_value = "off")]
    wallarm_parse_websocket: String,

    #[clap(long = "default-wallarm-unpack-response", default_value = "on")]
    wallarm_unpack_response: String,

    /// Comma-separated parsers disabled by default.
    #[clap(long = "default-wallarm-parser-disable", value_delimiter = ',')]
    wallarm_parser_disable: Vec<String>,

    #[clap(long = "default-wallarm-partner-client-uuid")]
    wallarm_partner_client_uuid: Option<String>,

    /// Bytes per second sent to each client. Zero disables the limit.
    #[clap(long = "default-limit-rate", default_value = "0")]
    limit_rate: i64,

    #[clap(long = "default-limit-rate-after", default_value = "0")]
    limit_rate_after: i64,

    /// Client networks exempt from rate limiting.
    #[clap(long = "default-limit-allowlist")]
    limit_allowlist: Option<IpNets>,

    /// Client networks permitted to reach every location.
    #[clap(long = "default-allowlist-source-range")]
    allowlist_source_range: Option<IpNets>,
}

#[derive(Clone, Debug)]
struct IpNets(Vec<IpNet>);

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            server,
            admission_controller_disabled,
            annotations_prefix,
            annotations_risk_level,
            enable_annotation_validation,
            defaults,
        } = self;

        let server = if admission_controller_disabled {
            None
        } else {
            Some(server)
        };

        let settings =
            Settings::new(annotations_prefix).with_validation(enable_annotation_validation);
        let extractor = Arc::new(Extractor::new(settings));

        let services = ServiceIndex::shared();
        let resolver = ClusterResolver::new(
            defaults.into(),
            SecurityConfiguration {
                annotations_risk_level,
            },
            services.clone(),
        );

        let mut prom = <Registry>::default();
        let admission_metrics =
            AdmissionMetrics::register(prom.sub_registry_with_prefix("ingress_admission"));
        let index_metrics = IndexMetrics::register(prom.sub_registry_with_prefix("ingress_index"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .with_optional_server(server)
            .build()
            .await?;

        let index = Index::shared(extractor.clone(), resolver.clone(), index_metrics);

        // Spawn resource watches.

        // Services are indexed before the Ingresses that select them are
        // extracted again.
        let svcs = runtime.watch_all::<k8s::Service>(watcher::Config::default());
        let services_indexes = IndexChain::shared(services, index.clone());
        tokio::spawn(
            kubert::index::namespaced(services_indexes, svcs).instrument(info_span!("services")),
        );

        let ingresses = runtime.watch_all::<k8s::Ingress>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(index.clone(), ingresses)
                .instrument(info_span!("ingresses")),
        );

        let mut changes = index.read().changes();
        tokio::spawn(
            async move {
                while changes.changed().await.is_ok() {
                    let generation = *changes.borrow_and_update();
                    debug!(generation, "Ingress configuration updated");
                }
            }
            .instrument(info_span!("changes")),
        );

        let admission = Admission::new(extractor, resolver, admission_metrics);
        let runtime = runtime.spawn_server(move || admission.clone());

        info!("Ingress controller running");

        // Runs until a shutdown signal is received and the watches have drained.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

// === impl DefaultsArgs ===

impl From<DefaultsArgs> for DefaultBackend {
    fn from(args: DefaultsArgs) -> Self {
        let DefaultsArgs {
            wallarm_mode,
            wallarm_mode_allow_override,
            wallarm_fallback,
            wallarm_instance,
            wallarm_block_page,
            wallarm_acl_block_page,
            wallarm_parse_response,
            wallarm_parse_websocket,
            wallarm_unpack_response,
            wallarm_parser_disable,
            wallarm_partner_client_uuid,
            limit_rate,
            limit_rate_after,
            limit_allowlist,
            allowlist_source_range,
        } = args;

        DefaultBackend {
            wallarm_mode,
            wallarm_mode_allow_override,
            wallarm_fallback,
            wallarm_instance: wallarm_instance.unwrap_or_default(),
            wallarm_block_page: wallarm_block_page.unwrap_or_default(),
            wallarm_acl_block_page: wallarm_acl_block_page.unwrap_or_default(),
            wallarm_parse_response,
            wallarm_parse_websocket,
            wallarm_unpack_response,
            wallarm_parser_disable,
            wallarm_partner_client_uuid: wallarm_partner_client_uuid.unwrap_or_default(),
            limit_rate,
            limit_rate_after,
            limit_allowlist: limit_allowlist.map(|IpNets(nets)| nets).unwrap_or_default(),
            allowlist_source_range: allowlist_source_range
                .map(|IpNets(nets)| nets)
                .unwrap_or_default(),
        }
    }
}

// === impl IpNets ===

impl std::str::FromStr for IpNets {
    type Err = anyhow::Error;

    /// Parses a comma-separated list of networks. Bare addresses are
    /// accepted as single-host networks.
    fn from_str(s: &str) -> Result<Self> {
        validate::parse_cidrs(s).map(Self).map_err(Into::into)
    }
}
