//! Lattice Federation CLI - inspect member clusters from the host cluster

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kube::{Api, CustomResourceExt};
use serde::Serialize;

use lattice_common::crd::{MemberCluster, MemberClusterStatus};
use lattice_common::kube_utils::{create_client, is_not_found};
use lattice_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use lattice_common::POD_NAMESPACE_ENV;
use lattice_federation::client::{KUBE_API_BURST, KUBE_API_QPS};
use lattice_federation::credentials::{
    ExistingClientProvider, FixedNamespace, NamespaceSource, PodNamespaceEnv,
};
use lattice_federation::{
    observe_cluster, ClientSettings, ClusterClientFactory, DefaultRouteAddress, FixedHostAddress,
    HostAddressSource, MemberClusterApi, SecretCredentialResolver,
};

/// Lattice Federation - member cluster client tooling
#[derive(Parser, Debug)]
#[command(name = "lattice-federation", version, about, long_about = None)]
struct Cli {
    /// Kubeconfig for the host cluster (defaults to in-cluster / $KUBECONFIG)
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Address to match against advertised client CIDRs (defaults to the
    /// source address of the default route)
    #[arg(long, global = true, env = "LATTICE_HOST_IP")]
    host_ip: Option<IpAddr>,

    /// Namespace holding member cluster credential secrets
    #[arg(long, global = true, env = POD_NAMESPACE_ENV)]
    namespace: Option<String>,

    /// Sustained request rate per member cluster client
    #[arg(long, global = true, default_value_t = KUBE_API_QPS)]
    qps: f64,

    /// Request burst per member cluster client
    #[arg(long, global = true, default_value_t = KUBE_API_BURST)]
    burst: u64,

    /// Log as JSON instead of compact text
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a client for a member cluster and report its health and topology
    Inspect {
        /// Name of the MemberCluster
        #[arg(long)]
        cluster: String,
    },
    /// Print the server address this host would use for a member cluster
    SelectEndpoint {
        /// Name of the MemberCluster
        #[arg(long)]
        cluster: String,
    },
    /// Print the MemberCluster CRD manifest
    Crd,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectReport {
    cluster: String,
    endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_version: Option<String>,
    status: MemberClusterStatus,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        service_name: "lattice-federation".to_string(),
        format: if cli.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
    })?;

    match &cli.command {
        Commands::Crd => {
            let crd = serde_yaml::to_string(&MemberCluster::crd())
                .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
            println!("{crd}");
            Ok(())
        }
        Commands::SelectEndpoint { cluster } => select_endpoint(&cli, cluster).await,
        Commands::Inspect { cluster } => inspect(&cli, cluster).await,
    }
}

async fn select_endpoint(cli: &Cli, name: &str) -> anyhow::Result<()> {
    let admin = create_client(cli.kubeconfig.as_deref()).await?;
    let cluster = fetch_member_cluster(&admin, name).await?;
    let factory = factory(cli, admin);

    match factory.select_endpoint(&cluster)? {
        Some(endpoint) => println!("{endpoint}"),
        None => println!("no endpoint for cluster {name} matches this host"),
    }
    Ok(())
}

async fn inspect(cli: &Cli, name: &str) -> anyhow::Result<()> {
    let admin = create_client(cli.kubeconfig.as_deref()).await?;
    let cluster = fetch_member_cluster(&admin, name).await?;
    let factory = factory(cli, admin);

    let Some(client) = factory.build(&cluster).await? else {
        println!("no endpoint for cluster {name} matches this host");
        return Ok(());
    };

    let status = observe_cluster(&client).await;
    let server_version = match client.server_version().await {
        Ok(version) => Some(version),
        Err(e) => {
            tracing::debug!(error = %e, "failed to read server version");
            None
        }
    };

    let report = InspectReport {
        cluster: client.name().to_string(),
        endpoint: client.endpoint().to_string(),
        server_version,
        status,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn fetch_member_cluster(admin: &kube::Client, name: &str) -> anyhow::Result<MemberCluster> {
    let api: Api<MemberCluster> = Api::all(admin.clone());
    match api.get(name).await {
        Ok(cluster) => Ok(cluster),
        Err(e) if is_not_found(&e) => Err(anyhow::anyhow!("MemberCluster {name} not found")),
        Err(e) => Err(e).with_context(|| format!("failed to get MemberCluster {name}")),
    }
}

fn factory(cli: &Cli, admin: kube::Client) -> ClusterClientFactory {
    let host: Arc<dyn HostAddressSource> = match cli.host_ip {
        Some(ip) => Arc::new(FixedHostAddress(ip)),
        None => Arc::new(DefaultRouteAddress),
    };
    let namespace: Arc<dyn NamespaceSource> = match &cli.namespace {
        Some(ns) => Arc::new(FixedNamespace(ns.clone())),
        None => Arc::new(PodNamespaceEnv),
    };
    let resolver = SecretCredentialResolver::new(Arc::new(ExistingClientProvider(admin)), namespace);

    ClusterClientFactory::new(host, Arc::new(resolver)).with_settings(ClientSettings {
        qps: cli.qps,
        burst: cli.burst,
        ..Default::default()
    })
}
