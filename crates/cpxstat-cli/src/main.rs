//! cpxstat — fleet health monitor for CPX registries.
//!
//! # Usage
//!
//! ```text
//! cpxstat instances list --service AuthService --sort cpu
//! cpxstat services watch GeoService --interval 2s
//! cpxstat --registry http://10.0.0.5:5000 --output json services list
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use cpxstat_core::config::parse_duration;
use cpxstat_core::{CpxConfig, InstanceErrorPolicy, LogFormat};
use cpxstat_health::{InstanceSortKey, Query, ServiceSortKey};
use cpxstat_registry::{HttpRegistry, SnapshotFetcher};

use commands::instances::InstanceView;
use commands::services::ServiceView;
use render::OutputFormat;

mod commands;
mod logging;
mod render;

#[derive(Parser)]
#[command(
    name = "cpxstat",
    about = "Fleet health monitor for CPX registries",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Config file (default: $CPXSTAT_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Top-level table of the config file to read settings from
    #[arg(long, global = true)]
    config_section: Option<String>,

    /// Registry base URL, e.g. http://localhost:5000
    #[arg(long, global = true)]
    registry: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Log format: text or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// What to do when one instance cannot be fetched: abort or mark-unknown
    #[arg(long, global = true)]
    on_instance_error: Option<InstanceErrorPolicy>,

    /// Maximum concurrent instance fetches
    #[arg(long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Per-instance CPU, memory and health
    Instances {
        #[command(subcommand)]
        action: InstancesAction,
    },
    /// Per-service rollups
    Services {
        #[command(subcommand)]
        action: ServicesAction,
    },
}

#[derive(Subcommand)]
enum InstancesAction {
    /// Print every instance once
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Sort key: id, service, cpu, memory, status
        #[arg(long, default_value = "id")]
        sort: InstanceSortKey,
    },
    /// Redraw the instance table until Ctrl-C
    Watch {
        #[command(flatten)]
        filter: FilterArgs,
        /// Sort key: id, service, cpu, memory, status
        #[arg(long, default_value = "id")]
        sort: InstanceSortKey,
        /// Refresh interval, e.g. 500ms, 2s
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
    },
    /// Print a single instance
    Show {
        /// Instance identifier as listed by the registry
        instance: String,
    },
}

#[derive(Subcommand)]
enum ServicesAction {
    /// Print every service rollup once
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Sort key: name, cpu, memory, unhealthy
        #[arg(long, default_value = "name")]
        sort: ServiceSortKey,
    },
    /// Redraw the service table until Ctrl-C
    Watch {
        /// Only show this service
        service: Option<String>,
        /// Only show services with this status
        #[arg(long)]
        status: Option<String>,
        /// Sort key: name, cpu, memory, unhealthy
        #[arg(long, default_value = "name")]
        sort: ServiceSortKey,
        /// Refresh interval, e.g. 500ms, 2s
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
    },
    /// Print the rollup for one service
    Show {
        service: String,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Only rows for this service (case-insensitive)
    #[arg(long)]
    service: Option<String>,
    /// Only rows with this status: healthy, unhealthy, unknown
    #[arg(long)]
    status: Option<String>,
}

impl FilterArgs {
    fn query(&self) -> Query {
        Query::new(self.service.as_deref(), self.status.as_deref())
    }
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    match parse_duration(s) {
        Some(d) if !d.is_zero() => Ok(d),
        Some(_) => Err("interval must be greater than zero".to_string()),
        None => Err(format!("cannot parse duration {s:?}")),
    }
}

impl Cli {
    /// Layer the global flags over file and environment settings.
    fn resolve_config(&self) -> anyhow::Result<CpxConfig> {
        let mut config = CpxConfig::load(self.config.as_deref(), self.config_section.as_deref())
            .context("failed to load configuration")?;

        if let Some(url) = &self.registry {
            config.set_registry_url(url).context("invalid --registry")?;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(policy) = self.on_instance_error {
            config.registry.on_instance_error = policy;
        }
        if let Some(concurrency) = self.concurrency {
            config.registry.concurrency = usize::from(concurrency);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    logging::init(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), registry = %config.registry.endpoint, "cpxstat starting");

    let registry = HttpRegistry::from_config(&config.registry);
    let fetcher = SnapshotFetcher::from_config(registry, &config.registry);
    let output = cli.output;

    match cli.command {
        Commands::Instances { action } => match action {
            InstancesAction::List { filter, sort } => {
                let view = InstanceView::new(filter.query(), sort);
                print!("{}", commands::instances::list(&fetcher, &view, output).await?);
            }
            InstancesAction::Watch { filter, sort, interval } => {
                let view = InstanceView::new(filter.query(), sort);
                let interval = interval.unwrap_or(config.watch.interval);
                commands::watch(fetcher, interval, output, |snapshot| view.render(snapshot, output)).await?;
            }
            InstancesAction::Show { instance } => {
                print!("{}", commands::instances::show(&fetcher, &instance, output).await?);
            }
        },
        Commands::Services { action } => match action {
            ServicesAction::List { filter, sort } => {
                let view = ServiceView::new(filter.query(), sort);
                print!("{}", commands::services::list(&fetcher, &view, output).await?);
            }
            ServicesAction::Watch { service, status, sort, interval } => {
                let view = ServiceView::new(Query::new(service.as_deref(), status.as_deref()), sort);
                let interval = interval.unwrap_or(config.watch.interval);
                commands::watch(fetcher, interval, output, |snapshot| view.render(snapshot, output)).await?;
            }
            ServicesAction::Show { service } => {
                print!("{}", commands::services::show(&fetcher, &service, output).await?);
            }
        },
    }

    debug!("cpxstat finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn instances_list_defaults() {
        let cli = parse(&["cpxstat", "instances", "list"]);
        assert_eq!(cli.output, OutputFormat::Table);
        match cli.command {
            Commands::Instances { action: InstancesAction::List { filter, sort } } => {
                assert_eq!(sort, InstanceSortKey::Id);
                assert_eq!(filter.query(), Query::default());
            }
            _ => panic!("expected instances list"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&[
            "cpxstat",
            "services",
            "list",
            "--status",
            "unhealthy",
            "--sort",
            "cpu",
            "--output",
            "json",
            "--on-instance-error",
            "mark-unknown",
        ]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.on_instance_error, Some(InstanceErrorPolicy::MarkUnknown));
        match cli.command {
            Commands::Services { action: ServicesAction::List { filter, sort } } => {
                assert_eq!(sort, ServiceSortKey::Cpu);
                assert_eq!(filter.status.as_deref(), Some("unhealthy"));
            }
            _ => panic!("expected services list"),
        }
    }

    #[test]
    fn services_watch_takes_positional_service_and_interval() {
        let cli = parse(&["cpxstat", "services", "watch", "GeoService", "--interval", "250ms"]);
        match cli.command {
            Commands::Services {
                action: ServicesAction::Watch { service, interval, .. },
            } => {
                assert_eq!(service.as_deref(), Some("GeoService"));
                assert_eq!(interval, Some(Duration::from_millis(250)));
            }
            _ => panic!("expected services watch"),
        }
    }

    #[test]
    fn show_requires_a_target() {
        assert!(Cli::try_parse_from(["cpxstat", "instances", "show"]).is_err());
        assert!(Cli::try_parse_from(["cpxstat", "services", "show"]).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["cpxstat", "instances", "list", "--sort", "ip"]).is_err());
        assert!(Cli::try_parse_from(["cpxstat", "instances", "watch", "--interval", "0s"]).is_err());
        assert!(
            Cli::try_parse_from(["cpxstat", "instances", "watch", "--interval", "999999999999999999m"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["cpxstat", "--output", "yaml", "services", "list"]).is_err());
        assert!(Cli::try_parse_from(["cpxstat", "--concurrency", "0", "services", "list"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[registry]\nurl = \"http://10.0.0.5:8080\"\nconcurrency = 2\n\n[logging]\nformat = \"json\""
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let config = parse(&["cpxstat", "--config", path, "services", "list"])
            .resolve_config()
            .unwrap();
        assert_eq!(config.registry.endpoint.as_str(), "http://10.0.0.5:8080");
        assert_eq!(config.registry.concurrency, 2);
        assert_eq!(config.logging.format, LogFormat::Json);

        let config = parse(&[
            "cpxstat",
            "--config",
            path,
            "--registry",
            "http://127.0.0.1:5000",
            "--concurrency",
            "4",
            "services",
            "list",
        ])
        .resolve_config()
        .unwrap();
        assert_eq!(config.registry.endpoint.as_str(), "http://127.0.0.1:5000");
        assert_eq!(config.registry.concurrency, 4);
    }

    #[test]
    fn bad_registry_flag_is_an_error() {
        let cli = parse(&["cpxstat", "--registry", "https://example.com", "instances", "list"]);
        assert!(cli.resolve_config().is_err());
    }
}
