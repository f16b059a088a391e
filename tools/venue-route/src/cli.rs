//! CLI commands for venue-route

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use crate::cluster::{cluster_points, NearbyPoint};
use crate::config::RouterConfig;
use crate::location::Location;
use crate::options::{RouteOptions, SpeedPreference};
use crate::router::{find_route, RouteRequest};
use crate::search::{SearchLimits, SearchStrategy};
use crate::server;
use crate::venue::VenueGeometry;

#[derive(Parser)]
#[command(name = "venue-route")]
#[command(about = "Indoor multi-level venue routing engine", long_about = None)]
pub struct Cli {
    /// Router configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a route graph once and print its statistics
    Build {
        /// Venue geometry file
        geometry: PathBuf,

        /// Version stamped on the graph
        #[arg(long, default_value = "1")]
        graph_version: u64,
    },

    /// Find a route and print it as JSON
    Route {
        /// Venue geometry file
        geometry: PathBuf,

        /// Origin: node:<id>, space:<id> or <level>:<x>,<y>
        #[arg(long)]
        from: Location,

        /// Destination, same syntax as --from
        #[arg(long)]
        to: Location,

        /// Granted access restrictions, comma separated
        #[arg(long, value_delimiter = ',')]
        access: Vec<String>,

        /// Way types to avoid, comma separated
        #[arg(long, value_delimiter = ',')]
        avoid: Vec<String>,

        /// Default-excluded way types to allow, comma separated
        #[arg(long, value_delimiter = ',')]
        include: Vec<String>,

        /// Speed preference: default, fast, comfortable, accessible
        #[arg(long, default_value = "default")]
        speed: SpeedPreference,

        /// Use A* instead of Dijkstra
        #[arg(long)]
        astar: bool,

        /// Search timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Cluster points for display at a zoom level
    Nearby {
        /// JSON array of {id, level, x, y}
        points: PathBuf,

        #[arg(long)]
        zoom: f64,
    },

    /// Start HTTP API server with OpenAPI docs
    Serve {
        /// Venue geometry file
        geometry: PathBuf,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides the config file)
        #[arg(long)]
        bind: Option<String>,

        /// Version of the initial graph
        #[arg(long, default_value = "1")]
        graph_version: u64,
    },
}

/// Install the global subscriber; `RUST_LOG` overrides the default `info`.
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let mut config = RouterConfig::load_or_default(self.config.as_deref())?;
        match self.command {
            Commands::Serve {
                geometry,
                port,
                bind,
                graph_version,
            } => {
                if let Some(port) = port {
                    config.server.port = port;
                }
                if let Some(bind) = bind {
                    config.server.bind = bind;
                }
                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(server::serve(&geometry, graph_version, config))?;
                Ok(())
            }
            command => {
                let output = command.render(&config)?;
                println!("{output}");
                Ok(())
            }
        }
    }
}

fn load_geometry(path: &Path) -> Result<VenueGeometry> {
    VenueGeometry::from_path(path).with_context(|| format!("Failed to read geometry {}", path.display()))
}

impl Commands {
    /// Output of a one-shot command
    pub fn render(self, config: &RouterConfig) -> Result<String> {
        match self {
            Commands::Build {
                geometry,
                graph_version,
            } => {
                let venue = load_geometry(&geometry)?;
                let started = Instant::now();
                let graph = match config.graph_builder().build(&venue, graph_version) {
                    Ok(graph) => graph,
                    Err(e) => {
                        let mut message = format!("{} geometry problem(s):", e.problems().len());
                        for problem in e.problems() {
                            let _ = write!(message, "\n  - {problem}");
                        }
                        anyhow::bail!(message);
                    }
                };

                let info = graph.info();
                let mut out = String::new();
                let _ = writeln!(out, "Built graph version {}", info.version);
                let _ = writeln!(out, "  fingerprint: {}", info.fingerprint);
                let _ = writeln!(
                    out,
                    "  levels: {}, spaces: {}, connectors: {}",
                    graph.levels().len(),
                    graph.spaces().len(),
                    graph.connectors().len()
                );
                let _ = writeln!(out, "  nodes: {}, edges: {}", graph.n_nodes(), graph.n_edges());
                let _ = write!(
                    out,
                    "  warnings: {} (built in {:.2?})",
                    info.warnings.len(),
                    started.elapsed()
                );
                for warning in &info.warnings {
                    let _ = write!(out, "\n    - {warning}");
                }
                Ok(out)
            }
            Commands::Route {
                geometry,
                from,
                to,
                access,
                avoid,
                include,
                speed,
                astar,
                timeout_ms,
            } => {
                let venue = load_geometry(&geometry)?;
                let graph = config
                    .graph_builder()
                    .build(&venue, 1)
                    .context("Graph build failed")?;

                let mut settings = config.router.clone();
                if astar {
                    settings.strategy = SearchStrategy::AStar;
                }
                let limits = match timeout_ms {
                    Some(ms) => SearchLimits::with_deadline(Instant::now() + Duration::from_millis(ms)),
                    None => SearchLimits::none(),
                };
                let request = RouteRequest::new(from, to)
                    .with_access(access)
                    .with_options(RouteOptions {
                        avoid,
                        include,
                        speed,
                    })
                    .with_limits(limits);

                let route = find_route(&graph, &request, &settings)?;
                Ok(serde_json::to_string_pretty(&route)?)
            }
            Commands::Nearby { points, zoom } => {
                let file = std::fs::File::open(&points)
                    .with_context(|| format!("Failed to open {}", points.display()))?;
                let points: Vec<NearbyPoint> = serde_json::from_reader(std::io::BufReader::new(file))
                    .context("Failed to parse points")?;
                let clusters = cluster_points(&points, zoom, &config.cluster)?;
                Ok(serde_json::to_string_pretty(&clusters)?)
            }
            Commands::Serve { .. } => anyhow::bail!("serve runs until stopped and has no output"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route_arguments() {
        let cli = Cli::try_parse_from([
            "venue-route",
            "route",
            "venue.json",
            "--from",
            "space:lobby",
            "--to",
            "L1:10.5,3",
            "--access",
            "staff,vip",
            "--avoid",
            "stairs",
            "--speed",
            "accessible",
            "--log-json",
        ])
        .unwrap();
        assert!(cli.log_json);
        match cli.command {
            Commands::Route {
                from,
                to,
                access,
                avoid,
                speed,
                astar,
                ..
            } => {
                assert_eq!(from, Location::Space { id: "lobby".into() });
                assert_eq!(
                    to,
                    Location::Point {
                        level: "L1".into(),
                        x: 10.5,
                        y: 3.0
                    }
                );
                assert_eq!(access, vec!["staff", "vip"]);
                assert_eq!(avoid, vec!["stairs"]);
                assert_eq!(speed, SpeedPreference::Accessible);
                assert!(!astar);
            }
            _ => panic!("expected route command"),
        }
    }

    #[test]
    fn test_bad_location_is_a_usage_error() {
        let result = Cli::try_parse_from([
            "venue-route",
            "route",
            "venue.json",
            "--from",
            "lobby",
            "--to",
            "space:cafe",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["venue-route", "serve", "venue.json", "-p", "9100"]).unwrap();
        match cli.command {
            Commands::Serve {
                port,
                bind,
                graph_version,
                ..
            } => {
                assert_eq!(port, Some(9100));
                assert_eq!(bind, None);
                assert_eq!(graph_version, 1);
            }
            _ => panic!("expected serve command"),
        }
    }
}
