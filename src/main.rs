use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trip_planner::amap::{AmapClient, AmapConfig};
use trip_planner::chat::{ChatClient, ChatConfig};
use trip_planner::config::PlannerConfig;
use trip_planner::directory::JsonDirectory;
use trip_planner::error::OracleError;
use trip_planner::haversine::HaversineRouter;
use trip_planner::model::{Coordinates, TransitOffer};
use trip_planner::osrm::{OsrmClient, OsrmConfig};
use trip_planner::pipeline::{Oracles, TripPlanner, TripRequest};
use trip_planner::stub::{StaticChooser, StaticGeocoder, StaticJudge};
use trip_planner::traits::{Geocoder, RoutingOracle, TransitChooser, ValueJudge};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RoutingBackend {
    Osrm,
    Amap,
    Haversine,
}

#[derive(Parser, Debug)]
#[command(name = "trip-planner", version, about = "Plan a business trip around a meeting")]
struct Cli {
    /// Trip request JSON.
    #[arg(long)]
    request: PathBuf,
    /// Transit offers JSON array.
    #[arg(long)]
    offers: PathBuf,
    /// Waypoint directory JSON, keyed by city.
    #[arg(long)]
    directory: PathBuf,
    /// Static judgments; the chat oracle is used when absent.
    #[arg(long)]
    judgments: Option<PathBuf>,
    /// Static transit choice; the chat oracle is used when absent.
    #[arg(long)]
    choice: Option<PathBuf>,
    /// Address to coordinate table used when AMap geocoding is not configured.
    #[arg(long)]
    places: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = RoutingBackend::Haversine)]
    routing: RoutingBackend,
    /// Planner constants JSON.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, env = "AMAP_API_KEY")]
    amap_api_key: Option<String>,
    #[arg(long, env = "OSRM_BASE_URL", default_value = "http://localhost:5000")]
    osrm_base_url: String,
    #[arg(long, env = "CHAT_API_KEY")]
    chat_api_key: Option<String>,
    #[arg(long, env = "CHAT_BASE_URL")]
    chat_base_url: Option<String>,
    #[arg(long, env = "CHAT_MODEL")]
    chat_model: Option<String>,
}

/// The routing backend picked on the command line.
enum Router {
    Osrm(OsrmClient),
    Amap(AmapClient),
    Haversine(HaversineRouter),
}

impl RoutingOracle for Router {
    fn minutes(&self, origin: Coordinates, destination: Coordinates) -> Result<f64, OracleError> {
        match self {
            Router::Osrm(client) => client.minutes(origin, destination),
            Router::Amap(client) => client.minutes(origin, destination),
            Router::Haversine(router) => router.minutes(origin, destination),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(file).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PlannerConfig::from_path(path)
            .with_context(|| format!("loading planner config {}", path.display()))?,
        None => PlannerConfig::default(),
    };
    let request: TripRequest = read_json(&cli.request)?;
    let offers: Vec<TransitOffer> = read_json(&cli.offers)?;
    let directory = JsonDirectory::from_path(&cli.directory)
        .with_context(|| format!("loading directory {}", cli.directory.display()))?;

    let amap = match &cli.amap_api_key {
        Some(key) => Some(AmapClient::new(AmapConfig::new(key.clone())).context("building AMap client")?),
        None => None,
    };

    let router = match cli.routing {
        RoutingBackend::Osrm => Router::Osrm(
            OsrmClient::new(OsrmConfig::default().with_base_url(cli.osrm_base_url.clone()))
                .context("building OSRM client")?,
        ),
        RoutingBackend::Amap => match &amap {
            Some(client) => Router::Amap(client.clone()),
            None => bail!("--routing amap needs AMAP_API_KEY"),
        },
        RoutingBackend::Haversine => Router::Haversine(HaversineRouter::default()),
    };

    let static_geocoder = match &cli.places {
        Some(path) => StaticGeocoder::from_path(path)
            .with_context(|| format!("loading places {}", path.display()))?,
        None => StaticGeocoder::default(),
    };
    let geocoder: &dyn Geocoder = match &amap {
        Some(client) => client,
        None => &static_geocoder,
    };

    let chat = if cli.judgments.is_none() || cli.choice.is_none() {
        let Some(key) = cli.chat_api_key.clone() else {
            bail!("CHAT_API_KEY is required unless both --judgments and --choice are given");
        };
        let mut chat_config = ChatConfig::default().with_api_key(key);
        if let Some(url) = &cli.chat_base_url {
            chat_config = chat_config.with_base_url(url.clone());
        }
        if let Some(model) = &cli.chat_model {
            chat_config = chat_config.with_model(model.clone());
        }
        Some(
            ChatClient::new(chat_config)
                .context("building chat client")?
                .with_policy(config.retry.clone()),
        )
    } else {
        None
    };

    let static_judge = match &cli.judgments {
        Some(path) => Some(
            StaticJudge::from_path(path).with_context(|| format!("loading judgments {}", path.display()))?,
        ),
        None => None,
    };
    let static_chooser = match &cli.choice {
        Some(path) => Some(
            StaticChooser::from_path(path).with_context(|| format!("loading choice {}", path.display()))?,
        ),
        None => None,
    };

    let judge: &dyn ValueJudge = match (&static_judge, &chat) {
        (Some(judge), _) => judge,
        (None, Some(chat)) => chat,
        (None, None) => bail!("no value judge configured"),
    };
    let chooser: &dyn TransitChooser = match (&static_chooser, &chat) {
        (Some(chooser), _) => chooser,
        (None, Some(chat)) => chat,
        (None, None) => bail!("no transit chooser configured"),
    };

    info!(
        offers = offers.len(),
        routing = ?cli.routing,
        "planning trip"
    );

    let planner = TripPlanner::new(
        config,
        router,
        Oracles {
            geocoder,
            directory: &directory,
            judge,
            chooser,
        },
    );
    let plan = planner.plan(&request, &offers).context("planning trip")?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
