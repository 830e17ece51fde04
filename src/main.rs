//! Audience Mapper CLI
//!
//! Usage:
//!   audience-mapper --serve                           # HTTP server + UI
//!   audience-mapper --location "Fenway Park, Boston"  # One-shot lookup
//!   audience-mapper --location "..." --json           # JSON output
//!   audience-mapper --location "..." --map            # Also frame the map

use clap::Parser;
use colored::Colorize;
use std::sync::Arc;

use audience_mapper::config::AppConfig;
use audience_mapper::core::{
    run_server, AudienceResolver, AudienceSession, GeoDataProvider, GeoSource, MapInput,
    MapPresenter,
};
use audience_mapper::logging::init_logging;
use audience_mapper::types::{AudienceResponse, MapView, Viewport};
use audience_mapper::{
    DEFAULT_API_KEY_ENV, DEFAULT_BACKEND_URL, DEFAULT_GEO_DATA_URL, DEFAULT_MODEL,
    DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS, VERSION,
};

#[derive(Parser, Debug)]
#[command(
    name = "audience-mapper",
    version = VERSION,
    about = "Find the home state and nearby marketing targets for an event location",
    long_about = "Audience Mapper asks a hosted model which US state an event location\n\
                  sits in and which nearby states are worth targeting, then frames\n\
                  them on a choropleth map.\n\n\
                  Modes:\n  \
                  --serve     HTTP server with the map UI\n  \
                  --location  One-shot lookup in the terminal\n\n\
                  The model API key is read from the API_KEY environment variable\n\
                  (see --api-key-env) each time a lookup runs."
)]
struct Args {
    /// Location to resolve (one-shot mode)
    #[arg(short, long)]
    location: Option<String>,

    /// Run as HTTP server
    #[arg(short, long)]
    serve: bool,

    /// Server address
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Also load the polygon dataset and print the map framing
    #[arg(long)]
    map: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f64,

    /// Environment variable holding the API key
    #[arg(long, default_value = DEFAULT_API_KEY_ENV)]
    api_key_env: String,

    /// Model API base URL
    #[arg(long, default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,

    /// US states GeoJSON (URL or file path)
    #[arg(long, default_value = DEFAULT_GEO_DATA_URL)]
    geo_data: String,

    /// Outbound HTTP timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,
}

impl Args {
    fn config(&self) -> AppConfig {
        AppConfig {
            addr: self.addr.clone(),
            backend_url: self.backend_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            api_key_env: self.api_key_env.clone(),
            geo_source: GeoSource::parse(&self.geo_data),
            timeout_secs: self.timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, !args.no_color);
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = args.config();

    if args.serve {
        run_serve(&config).await;
    } else if let Some(ref location) = args.location {
        run_single(location, &args, &config).await;
    } else {
        eprintln!("Nothing to do: pass --serve or --location \"<venue or city>\" (see --help)");
        std::process::exit(2);
    }
}

/// Resolve one location and print it
async fn run_single(location: &str, args: &Args, config: &AppConfig) {
    let resolver = match AudienceResolver::gemini(config) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            std::process::exit(1);
        }
    };
    let mut session = AudienceSession::new();

    let response = match session.submit(&resolver, location).await {
        Ok(response) => response.clone(),
        Err(e) => {
            eprintln!("{}", e.user_message().red());
            tracing::debug!(error = %e, "Lookup failed");
            std::process::exit(1);
        }
    };

    let map_view = if args.map {
        Some(frame_map(&response, config).await)
    } else {
        None
    };

    if args.json {
        print_json(&response, map_view.as_ref());
    } else {
        print_cards(&response);
        if let Some(view) = map_view {
            print_map(&view);
        }
    }
}

/// Load the polygon dataset and frame the map for a response
async fn frame_map(response: &AudienceResponse, config: &AppConfig) -> MapView {
    let mut presenter = MapPresenter::new();
    match GeoDataProvider::new(config.timeout_secs) {
        Ok(provider) => match provider.load(&config.geo_source).await {
            Ok(geo) => presenter.set_geo_data(Arc::new(geo)),
            Err(e) => tracing::warn!(error = %e, "Map data unavailable"),
        },
        Err(e) => tracing::warn!(error = %e, "Map data unavailable"),
    }
    presenter.update(MapInput::from_response(Some(response)));
    presenter.view()
}

/// Print JSON output
fn print_json(response: &AudienceResponse, map: Option<&MapView>) {
    #[derive(serde::Serialize)]
    struct Output<'a> {
        audience: &'a AudienceResponse,
        #[serde(skip_serializing_if = "Option::is_none")]
        viewport: Option<&'a Viewport>,
    }

    let viewport = map.map(|m| &m.viewport);
    let output = Output { audience: response, viewport };
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to encode output: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print primary and nearby state cards
fn print_cards(response: &AudienceResponse) {
    let loc = response.show_location;
    println!();
    println!("{}", "Event Location".magenta().bold());
    let coords = match loc.longitude {
        Some(lon) => format!("({:.4}, {:.4})", loc.latitude, lon),
        None => format!("({:.4}, ?)", loc.latitude),
    };
    println!(
        "  [{}] {}  {}",
        response.primary_state.abbreviation.magenta().bold(),
        response.primary_state.name,
        coords
    );
    println!();
    println!("{}", "Recommended Targets".cyan().bold());
    if response.nearby_states.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for state in &response.nearby_states {
        println!("  [{}] {}", state.abbreviation.cyan().bold(), state.name);
    }
    println!();
}

/// Print map framing
fn print_map(view: &MapView) {
    if !view.ready {
        println!("{}", "Map data unavailable, default view".dimmed());
    }
    match view.viewport {
        Viewport::FitBounds { bounds } => println!(
            "Map: fit ({:.3}, {:.3}) → ({:.3}, {:.3})",
            bounds.south_west.lat(),
            bounds.south_west.lon(),
            bounds.north_east.lat(),
            bounds.north_east.lon()
        ),
        Viewport::Center { center, zoom } => println!(
            "Map: center ({:.3}, {:.3}) zoom {}",
            center.lat(),
            center.lon(),
            zoom
        ),
    }
    if let Some(marker) = view.marker() {
        println!("Marker: ({:.4}, {:.4})", marker.lat(), marker.lon());
    }
}

/// Run HTTP server
async fn run_serve(config: &AppConfig) {
    println!();
    println!("{}", format!("Audience Mapper v{}", VERSION).bold());
    println!("Open http://{}/ in a browser", config.addr);
    println!();

    if let Err(e) = run_server(config).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
