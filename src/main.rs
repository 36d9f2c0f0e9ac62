use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use junction::{
    adapters::{ServiceContainer, builtin_registry},
    config::{
        CacheBackend, LoadStats, RouterConfig, RouterConfigValidator, build_router,
        loader::{clear_cache, load_config},
    },
    core::{RouteParams, Router, route::normalize_method},
    metrics, tracing_setup,
};

const DEFAULT_CONFIG: &str = "junction.yaml";

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Load and validate the configuration and every route source
    Validate {
        #[clap(short, long, default_value = DEFAULT_CONFIG)]
        config: String,
    },
    /// Print the route table
    Routes {
        #[clap(short, long, default_value = DEFAULT_CONFIG)]
        config: String,
        /// Print as JSON instead of a table
        #[clap(long)]
        json: bool,
    },
    /// Show which route a request would be dispatched to
    Match {
        #[clap(short, long, default_value = DEFAULT_CONFIG)]
        config: String,
        method: String,
        path: String,
    },
    /// Build the URL of a named route
    Url {
        #[clap(short, long, default_value = DEFAULT_CONFIG)]
        config: String,
        name: String,
        /// Route parameters as key=value
        params: Vec<String>,
        /// Extra query parameters as key=value
        #[clap(short, long)]
        query: Vec<String>,
    },
    /// Manage the route cache
    Cache {
        #[clap(subcommand)]
        action: CacheCommand,
    },
    /// Write a starter configuration and route file
    Init {
        #[clap(short, long, default_value = DEFAULT_CONFIG)]
        config: String,
    },
}

#[derive(Parser, Debug)]
enum CacheCommand {
    /// Delete the cache file
    Clear {
        #[clap(short, long, default_value = DEFAULT_CONFIG)]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Commands::Validate { config } => validate_command(&config).await,
        Commands::Routes { config, json } => routes_command(&config, json).await,
        Commands::Match {
            config,
            method,
            path,
        } => match_command(&config, &method, &path).await,
        Commands::Url {
            config,
            name,
            params,
            query,
        } => url_command(&config, &name, &params, &query).await,
        Commands::Cache {
            action: CacheCommand::Clear { config },
        } => cache_clear_command(&config).await,
        Commands::Init { config } => init_command(&config).await,
    }
}

async fn read_config(config_path: &str) -> Result<RouterConfig> {
    if !Path::new(config_path).exists() {
        return Err(eyre!("Configuration file '{config_path}' not found"));
    }
    let config = load_config(config_path).await?;
    RouterConfigValidator::validate(&config).wrap_err("Invalid configuration")?;

    tracing_setup::init_tracing_with_config(&config.log_level, config.log_format, false)?;
    metrics::init_metrics()?;
    Ok(config)
}

async fn load_router(config: &RouterConfig) -> Result<(Router, LoadStats)> {
    // The CLI only matches and lists routes, no controller is ever invoked.
    let services = Arc::new(ServiceContainer::new());
    build_router(config, services, builtin_registry()).await
}

async fn validate_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    let mut config = read_config(config_path).await?;
    println!("✅ Configuration: OK");

    // Read every source even when a snapshot exists.
    config.cache.backend = CacheBackend::None;
    let (router, stats) = load_router(&config).await?;

    println!("✅ Route sources: OK");
    println!();
    println!("📋 Summary:");
    println!("   • Sources: {}", stats.files_loaded);
    println!("   • Routes: {}", stats.total_routes);
    for (group, count) in &stats.per_group {
        println!("     - {group}: {count}");
    }
    println!(
        "   • Named routes: {}",
        router.routes().all().iter().filter(|r| r.name().is_some()).count()
    );
    Ok(())
}

async fn routes_command(config_path: &str, json: bool) -> Result<()> {
    let config = read_config(config_path).await?;
    let (router, _) = load_router(&config).await?;
    let summaries = router.summaries();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!("{:<16} {:<32} {:<20} {:<32} {}", "METHODS", "PATH", "NAME", "HANDLER", "MIDDLEWARE");
    for route in summaries {
        println!(
            "{:<16} {:<32} {:<20} {:<32} {}",
            route.methods.join("|"),
            route.path,
            route.name.unwrap_or_default(),
            route.handler,
            route.middleware.join(",")
        );
    }
    Ok(())
}

async fn match_command(config_path: &str, method: &str, path: &str) -> Result<()> {
    let method = normalize_method(method).ok_or_else(|| eyre!("Unsupported HTTP method '{method}'"))?;
    let config = read_config(config_path).await?;
    let (router, _) = load_router(&config).await?;

    match router.match_route(&method, path) {
        Ok((route, matched)) => {
            println!("✅ {route}");
            println!("   handler: {}", route.handler());
            if let Some(name) = route.name() {
                println!("   name: {name}");
            }
            println!("   params: {}", serde_json::to_string(matched.params())?);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ {} {}", e.status_code(), e);
            std::process::exit(1);
        }
    }
}

fn parse_pairs(pairs: &[String]) -> Result<RouteParams> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| eyre!("Expected key=value, got '{pair}'"))
        })
        .collect()
}

async fn url_command(config_path: &str, name: &str, params: &[String], query: &[String]) -> Result<()> {
    let params = parse_pairs(params)?;
    let query = parse_pairs(query)?;
    let config = read_config(config_path).await?;
    let (router, _) = load_router(&config).await?;

    let query = (!query.is_empty()).then_some(&query);
    let url = router.url(name, &params, query)?;
    println!("{url}");
    Ok(())
}

async fn cache_clear_command(config_path: &str) -> Result<()> {
    let config = read_config(config_path).await?;
    if clear_cache(&config).await? {
        println!("✅ Removed route cache {}", config.cache.path);
    } else {
        println!("ℹ️  No file cache configured");
    }
    Ok(())
}

async fn init_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        return Err(eyre!("Configuration file '{config_path}' already exists"));
    }
    let routes_path = path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join("routes.yaml");

    let default_config = r#"# Junction router configuration

# Route definition files, loaded in order
sources:
  - path: "routes.yaml"
    group: "web"

# Route snapshot cache: none, memory or file
cache:
  backend: "file"
  path: "var/cache/routes.json"

# Registry middleware applied to every route
middleware: ["request_id", "timing"]

inject_route_attributes: true
log_level: "info"
log_format: "compact"
"#;

    let default_routes = r#"routes:
  - method: GET
    path: /
    handler: "HomeController@index"
    name: home

  - methods: [GET, HEAD]
    path: /posts/{id}
    handler: ["PostController", "show"]
    name: posts.show
    middleware: ["security_headers"]
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    if !routes_path.exists() {
        tokio::fs::write(&routes_path, default_routes)
            .await
            .context("Failed to write routes file")?;
    }
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'junction validate --config {config_path}' to check it");
    Ok(())
}
