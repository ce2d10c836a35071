//! `price-admin`: management CLI for the price-comparison backend.
//!
//! ```text
//! price-admin login --email admin@example.com      (password from env)
//! price-admin list products --search milk --page 1 --per-page 20
//! price-admin update categories 4 --data '{"name":"Dairy"}'
//! price-admin delete store-locations 12
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use price_admin::config::loader::load_or_default;
use price_admin::config::validate_config;
use price_admin::observability::init_tracing;
use price_admin::{ApiClient, ApiError, ListQuery, OrderDirection, Repository, ResourceKind};

#[derive(Parser)]
#[command(name = "price-admin")]
#[command(about = "Admin CLI for the price-comparison dataset", long_about = None)]
struct Cli {
    /// TOML config file.
    #[arg(short, long, env = "PRICE_ADMIN_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `api.base_url`.
    #[arg(short, long, env = "PRICE_ADMIN_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "PRICE_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// List a collection
    List {
        resource: Resource,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
        #[arg(long)]
        order_by: Option<String>,
        #[arg(long)]
        order_direction: Option<Direction>,
    },
    /// Fetch one item
    Get { resource: Resource, id: String },
    /// Create an item from a JSON body
    Create {
        resource: Resource,
        #[arg(short, long)]
        data: String,
    },
    /// Replace an item with a JSON body
    Update {
        resource: Resource,
        id: String,
        #[arg(short, long)]
        data: String,
    },
    /// Delete an item
    Delete { resource: Resource, id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Resource {
    Users,
    Categories,
    Products,
    ProductEntries,
    StoreBrands,
    StoreLocations,
}

impl From<Resource> for ResourceKind {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Users => ResourceKind::Users,
            Resource::Categories => ResourceKind::Categories,
            Resource::Products => ResourceKind::Products,
            Resource::ProductEntries => ResourceKind::ProductEntries,
            Resource::StoreBrands => ResourceKind::StoreBrands,
            Resource::StoreLocations => ResourceKind::StoreLocations,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Direction {
    Asc,
    Desc,
}

impl From<Direction> for OrderDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Asc => OrderDirection::Asc,
            Direction::Desc => OrderDirection::Desc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("config: {}", error);
        }
        return Err("invalid configuration".into());
    }

    init_tracing(&config.observability.log_level);
    tracing::debug!(base_url = %config.api.base_url, "Configuration loaded");

    let client = ApiClient::from_config(&config)?;

    let result = run(&client, cli.command).await;
    if let Some(hint) = result.as_ref().err().and_then(|e| relogin_hint(&**e)) {
        eprintln!("{}", hint);
    }
    result
}

/// Re-login hint for a command that failed on an expired session.
fn relogin_hint(err: &(dyn std::error::Error + 'static)) -> Option<String> {
    err.downcast_ref::<ApiError>()
        .filter(|e| e.is_session_expired())
        .map(|e| format!("{}. Run `price-admin login` again.", e))
}

async fn run(client: &ApiClient, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Login { email, password } => {
            client.login(&email, &password).await?;
            println!("Logged in as {}", email);
        }
        Commands::Logout => {
            client.logout();
            println!("Logged out");
        }
        Commands::List {
            resource,
            search,
            page,
            per_page,
            order_by,
            order_direction,
        } => {
            let query = ListQuery {
                search,
                page,
                per_page,
                order_by,
                order_direction: order_direction.map(Into::into),
            };
            let page = repository(client, resource).list(&query).await?;
            print_json(&page)?;
        }
        Commands::Get { resource, id } => {
            let item = repository(client, resource).get(&id).await?;
            print_json(&item)?;
        }
        Commands::Create { resource, data } => {
            let body: serde_json::Value = serde_json::from_str(&data)?;
            let item = repository(client, resource).create(&body).await?;
            print_json(&item)?;
        }
        Commands::Update { resource, id, data } => {
            let body: serde_json::Value = serde_json::from_str(&data)?;
            let item = repository(client, resource).update(&id, &body).await?;
            print_json(&item)?;
        }
        Commands::Delete { resource, id } => {
            repository(client, resource).delete(&id).await?;
            println!("Deleted {}/{}", ResourceKind::from(resource), id);
        }
    }

    Ok(())
}

fn repository(client: &ApiClient, resource: Resource) -> Repository {
    Repository::new(client.clone(), resource.into())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
