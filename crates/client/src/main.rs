//! `roastah` command-line edit surface.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use roastah_client::{
    ClientConfig, DeleteConfirmation, EditView, HttpProductApi, InMemoryProductApi, ProductApi,
    ProductEditor, ProductQueries, PreferenceStore, QueryCache, ViewMode,
};
use roastah_core::SellerId;
use roastah_products::{
    ProductDetails, ProductDetailsPatch, ProductId, ProductRecord, ProductState, ProductTag,
    RoastLevel,
};

#[derive(Parser)]
#[command(name = "roastah")]
#[command(about = "Manage Roastah catalog listings from the terminal")]
struct Cli {
    /// Run against a seeded in-process catalog instead of the API
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and change catalog listings
    #[command(subcommand)]
    Product(ProductCommand),
    /// Read or change persisted preferences
    #[command(subcommand)]
    Prefs(PrefsCommand),
}

#[derive(Subcommand)]
enum ProductCommand {
    /// Show one product with its allowed actions
    Show { product: String },
    /// List the seller's products
    List,
    /// Move a product to another lifecycle state
    Transition {
        product: String,
        #[arg(help = "Target state, e.g. pending_review")]
        state: ProductState,
    },
    /// Toggle a tag such as preorder or out_of_stock
    Tag { product: String, tag: ProductTag },
    /// Edit product fields
    Edit(EditArgs),
    /// Delete a product (draft or rejected only)
    Delete {
        product: String,
        /// Confirm the deletion; nothing is sent without it
        #[arg(long)]
        yes: bool,
    },
    /// Show recorded lifecycle events (in-memory catalog only)
    History { product: String },
}

#[derive(Args)]
struct EditArgs {
    product: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    price_cents: Option<u64>,
    #[arg(long)]
    weight_grams: Option<u32>,
    #[arg(long, value_parser = parse_roast_level)]
    roast_level: Option<RoastLevel>,
    #[arg(long, conflicts_with = "clear_origin")]
    origin: Option<String>,
    /// Remove the origin
    #[arg(long)]
    clear_origin: bool,
}

impl EditArgs {
    fn patch(&self) -> ProductDetailsPatch {
        ProductDetailsPatch {
            name: self.name.clone(),
            description: self.description.clone(),
            price_cents: self.price_cents,
            weight_grams: self.weight_grams,
            roast_level: self.roast_level,
            origin: if self.clear_origin {
                Some(None)
            } else {
                self.origin.clone().map(Some)
            },
        }
    }
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// Show or set the buyer/seller view mode
    Mode {
        #[arg(value_parser = parse_view_mode)]
        mode: Option<ViewMode>,
    },
}

fn parse_roast_level(raw: &str) -> Result<RoastLevel, String> {
    serde_json::from_value(serde_json::Value::String(raw.replace('-', "_").to_lowercase()))
        .map_err(|_| format!("unknown roast level '{raw}' (light, medium, medium_dark, dark)"))
}

fn parse_view_mode(raw: &str) -> Result<ViewMode, String> {
    match raw.to_lowercase().as_str() {
        "buyer" => Ok(ViewMode::Buyer),
        "seller" => Ok(ViewMode::Seller),
        _ => Err(format!("unknown view mode '{raw}' (buyer, seller)")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    roastah_observability::init();
    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("failed to load configuration")?;

    match cli.command {
        Commands::Product(cmd) => run_product(cmd, &config, cli.memory).await,
        Commands::Prefs(cmd) => run_prefs(cmd, &config).await,
    }
}

async fn run_product(cmd: ProductCommand, config: &ClientConfig, memory: bool) -> Result<()> {
    let memory_api = if memory {
        Some(Arc::new(seeded_catalog()?))
    } else {
        None
    };
    let api: Arc<dyn ProductApi> = match &memory_api {
        Some(api) => api.clone() as Arc<dyn ProductApi>,
        None => Arc::new(HttpProductApi::from_config(config).context("failed to build HTTP client")?),
    };
    let queries = ProductQueries::new(api, Arc::new(QueryCache::new()), Some(config.cache_max_age));

    match cmd {
        ProductCommand::List => {
            let products = queries.products().await.context("failed to list products")?;
            if products.is_empty() {
                println!("No products yet.");
            }
            for (index, record) in products.iter().enumerate() {
                println!("#{:<3} {}", index + 1, summary(record));
            }
            Ok(())
        }
        ProductCommand::Show { product } => {
            let editor = open_editor(&queries, &product).await?;
            print_view(&editor.view()?);
            Ok(())
        }
        ProductCommand::Transition { product, state } => {
            let editor = open_editor(&queries, &product).await?;
            let result = editor.request_transition(state).await;
            finish(&editor, result)
        }
        ProductCommand::Tag { product, tag } => {
            let editor = open_editor(&queries, &product).await?;
            let result = editor.toggle_tag(tag).await;
            finish(&editor, result)
        }
        ProductCommand::Edit(args) => {
            let editor = open_editor(&queries, &args.product).await?;
            let patch = args.patch();
            if patch.is_empty() {
                bail!("nothing to change; pass at least one field flag");
            }
            let result = editor.save_fields(patch).await;
            finish(&editor, result)
        }
        ProductCommand::Delete { product, yes } => {
            let editor = open_editor(&queries, &product).await?;
            if !yes {
                bail!("refusing to delete {} without --yes", editor.product_id());
            }
            let result = editor
                .delete(DeleteConfirmation::confirm(editor.product_id()))
                .await;
            print_notices(&editor);
            result.with_context(|| format!("failed to delete {}", editor.product_id()))?;
            Ok(())
        }
        ProductCommand::History { product } => {
            let Some(api) = memory_api else {
                bail!("history is only recorded by the in-memory catalog; pass --memory");
            };
            let id = resolve_product(&queries, &product).await?;
            for envelope in api.history(id) {
                println!(
                    "{:>3}  {}  {}",
                    envelope.sequence_number(),
                    envelope.recorded_at().format("%Y-%m-%d %H:%M:%S"),
                    envelope.event_type()
                );
            }
            Ok(())
        }
    }
}

async fn run_prefs(cmd: PrefsCommand, config: &ClientConfig) -> Result<()> {
    let store = match &config.prefs_url {
        Some(url) => PreferenceStore::open(url).await,
        None => PreferenceStore::open_default().await,
    }
    .context("failed to open preference store")?;

    match cmd {
        PrefsCommand::Mode { mode: None } => println!("{}", store.view_mode()),
        PrefsCommand::Mode { mode: Some(mode) } => {
            store
                .set_view_mode(mode)
                .await
                .context("failed to save view mode")?;
            println!("view mode set to {mode}");
        }
    }
    store.close().await;
    Ok(())
}

/// Accepts a product UUID or a `#N` position in the seller's list.
async fn resolve_product(queries: &ProductQueries, raw: &str) -> Result<ProductId> {
    if let Some(position) = raw.strip_prefix('#') {
        let position: usize = position
            .parse()
            .with_context(|| format!("invalid list position '{raw}'"))?;
        let products = queries.products().await.context("failed to list products")?;
        return position
            .checked_sub(1)
            .and_then(|i| products.get(i))
            .map(|r| r.id)
            .with_context(|| format!("no product at position {position}"));
    }
    raw.parse::<ProductId>()
        .with_context(|| format!("invalid product id '{raw}'"))
}

async fn open_editor(queries: &ProductQueries, raw: &str) -> Result<ProductEditor> {
    let id = resolve_product(queries, raw).await?;
    ProductEditor::open(queries.clone(), id)
        .await
        .with_context(|| format!("failed to open product {id}"))
}

fn finish(editor: &ProductEditor, result: Result<EditView, roastah_client::EditError>) -> Result<()> {
    print_notices(editor);
    let view = result.with_context(|| format!("failed to update {}", editor.product_id()))?;
    print_view(&view);
    Ok(())
}

fn print_notices(editor: &ProductEditor) {
    for notice in editor.take_notices() {
        eprintln!("[{:?}] {}", notice.level, notice.message);
    }
    if editor.reauth_required() {
        eprintln!("Sign in again and set ROASTAH_AUTH_TOKEN.");
    }
}

fn summary(record: &ProductRecord) -> String {
    let badges: Vec<&str> = record.badges().iter().map(|b| b.label).collect();
    format!(
        "{}  {:<32} {:<15} {}",
        record.id,
        record.details.name,
        record.state.label(),
        badges.join(", ")
    )
}

fn print_view(view: &EditView) {
    let record = &view.record;
    println!("{}", record.details.name);
    println!("  id:          {}", record.id);
    println!("  state:       {} ({})", view.state_label, view.state_color);
    println!(
        "  price:       ${}.{:02}",
        record.details.price_cents / 100,
        record.details.price_cents % 100
    );
    println!("  weight:      {} g", record.details.weight_grams);
    println!("  roast:       {}", record.details.roast_level.label());
    if let Some(origin) = &record.details.origin {
        println!("  origin:      {origin}");
    }
    let badges: Vec<&str> = view.badges.iter().map(|b| b.label).collect();
    if !badges.is_empty() {
        println!("  tags:        {}", badges.join(", "));
    }
    let options: Vec<&str> = view.transition_options.iter().map(|s| s.as_str()).collect();
    println!(
        "  next states: {}",
        if options.is_empty() { "none".to_string() } else { options.join(", ") }
    );
    println!(
        "  editable:    {}   deletable: {}",
        view.fields_enabled, view.delete_enabled
    );
}

/// In-process catalog with one listing in each interesting state.
fn seeded_catalog() -> Result<InMemoryProductApi> {
    let api = InMemoryProductApi::new(SellerId::new());
    let listings = [
        ("Ethiopia Yirgacheffe", RoastLevel::Light, ProductState::Draft),
        ("Colombia Supremo", RoastLevel::Medium, ProductState::PendingReview),
        ("Sumatra Mandheling", RoastLevel::Dark, ProductState::Published),
        ("House Espresso", RoastLevel::MediumDark, ProductState::Rejected),
    ];
    for (name, roast_level, state) in listings {
        let details = ProductDetails {
            name: name.to_string(),
            description: String::new(),
            price_cents: 1_800,
            weight_grams: 340,
            roast_level,
            origin: None,
        };
        api.seed_product(details, state)
            .with_context(|| format!("failed to seed {name}"))?;
    }
    Ok(api)
}
