// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Trolley CLI
//!
//! Drives the cart engine against the local filesystem store with a small
//! built-in catalog, to exercise the full mutate → reconcile → persist →
//! broadcast loop from a terminal.

use std::collections::BTreeMap;
use std::future::{ready, Future};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use trolley_core::{
    decode_items, AddOk, AddReject, CartEngine, EngineConfig, Favorites, FavoritesStore, LineItem,
    ProductSnapshot, Resolution, RowBuildError, RowControls, RowHost, Sku, StateError,
    StateService, StateStore, StockResolver, CART_STATE_KEY, CONFIG_STATE_KEY,
    FAVORITES_STATE_KEY,
};
use trolley_store_fs::FsStateStore;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Command to execute
    #[clap(subcommand)]
    cmd: Option<Command>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run a scripted shopping session against the local store
    Demo,
    /// Print the persisted cart
    Show,
    /// Clear the persisted cart
    Reset,
}

/// Built-in catalog with one slow (deferred) product.
struct DemoCatalog;

fn snap(name: &str, price: f64, stock: u32) -> ProductSnapshot {
    ProductSnapshot {
        unit_price: price,
        stock_limit: stock,
        display_name: Some(name.to_owned()),
        image_ref: None,
        spec_attributes: BTreeMap::new(),
    }
}

impl StockResolver for DemoCatalog {
    fn lookup(&self, sku: &Sku) -> Resolution {
        match sku.as_str() {
            "oat-flour" => Resolution::Ready(snap("Oat flour 1kg", 3.20, 4)),
            "yeast" => Resolution::Ready(snap("Dry yeast 7g", 0.80, 2)),
            "honey" => {
                // Simulates a backend round-trip.
                let snapshot = snap("Forest honey 500g", 6.90, 3);
                Resolution::Deferred(Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Some(snapshot)
                }))
            }
            _ => Resolution::Unknown,
        }
    }
}

/// Renders rows as terminal lines.
#[derive(Default)]
struct ConsoleRows;

impl RowHost for ConsoleRows {
    type Row = String;

    fn build_row(
        &mut self,
        item: &LineItem,
        _controls: &RowControls,
    ) -> Result<String, RowBuildError> {
        Ok(item.sku.as_str().to_owned())
    }

    fn sync_row(&mut self, _row: &mut String, item: &LineItem, controls: &RowControls) {
        let marker = if controls.out_of_stock {
            " [no stock]"
        } else if controls.limit_reached {
            " [limit reached]"
        } else {
            ""
        };
        println!(
            "  {:<12} ×{:<2} @ {:>5.2}{}",
            item.display_name, item.quantity, item.unit_price, marker
        );
    }

    fn remove_row(&mut self, row: String) {
        println!("  (removed {row})");
    }

    fn clear(&mut self) {}

    fn next_frame(&mut self) -> impl Future<Output = ()> {
        ready(())
    }
}

fn report_add(id: &str, outcome: Result<AddOk, AddReject>) {
    match outcome {
        Ok(AddOk::Added) => info!(id, "added"),
        Ok(AddOk::AddedUnresolved) => info!(id, "added, stock pending"),
        Ok(AddOk::Partial {
            requested,
            available,
        }) => println!("only {available} of {requested} × {id} available"),
        Err(err) => println!("could not add {id}: {err}"),
    }
}

async fn run_demo(store: Arc<FsStateStore>) -> Result<()> {
    // Tunables live in the same store, under their own key.
    let config_service = StateService::new(FsStateStore::new()?);
    let config: EngineConfig = config_service
        .load(CONFIG_STATE_KEY)?
        .unwrap_or(EngineConfig {
            debounce_ms: 200,
            ..EngineConfig::default()
        });

    let mut favorites = FavoritesStore::new(
        Favorites::bounded(config.favorites_limit, config.favorites_overflow),
        Arc::clone(&store),
        FAVORITES_STATE_KEY,
        config.debounce(),
    );
    favorites.load()?;

    let mut engine = CartEngine::new(DemoCatalog, ConsoleRows, Arc::clone(&store), config);
    engine.subscribe(|update| {
        println!(
            "cart: {} item(s), total {:.2}",
            update.total_count, update.total_sum
        );
    });

    let loaded = engine.load()?;
    info!(loaded, "cart loaded");

    report_add("oat-flour", engine.add("oat-flour", 2));
    report_add("honey", engine.add("honey", 5));
    report_add("yeast", engine.add("yeast", 3));
    let _ = engine.reconcile().await;

    println!("-- bump oat-flour to 9 (stock is 4) --");
    engine.change_qty("oat-flour", 9);
    let _ = engine.reconcile().await;

    if let Some(first) = engine.cart().items().first().map(|it| it.sku.clone()) {
        favorites.toggle(first);
        println!("favorites: {} item(s)", favorites.favorites().len());
    }

    favorites.shutdown();
    engine.shutdown();
    Ok(())
}

fn show(store: &FsStateStore) -> Result<()> {
    let bytes = match store.load_raw(CART_STATE_KEY) {
        Ok(bytes) => bytes,
        Err(StateError::NotFound) => {
            println!("no persisted cart");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    for item in decode_items(&bytes)? {
        println!(
            "{:<12} ×{:<2} @ {:>5.2} (stock {})",
            item.sku, item.quantity, item.unit_price, item.stock_limit
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let store = Arc::new(FsStateStore::new()?);

    match args.cmd {
        Some(Command::Demo) => run_demo(store).await?,
        Some(Command::Show) => show(store.as_ref())?,
        Some(Command::Reset) => {
            store.save_raw(CART_STATE_KEY, b"[]")?;
            info!("cart cleared");
        }
        None => {
            println!("Trolley CLI. Use --help for usage.");
        }
    }

    Ok(())
}
