//! Basic usage of the branch cache.
//!
//! Run with: RUST_LOG=debug cargo run --example basic_usage

use branch_cache::{CacheBranchSync, CacheDirection};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Order {
    id: u64,
    items: Vec<u64>,
}

fn main() -> branch_cache::Result<()> {
    env_logger::init();

    let tree = CacheBranchSync::<u64>::new();

    // Leaf values come from an external source.
    let price = Arc::new(AtomicU64::new(100));
    let source = Arc::clone(&price);
    tree.ensure("cart/total/price", move |_| Ok(source.load(Ordering::SeqCst)))?;
    tree.ensure("cart/total/quantity", |_| Ok(3))?;

    // The parent reads its children through the root handed to the generator.
    let total = tree.ensure("cart/total", |root| {
        let price = root.get("cart/total/price").ok_or("price missing")?;
        let quantity = root.get("cart/total/quantity").ok_or("quantity missing")?;
        Ok(*price.raw()? * *quantity.raw()?)
    })?;
    println!("total = {}", total.raw()?);

    // Price changed: refresh leaves before the parent.
    price.store(120, Ordering::SeqCst);
    tree.cache("cart/total", Some(CacheDirection::BottomUp))?;
    println!("total after price change = {}", total.raw()?);

    // Intermediate branches were created along the way but hold nothing.
    println!("cart cached? {}", tree.get("cart").is_some());
    tree.log_stats();

    tree.delete("cart");
    println!("total after delete = {:?}", tree.get("cart/total").map(|n| n.raw()));

    // Structured payloads can be copied without aliasing the cache.
    let orders = CacheBranchSync::<Order>::new();
    let order = orders.ensure("orders/1", |_| {
        Ok(Order {
            id: 1,
            items: vec![10, 20],
        })
    })?;
    let mut draft = order.structured_clone()?;
    draft.items.push(30);
    println!("cached {:?}, draft {:?}", order.raw()?, draft);

    Ok(())
}
