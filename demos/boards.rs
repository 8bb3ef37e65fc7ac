//! This example shows:
//! - Configuring a client with a custom hold and concurrency limit
//! - Listing every board
//! - Fetching several catalogs concurrently through one client

use std::{sync::Arc, time::Duration};

use lazy4chan::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    simple_logger::init_with_level(log::Level::Debug)?;

    let client = Arc::new(
        Client::builder()
            .hold(Duration::from_millis(1500))
            .limit(4)
            .build()?,
    );

    let boards = client.get_boards().await?;
    println!("{} boards", boards.len());

    let names: Vec<String> = boards
        .iter()
        .take(3)
        .filter_map(|board| board.try_get("board")?.as_str().map(ToString::to_string))
        .collect();

    // requests start at least 1.5 seconds apart, even when issued together
    let mut handles = vec![];
    for name in names {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            let catalog = client.get_catalog(&name).await?;
            let pages = catalog.attr("pages")?.as_seq().map_or(0, |p| p.len());
            anyhow::Ok((name, pages))
        }));
    }

    for handle in handles {
        let (name, pages) = handle.await??;
        println!("/{name}/ has {pages} catalog pages");
    }

    Ok(())
}
