//! This example shows:
//! - Creating a client
//! - Fetching the archive for a board
//! - Extracting and printing the oldest archived thread number

use lazy4chan::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    simple_logger::init_with_level(log::Level::Debug)?;

    let client = Client::new();

    // Boards without an archive yield an empty list instead of an error
    let archive = client.get_archive("po").await?;

    match archive.first() {
        Some(no) => println!("Oldest Archived Thread: {no}"),
        _ => println!("No archived threads found."),
    }

    Ok(())
}
