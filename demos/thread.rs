//! This example shows:
//! - Fetching the threads on the first index page of a board
//! - Fetching the posts of the first thread
//! - Reading post fields through attribute-style access

use lazy4chan::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;

    let client = Client::new();

    // each thread on an index page carries its OP and latest replies
    let threads = client.get_threads("po", Some(1)).await?;
    let Some(op) = threads
        .first()
        .map(|thread| thread.attr("posts"))
        .transpose()?
        .and_then(|posts| posts.as_seq()?.first())
    else {
        println!("No threads on the first page.");
        return Ok(());
    };
    let no = op
        .attr("no")?
        .as_u64()
        .ok_or_else(|| anyhow::anyhow!("thread number is not an integer"))?;

    // the second request waits out the hold interval
    let posts = client.get_thread("po", no).await?;
    println!("Thread {no} has {} posts", posts.len());

    for post in posts.iter().take(5) {
        let com = post.try_get("com").and_then(|c| c.as_str()).unwrap_or("");
        println!("{}: {}", post.attr("no")?.as_u64().unwrap_or_default(), com.replace("<br>", "\n"));
    }

    Ok(())
}
