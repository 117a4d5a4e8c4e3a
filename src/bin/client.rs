//! linechat-client: forwards stdin lines to a linechat server and prints
//! everything the server sends back.
//!
//! Usage: linechat-client [host:port]

use std::time::Duration;

use anyhow::{Context, Result};
use linechat::constants::DEFAULT_PORT;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let addr = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LINECHAT_ADDR").ok())
        .unwrap_or_else(|| format!("127.0.0.1:{DEFAULT_PORT}"));

    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
        .await
        .context("connection timed out")?
        .with_context(|| format!("failed to connect to {addr}"))?;
    stream.set_nodelay(true)?;

    let (mut read_half, mut write_half) = stream.into_split();

    // Reader task
    let read_handle = tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match read_half.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => print!("{}", String::from_utf8_lossy(&buf[..n])),
            }
        }
        println!("Connection closed by server");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        // The server treats each read as one message, so each line is one write.
        if write_half.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if line == "/close" {
            break;
        }
    }

    let _ = write_half.shutdown().await;
    let _ = read_handle.await;
    Ok(())
}
