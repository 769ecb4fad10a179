//! emberkv-cli - a one-shot query client.
//!
//! Frames its arguments as a single request, sends it to the server, and
//! prints the decoded reply:
//!
//! ```text
//! $ emberkv-cli set name ember
//! (nil)
//! $ emberkv-cli get name
//! "ember"
//! $ emberkv-cli --addr 10.0.0.5:9988 keys
//! 1) "name"
//! ```

use anyhow::{bail, Context, Result};
use emberkv::protocol::{decode_reply, encode_request, HEADER_LEN, MAX_MESSAGE_SIZE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn usage() -> ! {
    eprintln!("Usage: emberkv-cli [--addr <host:port>] <command> [args...]");
    eprintln!("Commands: get <key> | set <key> <value> | del <key> | keys");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let mut addr = format!("{}:{}", emberkv::DEFAULT_HOST, emberkv::DEFAULT_PORT);
    if args.first().map(String::as_str) == Some("--addr") {
        if args.len() < 2 {
            usage();
        }
        addr = args[1].clone();
        args.drain(..2);
    }

    if args.is_empty() {
        usage();
    }

    let framed = encode_request(&args).context("request does not fit in one frame")?;

    let mut stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    stream.write_all(&framed).await?;

    let mut header = [0u8; HEADER_LEN];
    stream
        .read_exact(&mut header)
        .await
        .context("server closed the connection without a reply")?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_MESSAGE_SIZE {
        bail!("reply length {} exceeds protocol maximum", len);
    }

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    let (reply, consumed) = decode_reply(&body)?;
    if consumed != len {
        bail!("reply frame has {} trailing bytes", len - consumed);
    }

    println!("{}", reply);
    if reply.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
