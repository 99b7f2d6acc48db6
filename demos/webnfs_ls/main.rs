//! Lists a directory on a WebNFS server through its public file handle.
//!
//! ```text
//! cargo run --example webnfs-ls -- <server> [path] [user password]
//! ```

use anyhow::{bail, Context};
use nfs_mamont_client::{ClientConfig, FileType, NfsClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(server) = args.first() else {
        bail!("usage: webnfs-ls <server> [path] [user password]");
    };
    let path = args.get(1).map(String::as_str).unwrap_or("/");

    let client = NfsClient::new(ClientConfig::default());
    if let [_, _, user, password] = args.as_slice() {
        if !client.fetch_credential(server, user, password).await {
            eprintln!("pcnfsd login failed, continuing as nobody");
        }
    }

    let dir = client.open(server, path).await.with_context(|| format!("cannot open {path}"))?;
    if dir.file_type() != FileType::Directory {
        bail!("{path} is not a directory");
    }
    for name in dir.readdir().await?.iter() {
        let entry = dir.lookup_nofollow(name).await?;
        let attributes = entry.getattr().await?;
        let marker = match entry.file_type() {
            FileType::Directory => "/",
            FileType::Symlink => "@",
            _ => "",
        };
        println!("{:o} {:>10} {name}{marker}", attributes.mode & 0o7777, attributes.size);
    }

    client.shutdown().await;
    Ok(())
}
