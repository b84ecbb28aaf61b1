//! Subcommand implementations.
//!
//! Each command writes protocol output to the given writer so the binary
//! can hand in stdout and tests can hand in a buffer.

use std::time::Duration;

use anyhow::{Context, Result};
use hkp_client::{help, ClientConfig, HkpClient, HttpTransport, KeyStream};
use hkp_common::{HkpError, KeyserverUri};
use hkp_pool::{DnsResolver, HostSelector};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::args::{Cli, Commands, GetArgs, HostsArgs, PutArgs, SchemesArgs, SearchArgs};
use crate::{DEFAULT_KEYSERVER, KEYSERVER_ENV};

/// Picks the keyserver from the flag, then the environment, then the default.
pub fn resolve_keyserver(flag: Option<&str>, env: Option<String>) -> Result<KeyserverUri> {
    let raw = match (flag, env) {
        (Some(flag), _) => flag.to_string(),
        (None, Some(env)) if !env.trim().is_empty() => env,
        _ => DEFAULT_KEYSERVER.to_string(),
    };
    KeyserverUri::parse(&raw).with_context(|| format!("Invalid keyserver '{}'", raw))
}

pub fn client_config(cli: &Cli) -> ClientConfig {
    ClientConfig {
        max_redirects: cli.max_redirects,
        request_timeout: Duration::from_secs(cli.timeout_secs),
    }
}

/// Reads key material from `path`, or from stdin when `path` is `-`.
pub async fn read_key_material(path: &str) -> Result<Vec<u8>> {
    let data = if path == "-" {
        let mut data = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut data)
            .await
            .context("Failed to read key from stdin")?;
        data
    } else {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read key from '{}'", path))?
    };

    if data.is_empty() {
        anyhow::bail!("No key material in '{}'", path);
    }
    Ok(data)
}

/// Runs the parsed command line against the real network.
pub async fn run(cli: Cli) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    if let Commands::Schemes(args) = &cli.command {
        return run_schemes(args, &mut stdout).await;
    }

    let uri = resolve_keyserver(cli.keyserver.as_deref(), std::env::var(KEYSERVER_ENV).ok())?;
    let client = HkpClient::new(client_config(&cli));
    tracing::debug!("using keyserver {}", uri);

    match &cli.command {
        Commands::Search(args) => run_search(&client, &uri, args, &mut stdout).await,
        Commands::Get(args) => run_get(&client, &uri, args, &mut stdout).await,
        Commands::Put(args) => run_put(&client, &uri, args).await,
        Commands::Hosts(args) => run_hosts(client.selector(), args, &mut stdout).await,
        Commands::Schemes(_) => Ok(()),
    }
}

pub async fn run_search<T, R, W>(
    client: &HkpClient<T, R>,
    uri: &KeyserverUri,
    args: &SearchArgs,
    out: &mut W,
) -> Result<()>
where
    T: HttpTransport,
    R: DnsResolver,
    W: AsyncWrite + Unpin,
{
    let result = client.search(uri, &args.pattern).await;
    let mut stream = quarantine_on_failure(client, result).await?;
    copy_stream(&mut stream, out).await
}

/// Fetches every requested key.
///
/// A failed key does not stop the rest. Its host is quarantined first, so
/// the remaining keys go to another pool member when there is one.
pub async fn run_get<T, R, W>(
    client: &HkpClient<T, R>,
    uri: &KeyserverUri,
    args: &GetArgs,
    out: &mut W,
) -> Result<()>
where
    T: HttpTransport,
    R: DnsResolver,
    W: AsyncWrite + Unpin,
{
    if args.keyspecs.is_empty() {
        anyhow::bail!("No key specified");
    }

    let mut failed: Vec<&str> = Vec::new();
    for keyspec in &args.keyspecs {
        let result = client.get(uri, keyspec).await;
        match quarantine_on_failure(client, result).await {
            Ok(mut stream) => copy_stream(&mut stream, out).await?,
            Err(e) => {
                tracing::error!("failed to fetch '{}': {}", keyspec, e);
                failed.push(keyspec);
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("Failed to fetch {}", failed.join(", "));
    }
    Ok(())
}

pub async fn run_put<T, R>(client: &HkpClient<T, R>, uri: &KeyserverUri, args: &PutArgs) -> Result<()>
where
    T: HttpTransport,
    R: DnsResolver,
{
    let data = read_key_material(&args.file).await?;
    let result = client.put(uri, &data).await;
    quarantine_on_failure(client, result).await?;
    tracing::info!("uploaded {} bytes of key material to {}", data.len(), uri);
    Ok(())
}

/// Selects every name, then prints the resulting host table as JSON.
pub async fn run_hosts<R, W>(selector: &HostSelector<R>, args: &HostsArgs, out: &mut W) -> Result<()>
where
    R: DnsResolver,
    W: AsyncWrite + Unpin,
{
    for name in &args.names {
        match selector.select(name).await {
            Ok(host) => tracing::info!("'{}' maps to '{}'", name, host),
            Err(e) => tracing::warn!("no host for '{}': {}", name, e),
        }
    }
    selector.debug_dump().await;

    let json = selector.snapshot().await.to_json_pretty()?;
    out.write_all(json.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

pub async fn run_schemes<W>(args: &SchemesArgs, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let uri = args.uri.as_deref().map(KeyserverUri::parse).transpose()?;
    match help(uri.as_ref()) {
        Some(text) => {
            out.write_all(text.as_bytes()).await?;
            if !text.ends_with('\n') {
                out.write_all(b"\n").await?;
            }
            out.flush().await?;
        }
        None => tracing::info!("no handler help for '{}'", args.uri.as_deref().unwrap_or("")),
    }
    Ok(())
}

/// Reports the failing host dead when `result` says it did not answer.
async fn quarantine_on_failure<T, R, V>(
    client: &HkpClient<T, R>,
    result: hkp_common::Result<V>,
) -> hkp_common::Result<V>
where
    T: HttpTransport,
    R: DnsResolver,
{
    if let Err(HkpError::Connect { target, .. } | HkpError::Response { target, .. }) = &result {
        client.report_dead(target).await;
    }
    result
}

async fn copy_stream<W>(stream: &mut KeyStream, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let copied = stream
        .copy_to(out)
        .await
        .with_context(|| format!("Failed to read response from '{}'", stream.source()))?;
    tracing::debug!("copied {} bytes from {}", copied, stream.source());
    Ok(())
}
