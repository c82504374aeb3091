//! resply-cli: interactive client for RESP servers
//!
//! Reads one command per line, splits it on whitespace, sends it and
//! prints the rendered reply. End of input closes the connection.

use clap::{ArgAction, Parser};
use resply::{Connection, ConnectionBuilder};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the interactive client
#[derive(Parser, Debug)]
#[command(name = "resply-cli")]
#[command(version = resply::VERSION)]
#[command(about = "Interactive RESP client", long_about = None)]
#[command(disable_help_flag = true)]
struct CliArgs {
    /// Set the host to connect to
    #[arg(short = 'h', long, default_value = resply::DEFAULT_HOST)]
    host: String,

    /// Set the port to connect to
    #[arg(short = 'p', long, default_value_t = resply::DEFAULT_PORT)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Show help and exit
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut conn = match ConnectionBuilder::new()
        .host(args.host.as_str())
        .port(args.port)
        .connect()
        .await
    {
        Ok(conn) => conn,
        Err(e) => {
            error!(host = %args.host, port = args.port, error = %e, "could not connect");
            return Err(e.into());
        }
    };

    run(&mut conn, &format!("{}:{}> ", args.host, args.port)).await?;
    conn.close().await;
    Ok(())
}

async fn run(conn: &mut Connection, prompt: &str) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            stdout.write_all(b"\n").await?;
            return Ok(());
        };
        let argv: Vec<&str> = line.split_whitespace().collect();
        if argv.is_empty() {
            continue;
        }

        let reply = conn.command(argv).await;
        debug!(connected = conn.is_connected(), "reply received");
        stdout.write_all(format!("{}\n", reply).as_bytes()).await?;
    }
}
