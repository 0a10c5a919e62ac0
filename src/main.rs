//! CLI for tcpsub
//!
//! Subcommands:
//! - `server`: run the broker
//! - `client`: connect to a broker and run exactly one command

use std::net::{Ipv4Addr, SocketAddrV4};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

use tcpsub::broker::Broker;
use tcpsub::broker::message::{Message, TopicStatusEntry};
use tcpsub::client::PubSubClient;
use tcpsub::config::{Settings, load_config};
use tcpsub::transport::start_server;
use tcpsub::utils::{Error, Result, logging};

#[derive(Parser)]
#[command(name = "tcpsub", version, about = "Minimal TCP publish/subscribe broker")]
enum Command {
    /// Start the broker
    Server(ServerArgs),
    /// Connect to a broker and run one command
    Client(ClientArgs),
}

impl Command {
    fn debug(&self) -> bool {
        match self {
            Command::Server(args) => args.debug,
            Command::Client(args) => args.debug,
        }
    }
}

#[derive(Args)]
struct ServerArgs {
    /// IPv4 address to listen on (default from configuration: 127.0.0.1)
    #[arg(long)]
    address: Option<Ipv4Addr>,
    /// Port to listen on (default from configuration: 8080)
    #[arg(long)]
    port: Option<u16>,
    /// Enable logging debug information
    #[arg(long)]
    debug: bool,
}

#[derive(Args)]
struct ClientArgs {
    /// Local port for the connection to the broker (0 picks a random available port)
    #[arg(long, default_value_t = 0)]
    port: u16,
    /// IPv4 address of the broker
    #[arg(long, default_value_t = Ipv4Addr::LOCALHOST)]
    server_address: Ipv4Addr,
    /// Listening port of the broker
    #[arg(long, default_value_t = 8080)]
    server_port: u16,
    /// Enable logging debug information
    #[arg(long)]
    debug: bool,
    #[command(flatten)]
    action: ClientAction,
}

/// Commands (only one per client)
#[derive(Args)]
#[group(required = true, multiple = false)]
struct ClientAction {
    /// Subscribe to (multiple) topics
    #[arg(long, num_args = 1.., value_name = "TOPIC")]
    subscribe: Option<Vec<String>>,
    /// Publish a message to a topic
    #[arg(long, num_args = 2, value_names = ["TOPIC", "MESSAGE"])]
    publish: Option<Vec<String>>,
    /// List all existing topics
    #[arg(long)]
    list_topics: bool,
    /// Get the status of (multiple) topics
    #[arg(long, num_args = 1.., value_name = "TOPIC")]
    get_topic_status: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cmd = match Command::try_parse() {
        Ok(cmd) => cmd,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(parse_exit_status(&err));
        }
    };

    let settings = load_config();
    logging::init(logging::level_for(
        settings.as_ref().ok().map(|s| &s.logging),
        cmd.debug(),
    ));

    let result = match settings {
        Ok(settings) => match cmd {
            Command::Server(args) => run_server(args, settings).await,
            Command::Client(args) => run_client(args).await,
        },
        Err(e) => Err(Error::from(e)),
    };

    match result {
        Ok(()) => {
            info!("Shutting down...");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            error!("Shutting down...");
            ExitCode::FAILURE
        }
    }
}

/// --help and --version exit 0; every other parse error exits 1 instead of clap's 2.
fn parse_exit_status(err: &clap::Error) -> u8 {
    if err.use_stderr() { 1 } else { 0 }
}

async fn run_server(args: ServerArgs, mut settings: Settings) -> Result<()> {
    if let Some(address) = args.address {
        settings.server.host = address.to_string();
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    let addr = settings.server.socket_addr()?;
    let broker = Arc::new(Broker::new(settings.broker.clone()));
    debug!(?settings, "starting broker");

    tokio::select! {
        res = start_server(addr, broker) => {
            res?;
            error!("Server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_client(args: ClientArgs) -> Result<()> {
    let server = SocketAddrV4::new(args.server_address, args.server_port);
    let client = PubSubClient::connect(args.port, server).await?;
    info!(%server, "Successfully started client.");

    let ClientAction {
        subscribe,
        publish,
        list_topics,
        get_topic_status,
    } = args.action;

    if let Some(topics) = subscribe {
        return run_subscription(client, topics).await;
    }

    if let Some(mut pair) = publish {
        let payload = pair.pop().unwrap_or_default();
        let topic = pair.pop().unwrap_or_default();
        let ack = client.publish(topic.clone(), payload).await?;
        println!(
            "Published to {topic}: status {}, delivered to {}, failed for {}",
            ack.status, ack.delivered, ack.failed
        );
        return Ok(());
    }

    if list_topics {
        for topic in client.list_topics().await? {
            println!("{topic}");
        }
        return Ok(());
    }

    if let Some(topics) = get_topic_status {
        for entry in client.get_topic_status(topics).await? {
            println!("{}", describe_status(&entry));
        }
        return Ok(());
    }

    Err(Error::InvalidArgument("no command provided".to_string()))
}

async fn run_subscription(client: PubSubClient, topics: Vec<String>) -> Result<()> {
    let mut subscription = client.subscribe(topics).await?;
    info!(topics = ?subscription.topics(), "Subscribed.");
    info!("Press ENTER key to exit...");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            message = subscription.next_message() => match message? {
                Some(message) => println!("{}", describe_message(&message)),
                None => return Err(Error::ConnectionClosed),
            },
            _ = stdin.next_line() => return Ok(()),
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

fn describe_message(message: &Message) -> String {
    format!(
        "[{}] {} ({})",
        message.topic,
        message.payload,
        format_timestamp(message.timestamp)
    )
}

fn describe_status(entry: &TopicStatusEntry) -> String {
    match entry {
        TopicStatusEntry::Known(status) => format!(
            "{}: subscribers={} messages={} last_published={} last_status={}",
            status.name,
            status.subscriber_count,
            status.message_count,
            status
                .last_timestamp
                .map(format_timestamp)
                .unwrap_or_else(|| "never".to_string()),
            status
                .last_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string()),
        ),
        TopicStatusEntry::Unknown { name } => format!("{name}: unknown topic"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> std::result::Result<Command, clap::Error> {
        Command::try_parse_from(std::iter::once("tcpsub").chain(args.iter().copied()))
    }

    fn client_args(args: &[&str]) -> ClientArgs {
        match parse(args).expect("arguments should parse") {
            Command::Client(args) => args,
            Command::Server(_) => panic!("Expected the client subcommand"),
        }
    }

    #[test]
    fn test_command_definition_is_consistent() {
        Command::command().debug_assert();
    }

    #[test]
    fn test_help_and_version_exit_zero() {
        let cases: [&[&str]; 3] = [&["--help"], &["client", "--help"], &["--version"]];
        for args in cases {
            let err = parse(args).err().expect("help is reported as an error");
            assert!(matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ));
            assert_eq!(parse_exit_status(&err), 0);
        }
    }

    #[test]
    fn test_usage_errors_exit_one() {
        let cases: [&[&str]; 5] = [
            &["client"],
            &["client", "--publish", "weather"],
            &["client", "--list-topics", "--subscribe", "weather"],
            &["server", "--address", "localhost"],
            &["bogus"],
        ];
        for args in cases {
            let err = parse(args).err().expect("arguments should be rejected");
            assert_eq!(parse_exit_status(&err), 1, "args: {args:?}");
        }
    }

    #[test]
    fn test_publish_takes_topic_and_message() {
        let args = client_args(&["client", "--publish", "weather", "sunny"]);
        assert_eq!(
            args.action.publish,
            Some(vec!["weather".to_string(), "sunny".to_string()])
        );
        assert_eq!(args.port, 0);
        assert_eq!(args.server_address, Ipv4Addr::LOCALHOST);
        assert_eq!(args.server_port, 8080);
        assert!(!args.debug);
    }

    #[test]
    fn test_subscribe_and_status_accept_many_topics() {
        let args = client_args(&["client", "--subscribe", "a", "b", "--server-port", "9000"]);
        assert_eq!(
            args.action.subscribe,
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(args.server_port, 9000);

        let args = client_args(&["client", "--get-topic-status", "x", "y", "--debug"]);
        assert_eq!(
            args.action.get_topic_status,
            Some(vec!["x".to_string(), "y".to_string()])
        );
        assert!(args.debug);
    }

    #[test]
    fn test_server_flags_are_optional() {
        match parse(&["server"]).expect("bare server parses") {
            Command::Server(args) => {
                assert_eq!(args.address, None);
                assert_eq!(args.port, None);
            }
            Command::Client(_) => panic!("Expected the server subcommand"),
        }

        match parse(&["server", "--address", "0.0.0.0", "--port", "7000", "--debug"])
            .expect("server flags parse")
        {
            Command::Server(args) => {
                assert_eq!(args.address, Some(Ipv4Addr::UNSPECIFIED));
                assert_eq!(args.port, Some(7000));
                assert!(args.debug);
            }
            Command::Client(_) => panic!("Expected the server subcommand"),
        }
    }
}
