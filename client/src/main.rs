use clap::{Parser, Subcommand};
use client::{Credentials, Session, SessionConfig};
use log::info;
use protocol::{DEFAULT_HOST, DEFAULT_PORT};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host name
    #[arg(short = 'H', long, default_value_t = DEFAULT_HOST.to_string())]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Registered handle; logs in as a guest when absent
    #[arg(short, long)]
    login: Option<String>,

    /// Password for the registered handle
    #[arg(long, requires = "login")]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List games in progress
    Games,
    /// List users online
    Who,
    /// List open seeks
    Sought,
    /// Follow a game until it ends
    Observe { game: u32 },
    /// Print chat messages, optionally joining channels first
    Chat {
        #[arg(short, long)]
        channel: Vec<u32>,
    },
    /// Send a raw command and print every line until the next prompt
    Passthrough {
        #[arg(required = true)]
        command: Vec<String>,
    },
}

fn print_json<T: Serialize>(record: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(record)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to {}:{}", args.host, args.port);
    let session = Session::connect((args.host.as_str(), args.port), SessionConfig::default()).await?;

    let credentials = args
        .login
        .map(|username| Credentials::new(username, args.password.unwrap_or_default()));
    let outcome = session.login(credentials).await?;
    info!("Logged in as {}", outcome.username);

    match args.command {
        Command::Games => {
            for game in session.games().await? {
                print_json(&game)?;
            }
        }
        Command::Who => {
            for user in session.who().await? {
                print_json(&user)?;
            }
        }
        Command::Sought => {
            for ad in session.sought().await? {
                print_json(&ad)?;
            }
        }
        Command::Observe { game } => {
            let mut observation = session.observe(game);
            while let Some(event) = observation.next_event().await {
                print_json(&event)?;
            }
            print_json(&observation.finish().await?)?;
        }
        Command::Chat { channel } => {
            let mut feed = session.chat();
            for number in channel {
                if !session.join_channel(number).await? {
                    info!("Channel {} was already on the list", number);
                }
            }
            while let Some(message) = feed.next().await {
                print_json(&message)?;
            }
        }
        Command::Passthrough { command } => {
            let mut lines = session.lines();
            let mut done = session.send(&command.join(" "));

            loop {
                tokio::select! {
                    biased;

                    line = lines.next() => match line {
                        Some(line) if !line.is_idle_prompt() => println!("{}", line.text()),
                        Some(_) => {}
                        None => break,
                    },
                    result = &mut done => {
                        result?;
                        break;
                    }
                }
            }
        }
    }

    session.close().await?;
    Ok(())
}
