//! `mailburn` - disposable, time-limited email addresses from the terminal.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailburn_core::{
    ConfiguredGenerator, EntryStatus, EpochMillis, IdentityManager, MailboxGateway, Session,
    SessionConfig, SessionEvent, Settings, SqliteStore, SystemClock, TemporaryAddress, Urgency,
    format_file_size, format_remaining,
};

use cli::{Cli, Command, StatusFilter};

type Manager = IdentityManager<SqliteStore, ConfiguredGenerator, SystemClock>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailburn=info,mailburn_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings_path = cli.settings.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&settings_path)
        .await
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;
    if let Some(generator) = cli.generator {
        settings.generator = generator;
        settings.validate()?;
    }

    let database_path = settings.database_path();
    if let Some(parent) = database_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let database_path = database_path
        .to_str()
        .context("database path is not valid UTF-8")?
        .to_string();
    let store = SqliteStore::open(&database_path).await?;

    let api = settings.mailbox_api()?;
    let generator = settings.address_generator(&api)?;
    let manager: Arc<Manager> =
        Arc::new(IdentityManager::initialize(store, generator, SystemClock).await?);
    let gateway = Arc::new(MailboxGateway::new(api, Arc::clone(&manager)));
    info!("Client {} ready", manager.client_id());

    match cli.command {
        Command::New { lifetime } => {
            let address = manager.create(lifetime).await?;
            println!("{address}");
            println!("expires in {lifetime}");
        }
        Command::List { status, search } => print_entries(&manager, status, &search).await,
        Command::Delete { address } => {
            if !manager.delete(&address).await {
                bail!("{address} is not tracked");
            }
            println!("deleted {address}");
        }
        Command::Clear => {
            manager.clear().await;
            println!("history cleared");
        }
        Command::Inbox { address } => {
            let messages = gateway.list_messages(&address).await?;
            if messages.is_empty() {
                println!("no messages");
            }
            for message in messages {
                println!(
                    "{:>10}  {}  {:<30}  {}",
                    message.id, message.date, message.from, message.subject
                );
            }
        }
        Command::Read { address, id } => {
            let message = gateway.read_message(&address, id).await?;
            println!("From:    {}", message.from);
            println!("Subject: {}", message.subject);
            println!("Date:    {}", message.date);
            for attachment in &message.attachments {
                println!(
                    "Attach:  {} ({}, {})",
                    attachment.filename,
                    attachment.content_type,
                    attachment.display_size()
                );
            }
            println!();
            println!("{}", message.text());
        }
        Command::Download {
            address,
            id,
            filename,
            output,
        } => {
            let payload = gateway.fetch_attachment(&address, id, &filename).await?;
            let output = output.unwrap_or_else(|| filename.clone().into());
            tokio::fs::write(&output, &payload)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "saved {} ({})",
                output.display(),
                format_file_size(u64::try_from(payload.len()).unwrap_or(u64::MAX))
            );
        }
        Command::Stats => {
            let stats = manager.stats().await;
            println!("total:   {}", stats.total);
            println!("active:  {}", stats.active);
            println!("expired: {}", stats.expired);
        }
        Command::Export => println!("{}", manager.export_history().await?),
        Command::Watch { address } => {
            let address = address.map(|a| TemporaryAddress::parse(&a)).transpose()?;
            watch(manager, gateway, SessionConfig::from(&settings), address).await?;
        }
    }

    Ok(())
}

async fn print_entries(manager: &Manager, filter: StatusFilter, search: &str) {
    let snapshot = manager.list_entries().await;
    if snapshot.entries.is_empty() {
        println!("no tracked addresses");
        return;
    }

    let mut shown = 0;
    for entry in snapshot.matching(filter.status(), search) {
        let remaining = entry.remaining(snapshot.now);
        let marker = match (entry.status(snapshot.now), Urgency::from_remaining(remaining)) {
            (EntryStatus::Expired, _) => ' ',
            (_, Urgency::Critical) => '!',
            (_, Urgency::Warning) => '~',
            (_, Urgency::Normal) => ' ',
        };
        println!(
            "{marker} {:<40}  {:>10}  {}",
            entry.address,
            format_remaining(remaining),
            local_time(entry.expiry)
        );
        shown += 1;
    }
    if shown == 0 {
        println!("no matching addresses");
    }
}

async fn watch(
    manager: Arc<Manager>,
    gateway: Arc<MailboxGateway<Arc<Manager>>>,
    config: SessionConfig,
    address: Option<TemporaryAddress>,
) -> Result<()> {
    let mut session = Session::spawn(manager, gateway, config);
    if let Some(address) = address {
        println!("watching {address} (Ctrl-C to stop)");
        session.select(Some(address));
    } else {
        println!("sweeping expired addresses (Ctrl-C to stop)");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = session.next_event() => match event {
                Some(SessionEvent::Swept(addresses)) => {
                    for address in addresses {
                        println!("expired: {address}");
                    }
                }
                Some(SessionEvent::NewMessages { address, messages, total }) => {
                    println!("{address}: {} new ({total} total)", messages.len());
                    for message in messages {
                        println!("  [{}] {} - {}", message.id, message.from, message.subject);
                    }
                }
                Some(SessionEvent::PollFailed { address, error }) => {
                    eprintln!("{address}: check failed: {error}");
                }
                Some(SessionEvent::Deselected(address)) => {
                    println!("{address} is gone, no longer watching");
                }
                None => break,
            },
        }
    }

    session.shutdown();
    Ok(())
}

fn local_time(ms: EpochMillis) -> String {
    chrono::DateTime::from_timestamp_millis(ms).map_or_else(
        || ms.to_string(),
        |at| {
            at.with_timezone(&chrono::Local)
                .format("%a, %b %d at %H:%M")
                .to_string()
        },
    )
}
