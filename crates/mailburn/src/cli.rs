//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use mailburn_core::{EntryStatus, GeneratorKind, Lifetime};

/// Disposable, time-limited email addresses.
#[derive(Debug, Parser)]
#[command(name = "mailburn", version, about)]
pub struct Cli {
    /// Settings file (defaults to the platform config dir).
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Override where new addresses come from.
    #[arg(long, global = true, value_parser = parse_generator)]
    pub generator: Option<GeneratorKind>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new address.
    New {
        /// Lifetime: a preset (`1h`, `24h`, `7d`, `2w`) or `<n><unit>` with
        /// unit `h`, `d`, `w` or `mo` (30 days).
        #[arg(default_value = "1h", value_parser = parse_lifetime)]
        lifetime: Lifetime,
    },
    /// List tracked addresses with their remaining time.
    List {
        /// Only show addresses in this state.
        #[arg(long, value_enum, default_value_t = StatusFilter::All)]
        status: StatusFilter,
        /// Only show addresses containing this text (case-insensitive).
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Stop tracking an address.
    Delete {
        /// Address to forget.
        address: String,
    },
    /// Forget every address.
    Clear,
    /// Show the messages of an address.
    Inbox {
        /// Tracked address.
        address: String,
    },
    /// Print one message.
    Read {
        /// Tracked address.
        address: String,
        /// Message id from `inbox`.
        id: u64,
    },
    /// Save an attachment.
    Download {
        /// Tracked address.
        address: String,
        /// Message id from `inbox`.
        id: u64,
        /// Attachment file name.
        filename: String,
        /// Destination (defaults to the attachment name).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show total, active and expired counts.
    Stats,
    /// Print the address history as JSON.
    Export,
    /// Keep running: sweep expired addresses and watch a mailbox for mail.
    Watch {
        /// Address whose mailbox to poll.
        address: Option<String>,
    },
}

/// Which entries `list` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusFilter {
    /// Everything tracked.
    All,
    /// Not yet expired.
    Active,
    /// Expired but not yet swept.
    Expired,
}

impl StatusFilter {
    /// Status to match, `None` for all.
    pub const fn status(self) -> Option<EntryStatus> {
        match self {
            Self::All => None,
            Self::Active => Some(EntryStatus::Active),
            Self::Expired => Some(EntryStatus::Expired),
        }
    }
}

fn parse_lifetime(s: &str) -> Result<Lifetime, String> {
    s.parse().map_err(|e: mailburn_core::Error| e.to_string())
}

fn parse_generator(s: &str) -> Result<GeneratorKind, String> {
    match s {
        "remote" => Ok(GeneratorKind::Remote),
        "local" => Ok(GeneratorKind::Local),
        other => Err(format!("unknown generator {other:?} (expected remote or local)")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults_to_one_hour() {
        let cli = Cli::try_parse_from(["mailburn", "new"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::New { lifetime } if lifetime == Lifetime::ONE_HOUR
        ));
    }

    #[test]
    fn test_new_with_units() {
        let cli = Cli::try_parse_from(["mailburn", "new", "3d", "--generator", "local"]).unwrap();
        assert_eq!(cli.generator, Some(GeneratorKind::Local));
        assert!(matches!(
            cli.command,
            Command::New { lifetime } if lifetime.as_millis() == 3 * 86_400_000
        ));
    }

    #[test]
    fn test_list_filters() {
        let cli = Cli::try_parse_from(["mailburn", "list"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::List { status: StatusFilter::All, ref search } if search.is_empty()
        ));

        let cli = Cli::try_parse_from([
            "mailburn", "list", "--status", "expired", "--search", "1secmail.org",
        ])
        .unwrap();
        match cli.command {
            Command::List { status, search } => {
                assert_eq!(status.status(), Some(EntryStatus::Expired));
                assert_eq!(search, "1secmail.org");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["mailburn", "list", "--status", "stale"]).is_err());
    }

    #[test]
    fn test_rejects_zero_lifetime() {
        assert!(Cli::try_parse_from(["mailburn", "new", "0h"]).is_err());
    }

    #[test]
    fn test_download_args() {
        let cli = Cli::try_parse_from([
            "mailburn", "download", "a@1secmail.com", "639", "notes.txt", "-o", "/tmp/n.txt",
        ])
        .unwrap();
        match cli.command {
            Command::Download {
                id, filename, output, ..
            } => {
                assert_eq!(id, 639);
                assert_eq!(filename, "notes.txt");
                assert_eq!(output, Some(PathBuf::from("/tmp/n.txt")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
