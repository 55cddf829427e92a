//! Background timers for a client session.
//!
//! Two independent tasks run per session: a sweeper that purges expired
//! addresses at a short interval, and a poller that checks the selected
//! address's mailbox at a coarser one. They share nothing but the manager,
//! so a slow mailbox request never delays a sweep.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::address::TemporaryAddress;
use crate::config::Settings;
use crate::gateway::{AddressRegistry, MailboxGateway, MessageHeader};
use crate::generator::AddressGenerator;
use crate::identity::{Clock, IdentityManager};
use crate::store::KeyValueStore;
use crate::{Error, Result};

/// Timer intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How often to sweep expired addresses.
    pub sweep_interval: Duration,
    /// How often to check the selected mailbox.
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(30),
        }
    }
}

impl SessionConfig {
    /// Shortest timer period a session will run with.
    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    /// Creates a config, rejecting zero intervals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either interval is zero.
    pub fn new(sweep_interval: Duration, poll_interval: Duration) -> Result<Self> {
        if sweep_interval.is_zero() || poll_interval.is_zero() {
            return Err(Error::Config("timer intervals must be non-zero".to_string()));
        }
        Ok(Self {
            sweep_interval,
            poll_interval,
        })
    }

    /// Intervals raised to at least [`Self::MIN_PERIOD`].
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            sweep_interval: self.sweep_interval.max(Self::MIN_PERIOD),
            poll_interval: self.poll_interval.max(Self::MIN_PERIOD),
        }
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            sweep_interval: settings.sweep_interval(),
            poll_interval: settings.poll_interval(),
        }
    }
}

/// Something a session timer observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A sweep removed these addresses.
    Swept(Vec<String>),
    /// The selected mailbox received messages not seen before.
    NewMessages {
        /// Mailbox polled.
        address: String,
        /// Messages that were not in the previous listing.
        messages: Vec<MessageHeader>,
        /// Size of the full listing.
        total: usize,
    },
    /// Polling the selected mailbox failed; the next tick tries again.
    PollFailed {
        /// Mailbox polled.
        address: String,
        /// Error text.
        error: String,
    },
    /// The selected address stopped being tracked and was deselected.
    Deselected(String),
}

/// Running timers plus the channel they report on.
///
/// Dropping the session stops both timers.
pub struct Session {
    selected: watch::Sender<Option<TemporaryAddress>>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Starts the sweeper and poller.
    ///
    /// Zero intervals are raised to [`SessionConfig::MIN_PERIOD`]. Must be
    /// called from within a tokio runtime.
    pub fn spawn<S, G, C, R>(
        manager: Arc<IdentityManager<S, G, C>>,
        gateway: Arc<MailboxGateway<R>>,
        config: SessionConfig,
    ) -> Self
    where
        S: KeyValueStore + 'static,
        G: AddressGenerator + 'static,
        C: Clock + 'static,
        R: AddressRegistry + 'static,
    {
        let config = config.clamped();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (selected, selected_rx) = watch::channel(None);

        let sweeper = tokio::spawn(run_sweeper(manager, config.sweep_interval, event_tx.clone()));
        let poller = tokio::spawn(run_poller(
            gateway,
            config.poll_interval,
            selected.clone(),
            selected_rx,
            event_tx,
        ));
        info!(
            "Session started (sweep every {:?}, poll every {:?})",
            config.sweep_interval, config.poll_interval
        );

        Self {
            selected,
            events,
            tasks: vec![sweeper, poller],
        }
    }

    /// Chooses the mailbox the poller watches. `None` stops polling.
    pub fn select(&self, address: Option<TemporaryAddress>) {
        self.selected.send_replace(address);
    }

    /// Currently watched mailbox.
    #[must_use]
    pub fn selected(&self) -> Option<TemporaryAddress> {
        self.selected.borrow().clone()
    }

    /// Waits for the next event. Returns `None` once both timers are gone.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Stops both timers.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn run_sweeper<S, G, C>(
    manager: Arc<IdentityManager<S, G, C>>,
    every: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
) where
    S: KeyValueStore,
    G: AddressGenerator,
    C: Clock,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let removed = manager.sweep_now().await;
        if !removed.is_empty() && events.send(SessionEvent::Swept(removed)).is_err() {
            debug!("Session receiver gone, stopping sweeper");
            return;
        }
    }
}

async fn run_poller<R: AddressRegistry>(
    gateway: Arc<MailboxGateway<R>>,
    every: Duration,
    selected_tx: watch::Sender<Option<TemporaryAddress>>,
    mut selected: watch::Receiver<Option<TemporaryAddress>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut watching: Option<TemporaryAddress> = None;
    let mut seen: HashSet<u64> = HashSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = selected.changed() => {
                if changed.is_err() {
                    return;
                }
                // Check a newly selected mailbox right away.
                ticker.reset_immediately();
                continue;
            }
        }

        let current = selected.borrow_and_update().clone();
        let Some(address) = current else {
            watching = None;
            continue;
        };
        if watching.as_ref() != Some(&address) {
            watching = Some(address.clone());
            seen.clear();
        }

        let event = match gateway.list_messages(address.as_str()).await {
            Ok(messages) => {
                let total = messages.len();
                let fresh: Vec<MessageHeader> =
                    messages.into_iter().filter(|m| seen.insert(m.id)).collect();
                if fresh.is_empty() {
                    continue;
                }
                SessionEvent::NewMessages {
                    address: address.to_string(),
                    messages: fresh,
                    total,
                }
            }
            Err(Error::NotTracked(_)) => {
                info!("{address} is no longer tracked, deselecting");
                selected_tx.send_if_modified(|current| {
                    if current.as_ref() == Some(&address) {
                        *current = None;
                        true
                    } else {
                        false
                    }
                });
                watching = None;
                SessionEvent::Deselected(address.to_string())
            }
            Err(e) => {
                warn!("Checking {address} failed: {e}");
                SessionEvent::PollFailed {
                    address: address.to_string(),
                    error: e.to_string(),
                }
            }
        };

        if events.send(event).is_err() {
            debug!("Session receiver gone, stopping poller");
            return;
        }
    }
}
