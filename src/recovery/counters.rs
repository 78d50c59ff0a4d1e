//! Per-domain retry counters.

use super::RecoveryDomain;

/// Retries spent in each domain since that domain last succeeded.
///
/// Counters are independent: success in one domain never resets another,
/// and nothing resets them on a timer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryCounters {
    /// Transport retries.
    pub transport: u32,
    /// HTTP status retries.
    pub http: u32,
    /// Reconnect loop retries.
    pub reconnect: u32,
}

impl RecoveryCounters {
    /// Counter for `domain`.
    #[must_use]
    pub fn get(&self, domain: RecoveryDomain) -> u32 {
        match domain {
            RecoveryDomain::Transport => self.transport,
            RecoveryDomain::Http => self.http,
            RecoveryDomain::Reconnect => self.reconnect,
        }
    }

    /// Increment the counter for `domain` and return the new value.
    pub fn bump(&mut self, domain: RecoveryDomain) -> u32 {
        let counter = match domain {
            RecoveryDomain::Transport => &mut self.transport,
            RecoveryDomain::Http => &mut self.http,
            RecoveryDomain::Reconnect => &mut self.reconnect,
        };
        *counter = counter.saturating_add(1);
        *counter
    }

    /// The server answered: the network path works again.
    pub fn reset_transport(&mut self) { self.transport = 0; }

    /// The server answered below 300.
    pub fn reset_http(&mut self) { self.http = 0; }

    /// The connection delivered a record.
    pub fn reset_reconnect(&mut self) { self.reconnect = 0; }
}
