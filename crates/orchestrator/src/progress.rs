//! Progress notifications emitted while a session runs.

use std::fmt;
use streamgate_ledger::Balance;
use streamgate_media::StreamDescriptor;
use streamgate_types::{Address, SessionId};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionProgress {
    SourceProbed { streams: Vec<StreamDescriptor> },
    BalanceChecked { signer: Address, balance: Balance },
    SessionRequested { session_id: SessionId },
    DestinationAcquired { destination: String },
    JobApproved,
    SessionCreated { contract: Address },
    Relaying,
    /// The job reports the output endpoint as live.
    Ready { output_url: String },
    Stopping,
}

impl fmt::Display for SessionProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionProgress::SourceProbed { streams } => {
                let names: Vec<String> = streams.iter().map(|s| s.to_string()).collect();
                write!(f, "source reachable ({})", names.join(", "))
            }
            SessionProgress::BalanceChecked { signer, balance } => {
                write!(f, "account {} holds {}", signer, balance)
            }
            SessionProgress::SessionRequested { session_id } => {
                write!(f, "acquired stream id {}", session_id)
            }
            SessionProgress::DestinationAcquired { destination } => {
                write!(f, "acquired destination {}", destination)
            }
            SessionProgress::JobApproved => f.write_str("job approved"),
            SessionProgress::SessionCreated { contract } => {
                write!(f, "acquired stream address {}", contract)
            }
            SessionProgress::Relaying => f.write_str("relaying media"),
            SessionProgress::Ready { output_url } => write!(f, "stream ready at {}", output_url),
            SessionProgress::Stopping => f.write_str("stopping"),
        }
    }
}
