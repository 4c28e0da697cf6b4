use serde::{Deserialize, Serialize};

/// Sort two identifiers into `(lower, higher)`.
///
/// An unordered pair then has exactly one key, which is what the
/// `UNIQUE(owner_id, client_id)` constraint on threads relies on.
pub fn canonical_pair<T: Ord>(a: T, b: T) -> (T, T) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Which side of a thread a participant sits on.
///
/// The owner is the participant with the lower user id, the client the one
/// with the higher id. It says nothing about who started the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Client,
}

impl Role {
    pub fn other(self) -> Self {
        match self {
            Role::Owner => Role::Client,
            Role::Client => Role::Owner,
        }
    }
}

/// Flags one participant holds on a thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantState {
    /// False while the thread is still a message request for this participant.
    pub accepted: bool,
    /// This participant blocked the other one.
    pub blocked_other: bool,
    pub archived: bool,
}

/// Both participants' flags, indexed by role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadState {
    pub owner: ParticipantState,
    pub client: ParticipantState,
}

impl ThreadState {
    /// Initial flags for a new thread: the initiator is accepted, the
    /// recipient starts out with a pending request.
    pub fn initiated_by(role: Role) -> Self {
        let mut state = Self::default();
        state.get_mut(role).accepted = true;
        state
    }

    pub fn get(&self, role: Role) -> &ParticipantState {
        match role {
            Role::Owner => &self.owner,
            Role::Client => &self.client,
        }
    }

    pub fn get_mut(&mut self, role: Role) -> &mut ParticipantState {
        match role {
            Role::Owner => &mut self.owner,
            Role::Client => &mut self.client,
        }
    }

    /// True if either side has blocked the other. Blocks are symmetric for
    /// sending: neither participant may post into a blocked thread.
    pub fn is_blocked(&self) -> bool {
        self.owner.blocked_other || self.client.blocked_other
    }

    /// Apply a participant action. `Delete` is terminal and handled by the
    /// caller; it leaves the flags untouched here.
    pub fn apply(&mut self, role: Role, action: ThreadAction) {
        let me = self.get_mut(role);
        match action {
            ThreadAction::Accept => me.accepted = true,
            ThreadAction::Block => me.blocked_other = true,
            ThreadAction::Unblock => me.blocked_other = false,
            ThreadAction::Archive => me.archived = true,
            ThreadAction::Unarchive => me.archived = false,
            ThreadAction::Delete => {}
        }
    }
}

/// Explicit participant actions on a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadAction {
    Accept,
    Block,
    Unblock,
    Archive,
    Unarchive,
    Delete,
}

impl ThreadAction {
    /// Case-insensitive, whitespace-tolerant parse.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "accept" => Some(Self::Accept),
            "block" => Some(Self::Block),
            "unblock" => Some(Self::Unblock),
            "archive" => Some(Self::Archive),
            "unarchive" => Some(Self::Unarchive),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}
