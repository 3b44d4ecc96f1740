//! Session and participant data model.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lectern_types::{add_duration, elapsed_between};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Nobody has joined, or everyone has left.
    Waiting,
    /// At least one participant is present.
    Active,
    /// Closed by the owner. Terminal.
    Ended,
}

impl SessionStatus {
    /// Whether no further transitions are allowed.
    pub fn is_terminal(self) -> bool {
        self == SessionStatus::Ended
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Waiting => write!(f, "waiting"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Ended => write!(f, "ended"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(SessionStatus::Waiting),
            "active" => Ok(SessionStatus::Active),
            "ended" => Ok(SessionStatus::Ended),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// A participant in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: String,
    pub name: String,
    pub joined_at: DateTime<Utc>,
    pub online: bool,
    pub last_active: DateTime<Utc>,
    /// Free-form attributes supplied by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
}

/// What a client supplies when joining.
#[derive(Debug, Clone, Default)]
pub struct NewParticipant {
    /// Display name; defaults to the participant id when empty.
    pub name: String,
    pub attributes: Option<serde_json::Value>,
}

impl NewParticipant {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: None,
        }
    }

    pub fn with_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// The prompt currently posed to the class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub asked_at: DateTime<Utc>,
}

/// The poll currently open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub data: serde_json::Value,
    pub opened_at: DateTime<Utc>,
}

/// Aggregate counters, recomputed on every participant change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatistics {
    /// Participants currently in the session.
    pub total_participants: usize,
    /// Participants currently online.
    pub active_participants: usize,
    /// Highest `total_participants` seen.
    pub peak_participants: usize,
    pub questions_asked: usize,
    pub votes_held: usize,
    /// Time each question text spent as the current question.
    pub topic_durations: BTreeMap<String, Duration>,
}

/// Options for [`SessionRegistry::create`](crate::SessionRegistry::create).
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Lifetime; `None` uses the registry default.
    pub ttl: Option<Duration>,
    /// Creating instructor.
    pub owner_id: Option<String>,
    pub title: Option<String>,
    /// Participant capacity; `None` uses the registry default.
    pub max_participants: Option<usize>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_max_participants(mut self, max: usize) -> Self {
        self.max_participants = Some(max);
        self
    }
}

/// A classroom session addressed by its join code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub code: String,
    pub title: Option<String>,
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_participants: usize,
    pub participants: HashMap<String, ParticipantInfo>,
    pub status: SessionStatus,
    pub statistics: SessionStatistics,
    pub current_question: Option<Question>,
    pub current_vote: Option<Vote>,
}

impl Session {
    pub(crate) fn new(
        code: String,
        options: SessionOptions,
        ttl: Duration,
        max_participants: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            title: options.title,
            owner_id: options.owner_id,
            created_at: now,
            expires_at: add_duration(now, ttl),
            max_participants,
            participants: HashMap::new(),
            status: SessionStatus::Waiting,
            statistics: SessionStatistics::default(),
            current_question: None,
            current_vote: None,
        }
    }

    /// Whether the session is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Not expired and not ended.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && !self.status.is_terminal()
    }

    pub fn participant(&self, id: &str) -> Option<&ParticipantInfo> {
        self.participants.get(id)
    }

    pub fn online_count(&self) -> usize {
        self.participants.values().filter(|p| p.online).count()
    }

    /// Time since creation.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        elapsed_between(self.created_at, now)
    }

    /// Time until expiry (zero once expired).
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        elapsed_between(now, self.expires_at)
    }

    pub(crate) fn recompute_statistics(&mut self) {
        let total = self.participants.len();
        let stats = &mut self.statistics;
        stats.total_participants = total;
        stats.active_participants = self.participants.values().filter(|p| p.online).count();
        stats.peak_participants = stats.peak_participants.max(total);
    }

    /// Waiting while empty, active while anyone is present. Ended is sticky.
    pub(crate) fn sync_presence_status(&mut self) {
        self.status = match self.status {
            SessionStatus::Ended => SessionStatus::Ended,
            _ if self.participants.is_empty() => SessionStatus::Waiting,
            _ => SessionStatus::Active,
        };
    }

    /// Credit the current question's time to its topic.
    pub(crate) fn close_topic(&mut self, now: DateTime<Utc>) {
        if let Some(question) = &self.current_question {
            let spent = elapsed_between(question.asked_at, now);
            *self
                .statistics
                .topic_durations
                .entry(question.text.clone())
                .or_default() += spent;
        }
    }

    pub(crate) fn end(&mut self, now: DateTime<Utc>) {
        self.close_topic(now);
        self.current_question = None;
        self.current_vote = None;
        for participant in self.participants.values_mut() {
            participant.online = false;
        }
        self.status = SessionStatus::Ended;
        self.recompute_statistics();
    }
}
