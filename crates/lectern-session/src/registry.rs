//! Code-addressed session registry with TTL expiry.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lectern_types::{PeriodicTask, SharedClock, SystemClock, add_duration};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::code::CodeAllocator;
use crate::config::RegistryConfig;
use crate::error::{Result, SessionError};
use crate::session::{
    NewParticipant, ParticipantInfo, Question, Session, SessionOptions, SessionStatus, Vote,
};

/// How many times `create` re-draws a code that was taken between
/// allocation and commit.
const COMMIT_RETRIES: usize = 8;

struct RegistryInner {
    sessions: HashMap<Uuid, Session>,
    codes: HashMap<String, Uuid>,
}

impl RegistryInner {
    fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            codes: HashMap::new(),
        }
    }

    fn session(&self, code: &str) -> Result<&Session> {
        let id = *self
            .codes
            .get(code)
            .ok_or_else(|| SessionError::NotFound(code.to_string()))?;
        self.sessions.get(&id).ok_or_else(|| dangling(code))
    }

    fn session_mut(&mut self, code: &str) -> Result<&mut Session> {
        let id = *self
            .codes
            .get(code)
            .ok_or_else(|| SessionError::NotFound(code.to_string()))?;
        self.sessions.get_mut(&id).ok_or_else(|| dangling(code))
    }

    /// Mutable access to an unexpired session.
    fn live_mut(&mut self, code: &str, now: DateTime<Utc>) -> Result<&mut Session> {
        let session = self.session_mut(code)?;
        if session.is_expired(now) {
            return Err(SessionError::Expired(code.to_string()));
        }
        Ok(session)
    }

    fn remove(&mut self, code: &str) -> Option<Session> {
        let id = self.codes.remove(code)?;
        self.sessions.remove(&id)
    }

    fn reap(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.code.clone())
            .collect();
        for code in &expired {
            self.remove(code);
        }
        expired.len()
    }
}

fn dangling(code: &str) -> SessionError {
    SessionError::Internal(format!("code {code} indexes a missing session"))
}

fn ensure_open(session: &Session) -> Result<()> {
    if session.status.is_terminal() {
        return Err(SessionError::invalid(format!(
            "session {} has ended",
            session.code
        )));
    }
    Ok(())
}

fn participant_mut<'a>(session: &'a mut Session, id: &str) -> Result<&'a mut ParticipantInfo> {
    match session.participants.get_mut(id) {
        Some(participant) => Ok(participant),
        None => Err(SessionError::invalid(format!(
            "participant {id} is not in session {}",
            session.code
        ))),
    }
}

/// Registry statistics, computed at call time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    /// Sessions held, expired-but-unswept included.
    pub total_sessions: usize,
    /// Sessions neither expired nor ended.
    pub active_sessions: usize,
    /// Sessions past expiry still awaiting the reaper.
    pub expired_sessions: usize,
    pub total_participants: usize,
    pub online_participants: usize,
    /// Mean time since creation across held sessions.
    pub avg_session_age: Duration,
}

/// Owns every session and its join code.
///
/// Cloning is cheap and yields a handle to the same registry. Expired
/// sessions stay in the table, answering [`SessionError::Expired`], until
/// [`cleanup_expired`](Self::cleanup_expired), the reaper, or a `create` at
/// the session limit removes them.
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    config: RegistryConfig,
    allocator: CodeAllocator,
    clock: SharedClock,
    reaper: Arc<PeriodicTask>,
}

impl Clone for SessionRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            config: self.config.clone(),
            allocator: self.allocator,
            clock: Arc::clone(&self.clock),
            reaper: Arc::clone(&self.reaper),
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("config", &self.config)
            .field("reaper", &self.reaper)
            .finish()
    }
}

impl SessionRegistry {
    /// Create a registry on the system clock.
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, SystemClock::shared())
    }

    /// Create a registry driven by the given clock.
    pub fn with_clock(config: RegistryConfig, clock: SharedClock) -> Self {
        let allocator = CodeAllocator::new(config.code_length, config.max_code_attempts);
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::new())),
            config,
            allocator,
            clock,
            reaper: Arc::new(PeriodicTask::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of sessions held, expired ones included until reaped.
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `code` is mapped, regardless of expiry.
    pub fn contains(&self, code: &str) -> bool {
        self.inner.lock().codes.contains_key(code)
    }

    /// Create a session under a freshly allocated code.
    pub fn create(&self, options: SessionOptions) -> Result<Session> {
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);
        if ttl.is_zero() {
            return Err(SessionError::invalid("session ttl must be positive"));
        }
        let max_participants = options
            .max_participants
            .unwrap_or(self.config.default_max_participants);
        if max_participants == 0 {
            return Err(SessionError::invalid("max_participants must be positive"));
        }

        for _ in 0..COMMIT_RETRIES {
            self.ensure_capacity(&mut self.inner.lock())?;

            // Draw outside the lock; the commit below re-checks the code.
            let code = self
                .allocator
                .allocate(|candidate| self.inner.lock().codes.contains_key(candidate))?;

            let mut inner = self.inner.lock();
            self.ensure_capacity(&mut inner)?;
            if inner.codes.contains_key(&code) {
                trace!(code = %code, "Session code taken before commit, retrying");
                continue;
            }

            let session = Session::new(
                code.clone(),
                options.clone(),
                ttl,
                max_participants,
                self.clock.now(),
            );
            inner.codes.insert(code, session.id);
            inner.sessions.insert(session.id, session.clone());

            debug!(
                code = %session.code,
                id = %session.id,
                ttl_secs = ttl.as_secs(),
                "Created session"
            );
            return Ok(session);
        }

        Err(SessionError::CodeExhausted {
            attempts: self.allocator.max_attempts(),
        })
    }

    /// Only live sessions count against `max_sessions`. Expired ones still
    /// held are reaped here once the limit is reached.
    fn ensure_capacity(&self, inner: &mut RegistryInner) -> Result<()> {
        if inner.sessions.len() < self.config.max_sessions {
            return Ok(());
        }
        let reaped = inner.reap(self.clock.now());
        if reaped > 0 {
            debug!(reaped, "Reaped expired sessions to make room");
        }
        if inner.sessions.len() >= self.config.max_sessions {
            return Err(SessionError::Full {
                limit: self.config.max_sessions,
            });
        }
        Ok(())
    }

    /// Snapshot of the session behind `code`.
    pub fn get_by_code(&self, code: &str) -> Result<Session> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        let session = inner.session(code)?;
        if session.is_expired(now) {
            return Err(SessionError::Expired(code.to_string()));
        }
        Ok(session.clone())
    }

    /// Join a participant. The first one flips the session to active.
    pub fn add_participant(
        &self,
        code: &str,
        participant_id: &str,
        info: NewParticipant,
    ) -> Result<ParticipantInfo> {
        if participant_id.trim().is_empty() {
            return Err(SessionError::invalid("participant id must not be empty"));
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;
        ensure_open(session)?;

        if session.participants.contains_key(participant_id) {
            return Err(SessionError::invalid(format!(
                "participant {participant_id} already joined session {code}"
            )));
        }
        if session.participants.len() >= session.max_participants {
            return Err(SessionError::invalid(format!(
                "session {code} is at capacity ({} participants)",
                session.max_participants
            )));
        }

        let name = if info.name.trim().is_empty() {
            participant_id.to_string()
        } else {
            info.name
        };
        let participant = ParticipantInfo {
            id: participant_id.to_string(),
            name,
            joined_at: now,
            online: true,
            last_active: now,
            attributes: info.attributes,
        };
        session
            .participants
            .insert(participant_id.to_string(), participant.clone());
        session.recompute_statistics();
        session.sync_presence_status();

        debug!(
            code = %code,
            participant = %participant_id,
            participants = session.participants.len(),
            "Participant joined"
        );
        Ok(participant)
    }

    /// Remove a participant. The session returns to waiting once empty.
    pub fn remove_participant(&self, code: &str, participant_id: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;
        ensure_open(session)?;

        if session.participants.remove(participant_id).is_none() {
            return Err(SessionError::invalid(format!(
                "participant {participant_id} is not in session {code}"
            )));
        }
        session.recompute_statistics();
        session.sync_presence_status();

        debug!(
            code = %code,
            participant = %participant_id,
            status = %session.status,
            "Participant left"
        );
        Ok(true)
    }

    /// Mark a participant online and refresh its last-active time.
    pub fn update_activity(&self, code: &str, participant_id: &str) -> Result<()> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;
        ensure_open(session)?;

        let participant = participant_mut(session, participant_id)?;
        participant.online = true;
        participant.last_active = now;
        session.recompute_statistics();
        Ok(())
    }

    /// Mark a participant offline without removing it.
    pub fn mark_offline(&self, code: &str, participant_id: &str) -> Result<()> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;
        ensure_open(session)?;

        participant_mut(session, participant_id)?.online = false;
        session.recompute_statistics();
        trace!(code = %code, participant = %participant_id, "Participant offline");
        Ok(())
    }

    /// Set the session status. Returns whether anything changed.
    ///
    /// Ending a session forces every participant offline and closes the
    /// current question. An ended session ignores further status changes.
    pub fn update_status(&self, code: &str, status: SessionStatus) -> Result<bool> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;

        if session.status.is_terminal() || session.status == status {
            return Ok(false);
        }

        let previous = session.status;
        if status == SessionStatus::Ended {
            session.end(now);
        } else {
            session.status = status;
        }

        debug!(code = %code, from = %previous, to = %status, "Session status changed");
        Ok(true)
    }

    /// Push the expiry back by `extra`. Returns the new expiry.
    pub fn extend(&self, code: &str, extra: Duration) -> Result<DateTime<Utc>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;
        session.expires_at = add_duration(session.expires_at, extra);
        debug!(code = %code, expires_at = %session.expires_at, "Session extended");
        Ok(session.expires_at)
    }

    /// Replace the current question.
    pub fn set_question(&self, code: &str, text: &str) -> Result<bool> {
        if text.trim().is_empty() {
            return Err(SessionError::invalid("question text must not be empty"));
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;
        ensure_open(session)?;

        session.close_topic(now);
        session.current_question = Some(Question {
            text: text.to_string(),
            asked_at: now,
        });
        session.statistics.questions_asked += 1;
        trace!(code = %code, "Question set");
        Ok(true)
    }

    /// Drop the current question. Returns whether one was set.
    pub fn clear_question(&self, code: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;
        ensure_open(session)?;

        session.close_topic(now);
        Ok(session.current_question.take().is_some())
    }

    /// Replace the current vote.
    pub fn set_vote(&self, code: &str, data: serde_json::Value) -> Result<bool> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;
        ensure_open(session)?;

        session.current_vote = Some(Vote {
            data,
            opened_at: now,
        });
        session.statistics.votes_held += 1;
        trace!(code = %code, "Vote opened");
        Ok(true)
    }

    /// Close the current vote. Returns whether one was open.
    pub fn clear_vote(&self, code: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let session = inner.live_mut(code, now)?;
        ensure_open(session)?;
        Ok(session.current_vote.take().is_some())
    }

    /// Delete a session outright. Returns whether it existed.
    pub fn remove(&self, code: &str) -> bool {
        let removed = self.inner.lock().remove(code).is_some();
        if removed {
            debug!(code = %code, "Removed session");
        }
        removed
    }

    /// Sessions that are neither expired nor ended, oldest first.
    pub fn list_active(&self) -> Vec<Session> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        let mut active: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| s.is_live(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.code.cmp(&b.code)));
        active
    }

    /// Remove every expired session. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        reap(&self.inner, self.clock.now())
    }

    /// Get registry statistics.
    pub fn stats(&self) -> RegistryStats {
        let now = self.clock.now();
        let inner = self.inner.lock();

        let mut stats = RegistryStats {
            total_sessions: inner.sessions.len(),
            ..RegistryStats::default()
        };
        let mut total_age = Duration::ZERO;
        for session in inner.sessions.values() {
            if session.is_expired(now) {
                stats.expired_sessions += 1;
            } else if !session.status.is_terminal() {
                stats.active_sessions += 1;
            }
            stats.total_participants += session.participants.len();
            stats.online_participants += session.online_count();
            total_age += session.age(now);
        }
        if let Ok(count) = u32::try_from(stats.total_sessions)
            && count > 0
        {
            stats.avg_session_age = total_age / count;
        }
        stats
    }

    /// Spawn the background reaper on the current tokio runtime.
    ///
    /// Returns `false` if it is disabled, already running, or no runtime is
    /// available.
    pub fn start_reaper(&self) -> bool {
        if !self.config.enable_cleanup_task {
            return false;
        }
        let inner: Weak<Mutex<RegistryInner>> = Arc::downgrade(&self.inner);
        let clock = Arc::clone(&self.clock);
        self.reaper
            .start("session-reaper", self.config.cleanup_interval, move || {
                let alive = match inner.upgrade() {
                    Some(inner) => {
                        reap(&inner, clock.now());
                        true
                    }
                    None => false,
                };
                async move { alive }
            })
    }

    /// Stop the reaper and drop every session. Safe to call repeatedly.
    pub fn stop(&self) {
        self.reaper.stop();
        let mut inner = self.inner.lock();
        let dropped = inner.sessions.len();
        inner.sessions.clear();
        inner.codes.clear();
        if dropped > 0 {
            debug!(dropped, "Session registry stopped");
        }
    }
}

fn reap(inner: &Mutex<RegistryInner>, now: DateTime<Utc>) -> usize {
    let removed = inner.lock().reap(now);
    if removed > 0 {
        info!(removed, "Reaped expired sessions");
    }
    removed
}
