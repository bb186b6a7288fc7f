use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use teloxide::types::{ChatId, UserId};
use tracing::{debug, warn};

use crate::config::Speeds;
use crate::database::connection::RecordResponse;
use crate::database::quiz::{Quiz, Response};
use crate::error::QuizError;
use crate::leaderboard::Standing;
use crate::session::{Phase, QuizSession};
use crate::transport::{PollRef, Transport};

type SharedSession = Arc<tokio::sync::Mutex<QuizSession>>;

struct Entry {
    creator: UserId,
    title: String,
    session: SharedSession,
}

/// Owns every live session, one per chat.
///
/// The maps sit behind short std locks that are never held across an
/// `.await`; each session has its own async lock so commands and answers for
/// one chat run one at a time while other chats proceed in parallel.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ChatId, Entry>>,
    // Poll answers carry no chat, so outstanding polls are indexed here.
    polls: Mutex<HashMap<PollRef, ChatId>>,
    speeds: Speeds,
}

impl SessionRegistry {
    pub fn new(speeds: Speeds) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
            speeds,
        }
    }

    pub fn speeds(&self) -> Speeds {
        self.speeds
    }

    pub fn is_running(&self, chat: ChatId) -> bool {
        self.lock_sessions().contains_key(&chat)
    }

    /// Creator of the quiz running in `chat`, for authorizing control commands.
    pub fn creator(&self, chat: ChatId) -> Option<UserId> {
        self.lock_sessions().get(&chat).map(|entry| entry.creator)
    }

    pub async fn start<T: Transport>(
        &self,
        chat: ChatId,
        quiz: Quiz,
        transport: &T,
    ) -> Result<(), QuizError> {
        let slot = {
            let mut sessions = self.lock_sessions();
            if sessions.contains_key(&chat) {
                return Err(QuizError::SessionConflict);
            }
            let creator = quiz.creator();
            let title = quiz.title().to_owned();
            let session = Arc::new(tokio::sync::Mutex::new(QuizSession::new(
                chat,
                quiz,
                self.speeds.normal,
            )?));
            sessions.insert(
                chat,
                Entry {
                    creator,
                    title,
                    session: session.clone(),
                },
            );
            session
        };

        let mut session = slot.lock().await;
        let result = session.start(transport).await;
        if result.is_err() {
            self.remove(chat, &slot);
        } else {
            self.sync(&session, &slot);
        }
        result
    }

    pub async fn advance<T: Transport>(&self, chat: ChatId, transport: &T) -> Result<(), QuizError> {
        let slot = self.session(chat)?;
        let mut session = slot.lock().await;
        let result = session.advance(transport).await;
        self.sync(&session, &slot);
        result
    }

    pub async fn pause(&self, chat: ChatId) -> Result<(), QuizError> {
        let slot = self.session(chat)?;
        let mut session = slot.lock().await;
        session.pause()
    }

    pub async fn resume<T: Transport>(&self, chat: ChatId, transport: &T) -> Result<(), QuizError> {
        let slot = self.session(chat)?;
        let mut session = slot.lock().await;
        let result = session.resume(transport).await;
        self.sync(&session, &slot);
        result
    }

    pub async fn set_speed(&self, chat: ChatId, seconds: u16) -> Result<(), QuizError> {
        let slot = self.session(chat)?;
        let mut session = slot.lock().await;
        session.set_speed(seconds)
    }

    pub async fn stop<T: Transport>(&self, chat: ChatId, transport: &T) -> Result<(), QuizError> {
        let slot = self.session(chat)?;
        let mut session = slot.lock().await;
        let result = session.stop(transport).await;
        self.sync(&session, &slot);
        result
    }

    /// Live standings of the quiz running in `chat`, with its title.
    pub async fn standings(&self, chat: ChatId) -> Result<(String, Vec<Standing>), QuizError> {
        let (title, slot) = {
            let sessions = self.lock_sessions();
            let entry = sessions.get(&chat).ok_or(QuizError::NoActiveSession)?;
            (entry.title.clone(), entry.session.clone())
        };
        let session = slot.lock().await;
        Ok((title, session.standings()))
    }

    /// Scores an answer and hands the response to `sink`. A failing sink is
    /// logged; the score stands.
    pub async fn record_answer<S: RecordResponse>(
        &self,
        poll: &PollRef,
        user: UserId,
        name: &str,
        chosen_option: usize,
        sink: &S,
    ) -> Result<Response, QuizError> {
        let chat = self
            .lock_polls()
            .get(poll)
            .copied()
            .ok_or(QuizError::StaleAnswer)?;
        let slot = self.session(chat).map_err(|_| QuizError::StaleAnswer)?;

        let response = {
            let mut session = slot.lock().await;
            session.record_answer(user, name, poll, chosen_option)?
        };
        debug!(?chat, user = user.0, correct = response.correct, "Answer recorded");

        if let Err(e) = sink.record_response(&response).await {
            warn!(?chat, user = user.0, error = %e, "Failed to persist response");
        }
        Ok(response)
    }

    fn session(&self, chat: ChatId) -> Result<SharedSession, QuizError> {
        self.lock_sessions()
            .get(&chat)
            .map(|entry| entry.session.clone())
            .ok_or(QuizError::NoActiveSession)
    }

    /// Mirrors the session's poll and lifecycle into the indexes.
    fn sync(&self, session: &QuizSession, slot: &SharedSession) {
        let chat = session.chat();
        if session.phase() == Phase::Finished {
            self.remove(chat, slot);
            return;
        }

        let mut polls = self.lock_polls();
        polls.retain(|poll, owner| *owner != chat || Some(poll) == session.current_poll());
        if let Some(poll) = session.current_poll() {
            polls.insert(poll.clone(), chat);
        }
    }

    fn remove(&self, chat: ChatId, slot: &SharedSession) {
        let mut sessions = self.lock_sessions();
        if sessions
            .get(&chat)
            .is_some_and(|entry| Arc::ptr_eq(&entry.session, slot))
        {
            sessions.remove(&chat);
            debug!(?chat, "Session discarded");
        }
        drop(sessions);
        self.lock_polls().retain(|_, owner| *owner != chat);
    }

    fn lock_sessions(&self) -> std::sync::MutexGuard<'_, HashMap<ChatId, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_polls(&self) -> std::sync::MutexGuard<'_, HashMap<PollRef, ChatId>> {
        self.polls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connection::{StoreResult, UserStats};
    use crate::database::quiz::{Question, QuizMode};
    use crate::transport::testing::RecordingTransport;

    #[derive(Default)]
    struct MemorySink {
        responses: Mutex<Vec<Response>>,
        failing: bool,
    }

    impl RecordResponse for MemorySink {
        async fn record_response(&self, response: &Response) -> StoreResult<()> {
            if self.failing {
                return Err("database is gone".into());
            }
            self.responses.lock().unwrap().push(response.clone());
            Ok(())
        }

        async fn user_stats(&self, _user: UserId) -> StoreResult<UserStats> {
            Ok(UserStats::default())
        }
    }

    const GROUP: ChatId = ChatId(-1);
    const OTHER_GROUP: ChatId = ChatId(-2);
    const CREATOR: UserId = UserId(10);

    fn quiz(mode: QuizMode) -> Quiz {
        Quiz::new(
            "Registry".into(),
            CREATOR,
            mode,
            None,
            vec![
                Question::new("Q1".into(), vec!["a".into(), "b".into()], 0),
                Question::new("Q2".into(), vec!["a".into(), "b".into()], 1),
            ],
        )
    }

    async fn current_poll(registry: &SessionRegistry, chat: ChatId) -> PollRef {
        let slot = registry.session(chat).unwrap();
        let session = slot.lock().await;
        session.current_poll().cloned().unwrap()
    }

    #[tokio::test]
    async fn one_session_per_chat() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();

        registry.start(GROUP, quiz(QuizMode::Standard), &transport).await.unwrap();
        assert_eq!(
            registry.start(GROUP, quiz(QuizMode::Standard), &transport).await,
            Err(QuizError::SessionConflict)
        );
        registry
            .start(OTHER_GROUP, quiz(QuizMode::Standard), &transport)
            .await
            .unwrap();
        assert_eq!(registry.creator(GROUP), Some(CREATOR));
        assert_eq!(transport.polls().len(), 2);
    }

    #[tokio::test]
    async fn empty_quiz_leaves_no_session_behind() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();
        let empty = Quiz::new("Empty".into(), CREATOR, QuizMode::Standard, None, vec![]);

        assert_eq!(
            registry.start(GROUP, empty, &transport).await,
            Err(QuizError::EmptyQuiz)
        );
        assert!(!registry.is_running(GROUP));
    }

    #[tokio::test]
    async fn commands_without_a_session_are_rejected() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();

        assert_eq!(registry.advance(GROUP, &transport).await, Err(QuizError::NoActiveSession));
        assert_eq!(registry.pause(GROUP).await, Err(QuizError::NoActiveSession));
        assert_eq!(registry.resume(GROUP, &transport).await, Err(QuizError::NoActiveSession));
        assert_eq!(registry.set_speed(GROUP, 10).await, Err(QuizError::NoActiveSession));
        assert_eq!(registry.stop(GROUP, &transport).await, Err(QuizError::NoActiveSession));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn answers_route_to_their_chat_and_get_persisted() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();
        let sink = MemorySink::default();
        registry.start(GROUP, quiz(QuizMode::Standard), &transport).await.unwrap();
        registry
            .start(OTHER_GROUP, quiz(QuizMode::Standard), &transport)
            .await
            .unwrap();

        let poll = current_poll(&registry, OTHER_GROUP).await;
        let response = registry
            .record_answer(&poll, UserId(1), "Alice", 0, &sink)
            .await
            .unwrap();
        assert!(response.correct);
        assert_eq!(sink.responses.lock().unwrap().len(), 1);

        let (_, standings) = registry.standings(OTHER_GROUP).await.unwrap();
        assert_eq!(standings[0].score, 1.0);
        let (title, standings) = registry.standings(GROUP).await.unwrap();
        assert_eq!(title, "Registry");
        assert!(standings.is_empty());
    }

    #[tokio::test]
    async fn answers_to_replaced_polls_are_stale() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();
        let sink = MemorySink::default();
        registry.start(GROUP, quiz(QuizMode::Standard), &transport).await.unwrap();
        let first = current_poll(&registry, GROUP).await;

        registry.advance(GROUP, &transport).await.unwrap();
        assert_eq!(
            registry.record_answer(&first, UserId(1), "Alice", 0, &sink).await,
            Err(QuizError::StaleAnswer)
        );
        assert_eq!(
            registry
                .record_answer(&PollRef("unknown".into()), UserId(1), "Alice", 0, &sink)
                .await,
            Err(QuizError::StaleAnswer)
        );
        assert!(sink.responses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_sink_keeps_the_score() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();
        let sink = MemorySink {
            failing: true,
            ..Default::default()
        };
        registry.start(GROUP, quiz(QuizMode::Standard), &transport).await.unwrap();
        let poll = current_poll(&registry, GROUP).await;

        registry
            .record_answer(&poll, UserId(1), "Alice", 0, &sink)
            .await
            .unwrap();
        let (_, standings) = registry.standings(GROUP).await.unwrap();
        assert_eq!(standings[0].score, 1.0);
    }

    #[tokio::test]
    async fn finished_sessions_are_discarded() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();
        registry.start(GROUP, quiz(QuizMode::Standard), &transport).await.unwrap();
        let poll = current_poll(&registry, GROUP).await;

        registry.stop(GROUP, &transport).await.unwrap();
        assert!(!registry.is_running(GROUP));
        assert!(registry.lock_polls().get(&poll).is_none());
        assert_eq!(registry.stop(GROUP, &transport).await, Err(QuizError::NoActiveSession));

        // Natural completion frees the chat as well.
        registry.start(GROUP, quiz(QuizMode::Standard), &transport).await.unwrap();
        registry.advance(GROUP, &transport).await.unwrap();
        registry.advance(GROUP, &transport).await.unwrap();
        assert!(!registry.is_running(GROUP));
        registry.start(GROUP, quiz(QuizMode::Standard), &transport).await.unwrap();
    }

    #[tokio::test]
    async fn marathon_keeps_running_until_stopped() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();
        registry.start(GROUP, quiz(QuizMode::Marathon), &transport).await.unwrap();

        for _ in 0..5 {
            registry.advance(GROUP, &transport).await.unwrap();
        }
        assert!(registry.is_running(GROUP));
        assert_eq!(registry.lock_polls().len(), 1);

        registry.stop(GROUP, &transport).await.unwrap();
        assert!(!registry.is_running(GROUP));
    }

    #[tokio::test]
    async fn concurrent_answers_are_all_counted() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();
        let sink = MemorySink::default();
        registry.start(GROUP, quiz(QuizMode::Standard), &transport).await.unwrap();
        let poll = current_poll(&registry, GROUP).await;

        let (a, b, c) = tokio::join!(
            registry.record_answer(&poll, UserId(1), "Alice", 0, &sink),
            registry.record_answer(&poll, UserId(2), "Bob", 1, &sink),
            registry.advance(GROUP, &transport),
        );
        assert!(c.is_ok());
        // Answers queued behind the advance find their poll replaced.
        let counted = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
        assert_eq!(sink.responses.lock().unwrap().len(), counted);
    }

    #[tokio::test]
    async fn speed_presets_reach_the_next_poll() {
        let registry = SessionRegistry::new(Speeds::default());
        let transport = RecordingTransport::default();
        registry.start(GROUP, quiz(QuizMode::Standard), &transport).await.unwrap();

        registry.set_speed(GROUP, registry.speeds().fast).await.unwrap();
        registry.advance(GROUP, &transport).await.unwrap();
        assert_eq!(transport.last_poll_period(), Some(10));
    }
}
