//! The live quiz session of one chat.
//!
//! A session walks an ordered list of questions, sending each as a Telegram
//! quiz poll. Only the creator moves it forward (`advance`); answers only
//! touch scores. Outbound failures are logged and never undo a transition.

use std::collections::{HashMap, HashSet};
use std::fmt;

use rand::seq::SliceRandom;
use teloxide::types::{ChatId, UserId};
use tracing::{debug, info, warn};

use crate::config::OPEN_PERIOD_RANGE;
use crate::database::quiz::{Quiz, QuizMode, Response};
use crate::error::QuizError;
use crate::leaderboard::{self, Standing};
use crate::transport::{PollHandle, PollRef, PollRequest, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Active,
    Paused,
    Finished,
}

impl Phase {
    pub fn is_live(&self) -> bool {
        matches!(self, Phase::Active | Phase::Paused)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::NotStarted => "not started",
            Phase::Active => "running",
            Phase::Paused => "paused",
            Phase::Finished => "finished",
        })
    }
}

#[derive(Debug, Clone)]
struct OpenPoll {
    handle: PollHandle,
    correct_option: usize,
    position: usize,
}

#[derive(Debug)]
pub struct QuizSession {
    chat: ChatId,
    quiz: Quiz,
    question_order: Vec<usize>,
    current_index: usize,
    scores: HashMap<UserId, f64>,
    names: HashMap<UserId, String>,
    // Users who already answered the question at `current_index`.
    answered: HashSet<UserId>,
    phase: Phase,
    open_period: u16,
    current_poll: Option<OpenPoll>,
    round: u32,
    last_section: Option<String>,
}

impl QuizSession {
    /// Questions Telegram can't render as a quiz poll are left out of the order.
    pub fn new(chat: ChatId, quiz: Quiz, open_period: u16) -> Result<Self, QuizError> {
        let question_order: Vec<usize> = quiz
            .questions()
            .iter()
            .enumerate()
            .filter(|(_, question)| question.is_playable())
            .map(|(position, _)| position)
            .collect();

        if question_order.is_empty() {
            return Err(QuizError::EmptyQuiz);
        }
        if question_order.len() < quiz.questions().len() {
            warn!(
                quiz = quiz.title(),
                skipped = quiz.questions().len() - question_order.len(),
                "Skipping questions without a valid answer"
            );
        }

        Ok(Self {
            chat,
            quiz,
            question_order,
            current_index: 0,
            scores: HashMap::new(),
            names: HashMap::new(),
            answered: HashSet::new(),
            phase: Phase::NotStarted,
            open_period,
            current_poll: None,
            round: 1,
            last_section: None,
        })
    }

    pub fn chat(&self) -> ChatId {
        self.chat
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn question_order(&self) -> &[usize] {
        &self.question_order
    }

    pub fn scores(&self) -> &HashMap<UserId, f64> {
        &self.scores
    }

    pub fn open_period(&self) -> u16 {
        self.open_period
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn current_poll(&self) -> Option<&PollRef> {
        self.current_poll.as_ref().map(|open| &open.handle.poll)
    }

    pub fn standings(&self) -> Vec<Standing> {
        leaderboard::rank(&self.scores, &self.names)
    }

    pub async fn start<T: Transport>(&mut self, transport: &T) -> Result<(), QuizError> {
        if self.phase != Phase::NotStarted {
            return Err(QuizError::InvalidStateTransition {
                from: self.phase,
                action: "start",
            });
        }

        self.current_index = 0;
        self.scores.clear();
        self.answered.clear();
        if self.quiz.mode() == QuizMode::Marathon {
            self.question_order.shuffle(&mut rand::thread_rng());
        }
        self.phase = Phase::Active;
        info!(chat = ?self.chat, quiz = self.quiz.title(), "Quiz session started");

        let intro = format!(
            "Starting \"{}\": {} questions, {} seconds each. Good luck!",
            self.quiz.title(),
            self.question_order.len(),
            self.open_period
        );
        log_failure(self.chat, "announce quiz", transport.send_message(self.chat, &intro).await);

        self.send_current_question(transport).await;
        Ok(())
    }

    /// Sends the question at `current_index`, wrapping marathons and finishing
    /// everything else once the order is exhausted.
    pub async fn send_current_question<T: Transport>(&mut self, transport: &T) {
        if self.phase != Phase::Active {
            return;
        }

        if self.current_index >= self.question_order.len() {
            if self.quiz.mode() != QuizMode::Marathon {
                self.finish(transport).await;
                return;
            }
            self.question_order.shuffle(&mut rand::thread_rng());
            self.current_index = 0;
            self.answered.clear();
            self.round += 1;
            debug!(chat = ?self.chat, round = self.round, "Marathon wrapped around");
            let text = format!("Round {} begins!", self.round);
            log_failure(self.chat, "announce round", transport.send_message(self.chat, &text).await);
        }

        let position = self.question_order[self.current_index];
        let question = &self.quiz.questions()[position];

        if self.quiz.mode() == QuizMode::Sectional {
            if let Some(section) = question.section() {
                if self.last_section.as_deref() != Some(section) {
                    self.last_section = Some(section.to_owned());
                    let text = format!("📚 Section: {}", section);
                    log_failure(self.chat, "announce section", transport.send_message(self.chat, &text).await);
                }
            }
        }

        let text = format!(
            "[{}/{}] {}",
            self.current_index + 1,
            self.question_order.len(),
            question.text()
        );
        let request = PollRequest {
            question: &text,
            options: question.options(),
            correct_option: question.correct_option(),
            open_period: self.open_period,
        };

        match transport.send_poll(self.chat, request).await {
            Ok(handle) => {
                debug!(chat = ?self.chat, poll = %handle.poll.0, position, "Question sent");
                self.current_poll = Some(OpenPoll {
                    handle,
                    correct_option: question.correct_option(),
                    position,
                });
            }
            Err(e) => {
                warn!(chat = ?self.chat, error = %e, "Failed to send question");
                self.current_poll = None;
            }
        }
    }

    /// Scores one answer. Never advances the session.
    pub fn record_answer(
        &mut self,
        user: UserId,
        name: &str,
        poll: &PollRef,
        chosen_option: usize,
    ) -> Result<Response, QuizError> {
        if !self.phase.is_live() {
            return Err(QuizError::StaleAnswer);
        }
        let Some(open) = self.current_poll.as_ref() else {
            return Err(QuizError::StaleAnswer);
        };
        if open.handle.poll != *poll || self.answered.contains(&user) {
            return Err(QuizError::StaleAnswer);
        }

        let question = &self.quiz.questions()[open.position];
        let correct = chosen_option == open.correct_option;
        let score = self.scores.entry(user).or_insert(0.0);
        if correct {
            *score += question.points();
        } else if let Some(penalty) = self.quiz.negative_marking() {
            *score -= penalty;
        }

        self.answered.insert(user);
        self.names.insert(user, name.to_owned());

        Ok(Response {
            user,
            quiz_id: *self.quiz.id(),
            question_id: *question.id(),
            correct,
        })
    }

    pub fn pause(&mut self) -> Result<(), QuizError> {
        match self.phase {
            Phase::Active => {
                self.phase = Phase::Paused;
                info!(chat = ?self.chat, "Quiz paused");
                Ok(())
            }
            Phase::Paused => Err(QuizError::InvalidStateTransition {
                from: self.phase,
                action: "pause",
            }),
            Phase::NotStarted | Phase::Finished => Err(QuizError::NoActiveSession),
        }
    }

    /// Re-sends the current question with a fresh timer.
    pub async fn resume<T: Transport>(&mut self, transport: &T) -> Result<(), QuizError> {
        match self.phase {
            Phase::Paused => {}
            Phase::Active => {
                return Err(QuizError::InvalidStateTransition {
                    from: self.phase,
                    action: "resume",
                })
            }
            Phase::NotStarted | Phase::Finished => return Err(QuizError::NoActiveSession),
        }

        self.phase = Phase::Active;
        info!(chat = ?self.chat, "Quiz resumed");
        self.close_current_poll(transport).await;
        self.send_current_question(transport).await;
        Ok(())
    }

    /// Applies from the next question on; the open poll keeps its timer.
    pub fn set_speed(&mut self, seconds: u16) -> Result<(), QuizError> {
        if !self.phase.is_live() {
            return Err(QuizError::NoActiveSession);
        }
        if !OPEN_PERIOD_RANGE.contains(&seconds) {
            return Err(QuizError::InvalidSpeed(seconds));
        }
        self.open_period = seconds;
        debug!(chat = ?self.chat, seconds, "Question time changed");
        Ok(())
    }

    pub async fn advance<T: Transport>(&mut self, transport: &T) -> Result<(), QuizError> {
        match self.phase {
            Phase::Active => {}
            Phase::Paused => {
                return Err(QuizError::InvalidStateTransition {
                    from: self.phase,
                    action: "skip ahead",
                })
            }
            Phase::NotStarted | Phase::Finished => return Err(QuizError::NoActiveSession),
        }

        self.close_current_poll(transport).await;
        self.current_index += 1;
        self.answered.clear();
        self.send_current_question(transport).await;
        Ok(())
    }

    pub async fn stop<T: Transport>(&mut self, transport: &T) -> Result<(), QuizError> {
        if !self.phase.is_live() {
            return Err(QuizError::NoActiveSession);
        }

        self.close_current_poll(transport).await;
        self.finish(transport).await;
        Ok(())
    }

    async fn finish<T: Transport>(&mut self, transport: &T) {
        self.phase = Phase::Finished;
        self.current_poll = None;
        info!(
            chat = ?self.chat,
            quiz = self.quiz.title(),
            participants = self.scores.len(),
            "Quiz session finished"
        );

        let header = format!("🏁 {} is over! Final results:", self.quiz.title());
        let board = leaderboard::render(&header, &self.standings());
        log_failure(self.chat, "send leaderboard", transport.send_message(self.chat, &board).await);
    }

    async fn close_current_poll<T: Transport>(&mut self, transport: &T) {
        if let Some(open) = self.current_poll.take() {
            log_failure(
                self.chat,
                "close poll",
                transport.close_poll(self.chat, &open.handle).await,
            );
        }
    }
}

fn log_failure(chat: ChatId, action: &str, result: Result<(), TransportError>) {
    match result {
        Ok(()) => {}
        Err(TransportError::AlreadyClosed) => {
            debug!(?chat, action, "Poll was already closed");
        }
        Err(e) => {
            warn!(?chat, action, error = %e, "Transport call failed");
        }
    }
}
