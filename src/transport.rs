use teloxide::{
    payloads::SendPollSetters,
    prelude::Requester,
    types::{ChatId, MessageId, PollType},
    ApiError, Bot, RequestError,
};
use thiserror::Error;

/// Opaque identifier Telegram assigns to a poll; answers refer back to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollRef(pub String);

/// An outstanding poll: its id for answers, its message for closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollHandle {
    pub poll: PollRef,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, Copy)]
pub struct PollRequest<'a> {
    pub question: &'a str,
    pub options: &'a [String],
    pub correct_option: usize,
    pub open_period: u16,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("poll has already been closed")]
    AlreadyClosed,
    #[error("sent message carries no poll")]
    MissingPoll,
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Outbound side of a quiz session.
pub trait Transport {
    async fn send_poll(
        &self,
        chat: ChatId,
        request: PollRequest<'_>,
    ) -> Result<PollHandle, TransportError>;

    async fn close_poll(&self, chat: ChatId, poll: &PollHandle) -> Result<(), TransportError>;

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TransportError>;
}

/// Telegram refuses to stop a poll whose `open_period` already ran out.
fn close_error(error: RequestError) -> TransportError {
    match error {
        RequestError::Api(ApiError::PollHasAlreadyClosed) => TransportError::AlreadyClosed,
        other => TransportError::Request(other),
    }
}

#[derive(Debug, Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

impl Transport for TelegramTransport {
    async fn send_poll(
        &self,
        chat: ChatId,
        request: PollRequest<'_>,
    ) -> Result<PollHandle, TransportError> {
        let message = self
            .bot
            .send_poll(chat, request.question, request.options.to_vec())
            .type_(PollType::Quiz)
            .is_anonymous(false)
            .correct_option_id(request.correct_option as u8)
            .open_period(request.open_period)
            .await?;

        let poll = message.poll().ok_or(TransportError::MissingPoll)?;
        Ok(PollHandle {
            poll: PollRef(poll.id.to_string()),
            message_id: message.id,
        })
    }

    async fn close_poll(&self, chat: ChatId, poll: &PollHandle) -> Result<(), TransportError> {
        self.bot
            .stop_poll(chat, poll.message_id)
            .await
            .map(|_| ())
            .map_err(close_error)
    }

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        self.bot.send_message(chat, text).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Sent {
        Poll {
            chat: ChatId,
            question: String,
            correct_option: usize,
            open_period: u16,
        },
        Closed(PollRef),
        Message(ChatId, String),
    }

    /// Records every outbound call and hands out sequential poll ids.
    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub(crate) sent: Mutex<Vec<Sent>>,
        next_poll: Mutex<i32>,
        pub(crate) polls_already_closed: bool,
        pub(crate) failing: bool,
    }

    impl RecordingTransport {
        pub(crate) fn already_closed() -> Self {
            Self {
                polls_already_closed: true,
                ..Default::default()
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                failing: true,
                ..Default::default()
            }
        }

        pub(crate) fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        pub(crate) fn polls(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|sent| match sent {
                    Sent::Poll { question, .. } => Some(question),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn messages(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|sent| match sent {
                    Sent::Message(_, text) => Some(text),
                    _ => None,
                })
                .collect()
        }

        pub(crate) fn last_poll_period(&self) -> Option<u16> {
            self.sent().into_iter().rev().find_map(|sent| match sent {
                Sent::Poll { open_period, .. } => Some(open_period),
                _ => None,
            })
        }
    }

    impl Transport for RecordingTransport {
        async fn send_poll(
            &self,
            chat: ChatId,
            request: PollRequest<'_>,
        ) -> Result<PollHandle, TransportError> {
            if self.failing {
                return Err(TransportError::MissingPoll);
            }
            let mut next = self.next_poll.lock().unwrap();
            *next += 1;
            self.sent.lock().unwrap().push(Sent::Poll {
                chat,
                question: request.question.to_owned(),
                correct_option: request.correct_option,
                open_period: request.open_period,
            });
            Ok(PollHandle {
                poll: PollRef(format!("poll-{}", *next)),
                message_id: MessageId(*next),
            })
        }

        async fn close_poll(&self, _chat: ChatId, poll: &PollHandle) -> Result<(), TransportError> {
            if self.polls_already_closed {
                return Err(TransportError::AlreadyClosed);
            }
            self.sent.lock().unwrap().push(Sent::Closed(poll.poll.clone()));
            Ok(())
        }

        async fn send_message(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
            if self.failing {
                return Err(TransportError::MissingPoll);
            }
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Message(chat, text.to_owned()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopping_an_expired_poll_maps_to_already_closed() {
        assert!(matches!(
            close_error(RequestError::Api(ApiError::PollHasAlreadyClosed)),
            TransportError::AlreadyClosed
        ));
        assert!(matches!(
            close_error(RequestError::Api(ApiError::Unknown("chat not found".into()))),
            TransportError::Request(RequestError::Api(ApiError::Unknown(_)))
        ));
    }

    #[tokio::test]
    async fn recording_transport_flags_closed_polls() {
        use testing::RecordingTransport;

        let transport = RecordingTransport::already_closed();
        let request = PollRequest {
            question: "2 + 2?",
            options: &["3".to_string(), "4".to_string()],
            correct_option: 1,
            open_period: 30,
        };
        let handle = transport.send_poll(ChatId(-1), request).await.unwrap();
        assert!(matches!(
            transport.close_poll(ChatId(-1), &handle).await,
            Err(TransportError::AlreadyClosed)
        ));
    }
}
