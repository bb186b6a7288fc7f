use std::sync::Arc;

use teloxide::{
    prelude::Requester,
    types::{Message, PollAnswer, Voter},
    Bot,
};
use tracing::{debug, info, instrument};

use crate::{
    commands::Command,
    database::connection::{RecordResponse, RetreiveQuiz},
    error::QuizError,
    leaderboard,
    registry::SessionRegistry,
    transport::{PollRef, Transport},
    HandlerResult,
};

/// Control commands belong to whoever started the running quiz.
fn authorize(registry: &SessionRegistry, msg: &Message) -> Result<(), QuizError> {
    let creator = registry
        .creator(msg.chat.id)
        .ok_or(QuizError::NoActiveSession)?;
    match msg.from.as_ref() {
        Some(user) if user.id == creator => Ok(()),
        _ => Err(QuizError::NotCreator),
    }
}

async fn report(
    bot: &Bot,
    msg: &Message,
    result: Result<(), QuizError>,
    success: Option<String>,
) -> HandlerResult {
    match result {
        Ok(()) => {
            if let Some(text) = success {
                bot.send_message(msg.chat.id, text).await?;
            }
        }
        Err(e) if e.is_user_visible() => {
            debug!(chat = ?msg.chat.id, error = %e, "Command rejected");
            bot.send_message(msg.chat.id, e.to_string()).await?;
        }
        Err(_) => {}
    }
    Ok(())
}

#[instrument(level = "info", skip(bot, msg, registry, transport, connection))]
pub(crate) async fn play<DbConnection: RetreiveQuiz, Outbound: Transport>(
    bot: Bot,
    msg: Message,
    title: String,
    registry: Arc<SessionRegistry>,
    transport: Arc<Outbound>,
    connection: Arc<DbConnection>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let title = title.trim();
    if title.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /play <quiz title>. See /myquizzes.")
            .await?;
        return Ok(());
    }
    if registry.is_running(msg.chat.id) {
        return report(&bot, &msg, Err(QuizError::SessionConflict), None).await;
    }

    let result = match connection.find_quiz(user.id, title).await? {
        Some(quiz) => {
            info!(chat = ?msg.chat.id, user = user.id.0, title, "Starting quiz");
            registry.start(msg.chat.id, quiz, transport.as_ref()).await
        }
        None => Err(QuizError::QuizNotFound(title.to_owned())),
    };
    report(&bot, &msg, result, None).await
}

#[instrument(level = "info", skip_all, fields(chat = ?msg.chat.id))]
pub(crate) async fn next<Outbound: Transport>(
    bot: Bot,
    msg: Message,
    registry: Arc<SessionRegistry>,
    transport: Arc<Outbound>,
) -> HandlerResult {
    let result = match authorize(&registry, &msg) {
        Ok(()) => registry.advance(msg.chat.id, transport.as_ref()).await,
        Err(e) => Err(e),
    };
    report(&bot, &msg, result, None).await
}

#[instrument(level = "info", skip_all, fields(chat = ?msg.chat.id))]
pub(crate) async fn pause(bot: Bot, msg: Message, registry: Arc<SessionRegistry>) -> HandlerResult {
    let result = match authorize(&registry, &msg) {
        Ok(()) => registry.pause(msg.chat.id).await,
        Err(e) => Err(e),
    };
    report(
        &bot,
        &msg,
        result,
        Some("⏸ Quiz paused. Send /resume to continue.".into()),
    )
    .await
}

#[instrument(level = "info", skip_all, fields(chat = ?msg.chat.id))]
pub(crate) async fn resume<Outbound: Transport>(
    bot: Bot,
    msg: Message,
    registry: Arc<SessionRegistry>,
    transport: Arc<Outbound>,
) -> HandlerResult {
    let result = match authorize(&registry, &msg) {
        Ok(()) => registry.resume(msg.chat.id, transport.as_ref()).await,
        Err(e) => Err(e),
    };
    report(&bot, &msg, result, None).await
}

#[instrument(level = "info", skip_all, fields(chat = ?msg.chat.id))]
pub(crate) async fn stop<Outbound: Transport>(
    bot: Bot,
    msg: Message,
    registry: Arc<SessionRegistry>,
    transport: Arc<Outbound>,
) -> HandlerResult {
    let result = match authorize(&registry, &msg) {
        Ok(()) => registry.stop(msg.chat.id, transport.as_ref()).await,
        Err(e) => Err(e),
    };
    report(&bot, &msg, result, None).await
}

#[instrument(level = "info", skip_all, fields(chat = ?msg.chat.id))]
pub(crate) async fn change_speed(
    bot: Bot,
    msg: Message,
    cmd: Command,
    registry: Arc<SessionRegistry>,
) -> HandlerResult {
    let speeds = registry.speeds();
    let seconds = match cmd {
        Command::Fast => speeds.fast,
        Command::Slow => speeds.slow,
        _ => speeds.normal,
    };
    let result = match authorize(&registry, &msg) {
        Ok(()) => registry.set_speed(msg.chat.id, seconds).await,
        Err(e) => Err(e),
    };
    report(
        &bot,
        &msg,
        result,
        Some(format!("⏱ Next questions get {seconds} seconds each.")),
    )
    .await
}

#[instrument(level = "info", skip_all, fields(chat = ?msg.chat.id))]
pub(crate) async fn scores(bot: Bot, msg: Message, registry: Arc<SessionRegistry>) -> HandlerResult {
    match registry.standings(msg.chat.id).await {
        Ok((title, standings)) => {
            let header = format!("📊 {title}: current standings");
            bot.send_message(msg.chat.id, leaderboard::render(&header, &standings))
                .await?;
            Ok(())
        }
        Err(e) => report(&bot, &msg, Err(e), None).await,
    }
}

/// Anonymous voters and retracted votes carry nothing to score.
#[instrument(level = "debug", skip_all, fields(poll = ?answer.poll_id))]
pub(crate) async fn poll_answer<Sink: RecordResponse>(
    answer: PollAnswer,
    registry: Arc<SessionRegistry>,
    connection: Arc<Sink>,
) -> HandlerResult {
    let Voter::User(user) = &answer.voter else {
        return Ok(());
    };
    let Some(&option) = answer.option_ids.first() else {
        return Ok(());
    };

    let poll = PollRef(answer.poll_id.to_string());
    match registry
        .record_answer(
            &poll,
            user.id,
            &user.full_name(),
            option as usize,
            connection.as_ref(),
        )
        .await
    {
        Ok(response) => {
            debug!(user = user.id.0, correct = response.correct, "Poll answer scored");
        }
        Err(e) => {
            debug!(user = user.id.0, error = %e, "Poll answer ignored");
        }
    }

    Ok(())
}
