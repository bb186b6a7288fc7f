use std::sync::Arc;

use teloxide::{
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{Message, ReplyMarkup},
    utils::command::BotCommands,
    Bot,
};
use tracing::{info, instrument};

use crate::{
    database::connection::{DeleteQuiz, RecordResponse, RetreiveQuiz},
    keyboard::quizes_keyboard,
    state::QuizState,
    HandlerResult, UserDialogue,
};

#[derive(Debug, Clone, PartialEq, Eq, BotCommands)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "display help.")]
    Help,
    #[command(description = "start the bot.")]
    Start,
    #[command(description = "cancel quiz creation.")]
    Cancel,
    #[command(description = "create a new quiz (private chat).")]
    NewQuiz,
    #[command(description = "list your quizzes.")]
    MyQuizzes,
    #[command(description = "delete one of your quizzes: /deletequiz <title>.")]
    DeleteQuiz(String),
    #[command(description = "run one of your quizzes here: /play <title>.")]
    Play(String),
    #[command(description = "move on to the next question.")]
    Next,
    #[command(description = "pause the running quiz.")]
    Pause,
    #[command(description = "resume a paused quiz.")]
    Resume,
    #[command(description = "stop the quiz and show results.")]
    Stop,
    #[command(description = "shorter time per question.")]
    Fast,
    #[command(description = "longer time per question.")]
    Slow,
    #[command(description = "default time per question.")]
    Normal,
    #[command(description = "show the current standings.")]
    Scores,
    #[command(description = "show your answer statistics.")]
    Stats,
}

impl Command {
    pub fn is_speed(&self) -> bool {
        matches!(self, Command::Fast | Command::Slow | Command::Normal)
    }
}

pub(crate) async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

pub(crate) async fn cancel(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Cancelling dialogue")
        .reply_markup(ReplyMarkup::kb_remove())
        .await?;
    dialogue.update(QuizState::Start).await?;
    Ok(())
}

pub(crate) async fn start(bot: Bot, msg: Message, dialogue: UserDialogue) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Hi! I host quizzes as Telegram polls.\n\
         Create one here with /newquiz, then add me to a group and send /play <title>.\n\
         /help lists everything I can do.",
    )
    .await?;
    dialogue.update(QuizState::Start).await?;
    Ok(())
}

#[instrument(level = "info", skip_all)]
pub(crate) async fn my_quizzes<DbConnection: RetreiveQuiz>(
    bot: Bot,
    msg: Message,
    connection: Arc<DbConnection>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let quizes = connection.retreive_quiz_titles(user.id).await?;

    if quizes.is_empty() {
        bot.send_message(msg.chat.id, "You have no quizzes yet. Create one with /newquiz.")
            .await?;
    } else if msg.chat.is_private() {
        bot.send_message(msg.chat.id, format!("Your quizzes:\n{}", quizes.join("\n")))
            .reply_markup(quizes_keyboard(&quizes))
            .await?;
    } else {
        bot.send_message(msg.chat.id, format!("Your quizzes:\n{}", quizes.join("\n")))
            .await?;
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, msg, connection))]
pub(crate) async fn delete_quiz<DbConnection: DeleteQuiz>(
    bot: Bot,
    msg: Message,
    title: String,
    connection: Arc<DbConnection>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let title = title.trim();
    if title.is_empty() {
        bot.send_message(msg.chat.id, "Usage: /deletequiz <title>").await?;
        return Ok(());
    }

    if connection.delete_quiz(user.id, title).await? {
        info!(user = user.id.0, title, "Quiz deleted");
        bot.send_message(msg.chat.id, format!("Quiz \"{title}\" deleted.")).await?;
    } else {
        bot.send_message(msg.chat.id, format!("Quiz '{title}' not found."))
            .await?;
    }

    Ok(())
}

#[instrument(level = "info", skip_all)]
pub(crate) async fn stats<DbConnection: RecordResponse>(
    bot: Bot,
    msg: Message,
    connection: Arc<DbConnection>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let stats = connection.user_stats(user.id).await?;

    let text = if stats.answered == 0 {
        format!("{} hasn't answered any questions yet.", user.first_name)
    } else {
        format!(
            "{}: {} answers, {} correct ({:.0}%).",
            user.first_name,
            stats.answered,
            stats.correct,
            stats.accuracy()
        )
    };
    bot.send_message(msg.chat.id, text).await?;

    Ok(())
}
