use std::sync::Arc;

use teloxide::types::ReplyMarkup;
use teloxide::{payloads::SendMessageSetters, prelude::Requester, types::Message, Bot};
use tracing::{info, instrument};

use crate::database::connection::{CreateQuiz, RetreiveQuiz};
use crate::database::quiz::{Question, Quiz, QuizMode, MAX_OPTIONS, MIN_OPTIONS};
use crate::keyboard::{mode_keyboard, options_keyboard, penalty_keyboard, yes_no_keyboard};
use crate::state::{QuizData, QuizState};
use crate::{HandlerResult, UserDialogue};

/// Splits a leading `[Section]` label off a question.
pub(crate) fn parse_section(text: &str) -> (Option<String>, String) {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix('[') {
        if let Some((section, question)) = rest.split_once(']') {
            let section = section.trim();
            let question = question.trim();
            if !section.is_empty() && !question.is_empty() {
                return (Some(section.to_owned()), question.to_owned());
            }
        }
    }
    (None, text.to_owned())
}

/// One option per line; blank lines are ignored.
pub(crate) fn parse_options(text: &str) -> Result<Vec<String>, String> {
    let options: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();

    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len()) {
        return Err(format!(
            "Please send between {} and {} options, one per line.",
            MIN_OPTIONS, MAX_OPTIONS
        ));
    }
    Ok(options)
}

/// `Some(None)` turns negative marking off, `None` means unparseable.
pub(crate) fn parse_penalty(text: &str) -> Option<Option<f64>> {
    let text = text.trim();
    if ["none", "no", "0", "off"].contains(&text.to_lowercase().as_str()) {
        return Some(None);
    }
    match text.replace(',', ".").parse::<f64>() {
        Ok(penalty) if penalty.is_finite() && penalty > 0.0 => Some(Some(penalty)),
        _ => None,
    }
}

/// Option numbers are 1-based in chat, 0-based inside.
pub(crate) fn parse_correct_option(text: &str, count: usize) -> Option<usize> {
    match text.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn start_creation(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    if !msg.chat.is_private() {
        bot.send_message(msg.chat.id, "Please create quizzes in a private chat with me.")
            .await?;
        return Ok(());
    }
    bot.send_message(msg.chat.id, "Let's start creating a new quiz! What's its title?")
        .reply_markup(ReplyMarkup::kb_remove())
        .await?;
    dialogue.update(QuizState::ReceiveQuizTitle).await?;
    Ok(())
}

#[instrument(level = "info", skip(connection, bot, dialogue))]
pub(crate) async fn receive_quiz_title<DbConnection: RetreiveQuiz>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    connection: Arc<DbConnection>,
) -> HandlerResult {
    let (Some(title), Some(user)) = (msg.text(), msg.from.as_ref()) else {
        bot.send_message(msg.chat.id, "Please, send a title of the new quiz.")
            .await?;
        return Ok(());
    };
    let title = title.trim();

    if title.is_empty() || title.starts_with('/') {
        bot.send_message(msg.chat.id, "Please, send a title of the new quiz.")
            .await?;
    } else if connection.find_quiz(user.id, title).await?.is_some() {
        bot.send_message(msg.chat.id, "You already have a quiz with that title. Try again.")
            .await?;
    } else {
        info!(user = user.id.0, title, "Received quiz title");
        bot.send_message(msg.chat.id, "OK. Which mode should it run in?")
            .reply_markup(mode_keyboard())
            .await?;
        dialogue
            .update(QuizState::ReceiveQuizMode {
                title: title.to_owned(),
            })
            .await?;
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn receive_quiz_mode(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    title: String,
) -> HandlerResult {
    match msg.text().and_then(QuizMode::parse) {
        Some(mode) => {
            bot.send_message(
                msg.chat.id,
                "Should wrong answers cost points? Pick a penalty or send your own number.",
            )
            .reply_markup(penalty_keyboard())
            .await?;
            dialogue
                .update(QuizState::ReceiveNegativeMarking { title, mode })
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please choose Standard, Marathon or Sectional.")
                .reply_markup(mode_keyboard())
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn receive_negative_marking(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    (title, mode): (String, QuizMode),
) -> HandlerResult {
    match msg.text().and_then(parse_penalty) {
        Some(negative_marking) => {
            let prompt = if mode == QuizMode::Sectional {
                "Great. Send the first question. Prefix it with [Section name] to open a section."
            } else {
                "Great. Send the first question."
            };
            bot.send_message(msg.chat.id, prompt)
                .reply_markup(ReplyMarkup::kb_remove())
                .await?;
            dialogue
                .update(QuizState::ReceiveQuestionText {
                    quiz_info: QuizData {
                        title,
                        mode,
                        negative_marking,
                        questions: Vec::default(),
                    },
                })
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please send None or a positive number like 0.25.")
                .reply_markup(penalty_keyboard())
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn receive_question_text(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    quiz_info: QuizData,
) -> HandlerResult {
    let Some(raw) = msg.text().filter(|text| !text.trim().is_empty()) else {
        bot.send_message(msg.chat.id, "Please send the question text.")
            .await?;
        return Ok(());
    };

    let (section, text) = if quiz_info.mode == QuizMode::Sectional {
        let (section, text) = parse_section(raw);
        // Questions without a label stay in the previous section.
        let section = section.or_else(|| {
            quiz_info
                .questions
                .last()
                .and_then(|q| q.section().map(str::to_owned))
        });
        (section, text)
    } else {
        (None, raw.trim().to_owned())
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "OK. Now send the options, one per line ({} to {}).",
            MIN_OPTIONS, MAX_OPTIONS
        ),
    )
    .await?;
    dialogue
        .update(QuizState::ReceiveOptions {
            quiz_info,
            text,
            section,
        })
        .await?;

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn receive_options(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    (quiz_info, text, section): (QuizData, String, Option<String>),
) -> HandlerResult {
    match parse_options(msg.text().unwrap_or_default()) {
        Ok(options) => {
            let listing: String = options
                .iter()
                .enumerate()
                .map(|(i, option)| format!("{}) {}\n", i + 1, option))
                .collect();
            bot.send_message(
                msg.chat.id,
                format!("{listing}\nWhich option is correct? Send its number."),
            )
            .reply_markup(options_keyboard(options.len()))
            .await?;
            dialogue
                .update(QuizState::ReceiveCorrectOption {
                    quiz_info,
                    text,
                    section,
                    options,
                })
                .await?;
        }
        Err(problem) => {
            bot.send_message(msg.chat.id, problem).await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn receive_correct_option(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    (mut quiz_info, text, section, options): (QuizData, String, Option<String>, Vec<String>),
) -> HandlerResult {
    let Some(correct) = msg
        .text()
        .and_then(|answer| parse_correct_option(answer, options.len()))
    else {
        bot.send_message(
            msg.chat.id,
            format!("Please send a number from 1 to {}.", options.len()),
        )
        .reply_markup(options_keyboard(options.len()))
        .await?;
        return Ok(());
    };

    quiz_info
        .questions
        .push(Question::new(text, options, correct).with_section(section));
    info!(
        title = %quiz_info.title,
        questions = quiz_info.questions.len(),
        "Question added"
    );

    bot.send_message(
        msg.chat.id,
        format!(
            "Saved question #{}. Do you want to add another question? (Yes/No)",
            quiz_info.questions.len()
        ),
    )
    .reply_markup(yes_no_keyboard())
    .await?;
    dialogue
        .update(QuizState::ReceiveAddAnotherQuestion { quiz_info })
        .await?;

    Ok(())
}

#[instrument(level = "info", skip(connection, bot, dialogue))]
pub(crate) async fn receive_add_another_question<DbConnection: CreateQuiz>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    quiz_info: QuizData,
    connection: Arc<DbConnection>,
) -> HandlerResult {
    match msg.text() {
        Some("Yes") | Some("Yes✔️") => {
            bot.send_message(msg.chat.id, "Great. Please send the next question.")
                .reply_markup(ReplyMarkup::kb_remove())
                .await?;
            dialogue
                .update(QuizState::ReceiveQuestionText { quiz_info })
                .await?;
        }
        Some("No") | Some("No❌") => {
            let Some(user) = msg.from.as_ref() else {
                return Ok(());
            };
            let quiz = Quiz::new(
                quiz_info.title,
                user.id,
                quiz_info.mode,
                quiz_info.negative_marking,
                quiz_info.questions,
            );
            connection.create_quiz(&quiz).await?;
            info!(user = user.id.0, title = quiz.title(), "Quiz saved");

            bot.send_message(
                msg.chat.id,
                format!(
                    "Saved \"{}\" with {} questions. Add me to a group and send /play {} to run it.",
                    quiz.title(),
                    quiz.questions().len(),
                    quiz.title()
                ),
            )
            .reply_markup(ReplyMarkup::kb_remove())
            .await?;
            dialogue.exit().await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please enter a valid answer: Yes or No.")
                .reply_markup(yes_no_keyboard())
                .await?;
        }
    }

    Ok(())
}
