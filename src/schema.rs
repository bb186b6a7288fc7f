use std::error::Error;

use teloxide::{
    dispatching::{
        dialogue::{self, InMemStorage},
        DpHandlerDescription, UpdateFilterExt, UpdateHandler,
    },
    dptree::{self, Handler},
    prelude::{DependencyMap, Requester},
    types::{Message, Update},
    Bot,
};
use tracing::{debug, instrument};

use crate::{
    commands::{self, Command},
    constructor,
    database::connection::Connection,
    runner,
    state::QuizState,
    transport::TelegramTransport,
    HandlerResult,
};

pub fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(commands::help))
        .branch(case![Command::Start].endpoint(commands::start))
        .branch(case![Command::Cancel].endpoint(commands::cancel))
        .branch(case![Command::NewQuiz].endpoint(constructor::start_creation))
        .branch(case![Command::MyQuizzes].endpoint(commands::my_quizzes::<Connection>))
        .branch(case![Command::DeleteQuiz(title)].endpoint(commands::delete_quiz::<Connection>))
        .branch(case![Command::Stats].endpoint(commands::stats::<Connection>))
        .branch(running_scheme());

    let handler = Update::filter_message()
        .branch(command_handler)
        .branch(constructor_scheme())
        .endpoint(invalid_state);

    // Poll answers carry no chat, so they are routed before the dialogue lookup.
    dptree::entry()
        .branch(Update::filter_poll_answer().endpoint(runner::poll_answer::<Connection>))
        .branch(dialogue::enter::<Update, InMemStorage<QuizState>, QuizState, _>().branch(handler))
}

#[instrument(level = "debug")]
fn running_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<dyn Error + Send + Sync + 'static>>,
    DpHandlerDescription,
> {
    use dptree::case;
    debug!("Building dispatching tree for live quizzes");
    dptree::entry()
        .branch(case![Command::Play(title)].endpoint(runner::play::<Connection, TelegramTransport>))
        .branch(case![Command::Next].endpoint(runner::next::<TelegramTransport>))
        .branch(case![Command::Pause].endpoint(runner::pause))
        .branch(case![Command::Resume].endpoint(runner::resume::<TelegramTransport>))
        .branch(case![Command::Stop].endpoint(runner::stop::<TelegramTransport>))
        .branch(dptree::filter(|cmd: Command| cmd.is_speed()).endpoint(runner::change_speed))
        .branch(case![Command::Scores].endpoint(runner::scores))
}

#[instrument(level = "debug")]
fn constructor_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<dyn Error + Send + Sync + 'static>>,
    DpHandlerDescription,
> {
    use dptree::case;
    debug!("Building dispatching tree for constructor");
    dptree::entry()
        .branch(case![QuizState::ReceiveQuizTitle].endpoint(constructor::receive_quiz_title::<Connection>))
        .branch(case![QuizState::ReceiveQuizMode { title }].endpoint(constructor::receive_quiz_mode))
        .branch(
            case![QuizState::ReceiveNegativeMarking { title, mode }]
                .endpoint(constructor::receive_negative_marking),
        )
        .branch(
            case![QuizState::ReceiveQuestionText { quiz_info }]
                .endpoint(constructor::receive_question_text),
        )
        .branch(
            case![QuizState::ReceiveOptions {
                quiz_info,
                text,
                section
            }]
            .endpoint(constructor::receive_options),
        )
        .branch(
            case![QuizState::ReceiveCorrectOption {
                quiz_info,
                text,
                section,
                options
            }]
            .endpoint(constructor::receive_correct_option),
        )
        .branch(
            case![QuizState::ReceiveAddAnotherQuestion { quiz_info }]
                .endpoint(constructor::receive_add_another_question::<Connection>),
        )
}

/// Group chats are full of ordinary conversation, so only private chats get a hint.
#[instrument(level = "info", skip_all)]
async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    if !msg.chat.is_private() {
        return Ok(());
    }
    debug!(chat = ?msg.chat.id, text = ?msg.text(), "Unhandled message");
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Enter /help to see usages.",
    )
    .await?;
    Ok(())
}
