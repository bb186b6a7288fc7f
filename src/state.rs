use crate::database::quiz::{Question, QuizMode};

#[derive(Debug, Clone)]
pub struct QuizData {
    pub(crate) title: String,
    pub(crate) mode: QuizMode,
    pub(crate) negative_marking: Option<f64>,
    pub(crate) questions: Vec<Question>,
}

#[derive(Debug, Clone, Default)]
pub enum QuizState {
    #[default]
    Start,
    ReceiveQuizTitle,
    ReceiveQuizMode {
        title: String,
    },
    ReceiveNegativeMarking {
        title: String,
        mode: QuizMode,
    },
    ReceiveQuestionText {
        quiz_info: QuizData,
    },
    ReceiveOptions {
        quiz_info: QuizData,
        text: String,
        section: Option<String>,
    },
    ReceiveCorrectOption {
        quiz_info: QuizData,
        text: String,
        section: Option<String>,
        options: Vec<String>,
    },
    ReceiveAddAnotherQuestion {
        quiz_info: QuizData,
    },
}
