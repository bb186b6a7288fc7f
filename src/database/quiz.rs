use std::fmt;

use teloxide::types::UserId;
use uuid::Uuid;

/// Telegram quiz polls take between 2 and 10 options.
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizMode {
    #[default]
    Standard,
    Marathon,
    Sectional,
}

impl QuizMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizMode::Standard => "standard",
            QuizMode::Marathon => "marathon",
            QuizMode::Sectional => "sectional",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "standard" => Some(QuizMode::Standard),
            "marathon" => Some(QuizMode::Marathon),
            "sectional" => Some(QuizMode::Sectional),
            _ => None,
        }
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quiz {
    id: Uuid,
    title: String,
    creator: UserId,
    mode: QuizMode,
    negative_marking: Option<f64>,
    questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    id: Uuid,
    text: String,
    options: Vec<String>,
    correct_option: usize,
    points: f64,
    section: Option<String>,
}

/// One participant's answer, written once and never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub user: UserId,
    pub quiz_id: Uuid,
    pub question_id: Uuid,
    pub correct: bool,
}

impl Quiz {
    pub fn new(
        title: String,
        creator: UserId,
        mode: QuizMode,
        negative_marking: Option<f64>,
        questions: Vec<Question>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            creator,
            mode,
            negative_marking,
            questions,
        }
    }

    pub fn retreive(
        id: Uuid,
        title: String,
        creator: UserId,
        mode: QuizMode,
        negative_marking: Option<f64>,
    ) -> Self {
        Self {
            id,
            title,
            creator,
            mode,
            negative_marking,
            questions: vec![],
        }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn creator(&self) -> UserId {
        self.creator
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    /// Penalty subtracted for a wrong answer, `None` when negative marking is off.
    pub fn negative_marking(&self) -> Option<f64> {
        self.negative_marking
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }
}

impl Question {
    pub fn new(text: String, options: Vec<String>, correct_option: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            options,
            correct_option,
            points: 1.0,
            section: None,
        }
    }

    pub fn retreive(
        id: Uuid,
        text: String,
        correct_option: usize,
        points: f64,
        section: Option<String>,
    ) -> Self {
        Self {
            id,
            text,
            options: vec![],
            correct_option,
            points,
            section,
        }
    }

    pub fn with_section(mut self, section: Option<String>) -> Self {
        self.section = section;
        self
    }

    pub fn with_points(mut self, points: f64) -> Self {
        self.points = points;
        self
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn add_option(&mut self, option: String) {
        self.options.push(option);
    }

    pub fn correct_option(&self) -> usize {
        self.correct_option
    }

    pub fn points(&self) -> f64 {
        self.points
    }

    pub fn section(&self) -> Option<&str> {
        self.section.as_deref()
    }

    /// A question can be sent as a Telegram quiz poll.
    pub fn is_playable(&self) -> bool {
        (MIN_OPTIONS..=MAX_OPTIONS).contains(&self.options.len())
            && self.correct_option < self.options.len()
    }
}
