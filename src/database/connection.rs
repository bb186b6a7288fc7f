use std::error::Error;

use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use teloxide::types::UserId;
use tracing::debug;
use uuid::Uuid;

use super::quiz::{Question, Quiz, QuizMode, Response};

pub type StoreResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

pub struct Connection {
    pool: SqlitePool,
}

impl Connection {
    pub async fn connect(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new().connect(connection_string).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

/// Lifetime answer counters of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserStats {
    pub answered: i64,
    pub correct: i64,
}

impl UserStats {
    pub fn accuracy(&self) -> f64 {
        if self.answered == 0 {
            0.0
        } else {
            self.correct as f64 * 100.0 / self.answered as f64
        }
    }
}

pub trait CreateQuiz {
    async fn create_quiz(&self, quiz: &Quiz) -> StoreResult<Uuid>;
}

pub trait DeleteQuiz {
    /// Returns whether a quiz was removed.
    async fn delete_quiz(&self, creator: UserId, title: &str) -> StoreResult<bool>;
}

pub trait RetreiveQuiz {
    async fn retreive_quiz(&self, id: Uuid) -> StoreResult<Option<Quiz>>;

    async fn find_quiz(&self, creator: UserId, title: &str) -> StoreResult<Option<Quiz>>;

    async fn retreive_quiz_titles(&self, creator: UserId) -> StoreResult<Vec<String>>;
}

pub trait RecordResponse {
    async fn record_response(&self, response: &Response) -> StoreResult<()>;

    async fn user_stats(&self, user: UserId) -> StoreResult<UserStats>;
}

#[derive(sqlx::FromRow)]
struct QuizRecord {
    id: Uuid,
    title: String,
    creator_id: i64,
    mode: String,
    negative_marking: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct QuestionRecord {
    id: Uuid,
    text: String,
    correct_option: i64,
    points: f64,
    section: Option<String>,
}

async fn load_quiz(conn: &mut SqliteConnection, record: QuizRecord) -> Result<Quiz, sqlx::Error> {
    let mut quiz = Quiz::retreive(
        record.id,
        record.title,
        UserId(record.creator_id as u64),
        QuizMode::parse(&record.mode).unwrap_or_default(),
        record.negative_marking,
    );

    let questions: Vec<QuestionRecord> = sqlx::query_as(
        "SELECT id, text, correct_option, points, section FROM questions WHERE quiz_id = ? ORDER BY position",
    )
    .bind(record.id)
    .fetch_all(&mut *conn)
    .await?;

    for record in questions {
        let mut question = Question::retreive(
            record.id,
            record.text,
            record.correct_option as usize,
            record.points,
            record.section,
        );
        let options: Vec<(String,)> = sqlx::query_as(
            "SELECT text FROM question_options WHERE question_id = ? ORDER BY position",
        )
        .bind(record.id)
        .fetch_all(&mut *conn)
        .await?;
        options
            .into_iter()
            .for_each(|(text,)| question.add_option(text));
        quiz.add_question(question);
    }

    Ok(quiz)
}

impl CreateQuiz for Connection {
    async fn create_quiz(&self, quiz: &Quiz) -> StoreResult<Uuid> {
        debug!(quiz = quiz.title(), "Creating transaction");
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quizzes (id, title, creator_id, mode, negative_marking) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(quiz.id())
        .bind(quiz.title())
        .bind(quiz.creator().0 as i64)
        .bind(quiz.mode().as_str())
        .bind(quiz.negative_marking())
        .execute(&mut *tx)
        .await?;

        for (position, question) in quiz.questions().iter().enumerate() {
            debug!(question = question.text(), uuid = %question.id(), "Adding question");
            sqlx::query(
                "INSERT INTO questions (id, quiz_id, position, text, correct_option, points, section) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(question.id())
            .bind(quiz.id())
            .bind(position as i64)
            .bind(question.text())
            .bind(question.correct_option() as i64)
            .bind(question.points())
            .bind(question.section())
            .execute(&mut *tx)
            .await?;

            for (position, option) in question.options().iter().enumerate() {
                sqlx::query(
                    "INSERT INTO question_options (question_id, position, text) VALUES (?, ?, ?)",
                )
                .bind(question.id())
                .bind(position as i64)
                .bind(option)
                .execute(&mut *tx)
                .await?;
            }
        }

        debug!("Closing transaction");
        tx.commit().await?;

        Ok(*quiz.id())
    }
}

impl RetreiveQuiz for Connection {
    async fn retreive_quiz(&self, id: Uuid) -> StoreResult<Option<Quiz>> {
        let mut tx = self.pool.begin().await?;

        let record: Option<QuizRecord> = sqlx::query_as(
            "SELECT id, title, creator_id, mode, negative_marking FROM quizzes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let quiz = match record {
            Some(record) => Some(load_quiz(&mut *tx, record).await?),
            None => None,
        };
        tx.commit().await?;

        Ok(quiz)
    }

    async fn find_quiz(&self, creator: UserId, title: &str) -> StoreResult<Option<Quiz>> {
        let mut tx = self.pool.begin().await?;

        let record: Option<QuizRecord> = sqlx::query_as(
            "SELECT id, title, creator_id, mode, negative_marking FROM quizzes WHERE creator_id = ? AND title = ?",
        )
        .bind(creator.0 as i64)
        .bind(title)
        .fetch_optional(&mut *tx)
        .await?;

        let quiz = match record {
            Some(record) => Some(load_quiz(&mut *tx, record).await?),
            None => None,
        };
        tx.commit().await?;

        Ok(quiz)
    }

    async fn retreive_quiz_titles(&self, creator: UserId) -> StoreResult<Vec<String>> {
        let titles: Vec<(String,)> =
            sqlx::query_as("SELECT title FROM quizzes WHERE creator_id = ? ORDER BY created_at, title")
                .bind(creator.0 as i64)
                .fetch_all(&self.pool)
                .await?;

        Ok(titles.into_iter().map(|(title,)| title).collect())
    }
}

impl DeleteQuiz for Connection {
    async fn delete_quiz(&self, creator: UserId, title: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM quizzes WHERE creator_id = ? AND title = ?")
            .bind(creator.0 as i64)
            .bind(title)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl RecordResponse for Connection {
    async fn record_response(&self, response: &Response) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO responses (user_id, quiz_id, question_id, correct) VALUES (?, ?, ?, ?)",
        )
        .bind(response.user.0 as i64)
        .bind(response.quiz_id)
        .bind(response.question_id)
        .bind(response.correct)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn user_stats(&self, user: UserId) -> StoreResult<UserStats> {
        let (answered, correct): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), SUM(correct) FROM responses WHERE user_id = ?")
                .bind(user.0 as i64)
                .fetch_one(&self.pool)
                .await?;

        Ok(UserStats {
            answered,
            correct: correct.unwrap_or_default(),
        })
    }
}
