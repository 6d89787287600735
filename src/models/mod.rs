pub mod chunk;
pub mod question;
pub mod run;

pub use chunk::{Chunk, Page};
pub use question::{Choice, Question, QuestionType};
pub use run::{Manifest, QuizResults, RunOutput, RunSettings, WrongAnswers};
