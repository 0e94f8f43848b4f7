pub mod logic;
pub mod question;
pub mod survey;

pub use logic::{LogicCondition, LogicRule};
pub use question::{AnswerShape, ChoiceSpec, OTHER_CHOICE_ID, QuestionSpec, QuestionType, RatingScale};
pub use survey::{END_DESTINATION, SurveySpec, ThankYouCard};
