//! Question generation, retrieval-augmented answering and the session flow.

mod answers;
mod index;
mod questions;
mod session;

pub use answers::AnsweredQuestion;
pub use session::{FlowController, FlowState, parse_selection};
