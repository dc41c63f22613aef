/// Template for the first chunk: draft an initial set of practice questions
pub const QUESTION_PROMPT: &str = r#"You are an expert in creating practice questions based on study material.
Your goal is to prepare a student for their exam. You do this by asking questions about the text below:

------------
{text}
------------

Create questions that will prepare the student for their exam. Make sure not to lose any important information.

QUESTIONS:
"#;

/// Template for every following chunk: refine the questions produced so far
pub const REFINE_PROMPT: &str = r#"As an expert in creating practice questions, your task is to refine the existing questions based on the additional context provided.

Existing Questions:
{existing_answer}

Additional Context:
------------
{text}
------------

Instructions:
- Carefully review the existing questions and the additional context.
- Identify areas where the questions can be improved, clarified, or made more specific.
- Consider the relevance, clarity, and difficulty level of each question.
- Refine the questions to better align with the learning objectives and the provided context.
- If a question is already well-formulated and relevant, you may keep it as is.
- If the additional context is not helpful for a particular question, provide the original question.

Refined Questions:
"#;

/// System prompt for answering from retrieved context
pub const ANSWER_SYSTEM_PROMPT: &str = r#"Use the following pieces of context to answer the user's question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
----------------
{context}"#;

/// Fill `{name}` placeholders in a single pass so substituted text is never rescanned
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn question_prompt(text: &str) -> String {
    render(QUESTION_PROMPT, &[("text", text)])
}

pub fn refine_prompt(existing_questions: &str, text: &str) -> String {
    render(
        REFINE_PROMPT,
        &[("existing_answer", existing_questions), ("text", text)],
    )
}

/// Stuff every retrieved passage into one system prompt
pub fn answer_system_prompt(passages: &[&str]) -> String {
    let context = passages.join("\n\n");
    render(ANSWER_SYSTEM_PROMPT, &[("context", context.as_str())])
}
