use anyhow::Result;
use console::{Emoji, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::gate::{AccessGate, AuthSession, CancelResult, GateDecision, LoginPrompt};
use crate::llm::QuizModels;
use crate::parser::Upload;
use crate::quiz::{AnsweredQuestion, FlowController, parse_selection};

static BOOK: Emoji<'_, '_> = Emoji("📚 ", "");
static BRAIN: Emoji<'_, '_> = Emoji("🧠 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[X] ");
static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");
static CARD: Emoji<'_, '_> = Emoji("💳 ", "");

/// How an interactive session ended
enum SessionEnd {
    Quit,
    /// Logged out or canceled; the access gate runs again
    SignedOut,
}

pub async fn run(path: Option<PathBuf>) -> Result<()> {
    println!();
    println!("{}", style(" Smart Quiz: Learning Companion ").bold().reverse());
    println!();

    let config = Config::load()?;
    let gate = AccessGate::from_config(&config)?;
    let mut auth = AuthSession::default();
    let mut pending_upload = path;

    loop {
        match gate.evaluate(&mut auth).await? {
            GateDecision::LoginRequired => {
                println!("{}{}", KEY, style("Login with Google").bold());
                if !gate.sign_in(&mut auth, &show_login_prompt).await? {
                    println!("{}Sign-in was not completed.", WARN);
                    return Ok(());
                }
                continue;
            }
            GateDecision::SubscribeRequired { checkout_url } => {
                println!("{}{}", CARD, style("Subscribe now!").bold().yellow());
                println!(
                    "  {} {}",
                    style("→").cyan(),
                    style(checkout_url).blue().underlined()
                );
                println!();
                println!("  Run {} again once your subscription is active.", style("smartquiz start").cyan());
                return Ok(());
            }
            GateDecision::Granted => {}
        }

        if let Some(email) = &auth.email {
            println!("{}Signed in as {}", CHECK, style(email).cyan());
        }

        let models = QuizModels::from_config(&config)?;
        let mut flow = FlowController::new(models, config.pipeline.clone());
        flow.start();

        if let Some(path) = pending_upload.take() {
            upload(&mut flow, &path).await;
        } else {
            println!("{}Upload a PDF with {}", BOOK, style("upload <path>").cyan());
        }
        print_help();

        match quiz_loop(&gate, &mut auth, &mut flow).await? {
            SessionEnd::Quit => return Ok(()),
            SessionEnd::SignedOut => println!(),
        }
    }
}

fn show_login_prompt(prompt: &LoginPrompt) {
    println!(
        "  {} Open {} and enter the code {}",
        style("→").cyan(),
        style(&prompt.verification_url).blue().underlined(),
        style(&prompt.user_code).green().bold()
    );
    println!("  {}", style("Waiting for sign-in...").dim());
}

async fn quiz_loop(
    gate: &AccessGate,
    auth: &mut AuthSession,
    flow: &mut FlowController,
) -> Result<SessionEnd> {
    while let Some(line) = read_command()? {
        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line.as_str(), ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "upload" => {
                if rest.is_empty() {
                    println!("{}Usage: upload <path to PDF>", WARN);
                } else {
                    upload(flow, Path::new(rest)).await;
                }
            }
            "questions" => print_questions(flow),
            "answer" => answer(flow, rest).await,
            "cancel" => match gate.cancel(auth).await {
                Ok(CancelResult::Canceled) => {
                    println!("{}Your subscription has been canceled.", CHECK);
                    return Ok(SessionEnd::SignedOut);
                }
                Ok(CancelResult::NoCustomer) => {
                    println!("{}No billing customer found for {}.", WARN, auth.email.as_deref().unwrap_or_default());
                }
                Ok(CancelResult::NotSubscribed) => {
                    println!("{}You do not have an active subscription.", WARN);
                }
                Ok(CancelResult::Unsupported) => {
                    println!(
                        "{}Cancellation is not available for {}. Manage your membership on the provider's site.",
                        WARN,
                        gate.payment_provider()
                    );
                }
                Err(e) => print_error(&e),
            },
            "logout" => {
                gate.logout(auth);
                println!("{}Logged out.", CHECK);
                return Ok(SessionEnd::SignedOut);
            }
            "help" => print_help(),
            "quit" | "exit" => return Ok(SessionEnd::Quit),
            other => println!("{}Unknown command '{}'. Type {} for commands.", WARN, other, style("help").cyan()),
        }
    }

    Ok(SessionEnd::Quit)
}

/// Read one trimmed line; `None` at end of input
fn read_command() -> Result<Option<String>> {
    print!("{} ", style("quiz>").green().bold());
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        println!();
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

async fn upload(flow: &mut FlowController, path: &Path) {
    let upload = match Upload::from_path(path) {
        Ok(upload) => upload,
        Err(e) => return print_error(&e),
    };

    let had_questions = flow.questions().is_some();
    let spinner = match spinner(BRAIN, upload_message(had_questions)) {
        Ok(spinner) => spinner,
        Err(e) => return print_error(&e),
    };
    let result = flow.upload(upload).await;
    spinner.finish_and_clear();

    match result {
        Ok(true) => {
            println!("{}Questions generated from {}", CHECK, style(path.display()).cyan());
            print_questions(flow);
        }
        Ok(false) if had_questions => {
            println!(
                "{}{} will be used for answers; questions stay as generated for this session.",
                CHECK,
                style(path.display()).cyan()
            );
        }
        Ok(false) => {
            println!(
                "{}No text could be extracted from {}. Try another PDF.",
                WARN,
                style(path.display()).cyan()
            );
        }
        Err(e) => print_error(&e),
    }
}

/// Busy message for an upload; questions are only generated once per session
fn upload_message(had_questions: bool) -> &'static str {
    if had_questions {
        "Reading document..."
    } else {
        "Generating questions..."
    }
}

async fn answer(flow: &mut FlowController, selection: &str) {
    let questions = match parse_selection(selection, flow.questions_list()) {
        Ok(questions) => questions,
        Err(e) => return print_error(&anyhow::Error::from(e)),
    };

    let spinner = match spinner(BRAIN, "Generating answers...") {
        Ok(spinner) => spinner,
        Err(e) => return print_error(&e),
    };
    let result = flow.submit(questions).await;
    spinner.finish_and_clear();

    match result {
        Ok(answered) if answered.is_empty() => {
            println!("{}No questions selected.", WARN);
        }
        Ok(answered) => print_answers(&answered),
        Err(e) => print_error(&e),
    }
}

fn spinner(icon: Emoji<'_, '_>, message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template(&format!("{}{{spinner:.green}} {{msg}}", icon))?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message);
    Ok(spinner)
}

fn print_questions(flow: &FlowController) {
    let questions = flow.questions_list();
    if questions.is_empty() {
        println!("{}No questions yet. Upload a PDF first.", WARN);
        return;
    }

    println!();
    println!("{}", style("Practice questions").bold().underlined());
    for (i, question) in questions.iter().enumerate() {
        println!("  {} {}", style(format!("{:>2}.", i + 1)).cyan(), question);
    }
    println!();
    println!("Choose questions to answer with {}", style("answer 1,3,5").cyan());
    println!();
}

fn print_answers(answered: &[AnsweredQuestion]) {
    println!();
    for pair in answered {
        println!("{} {}", style("Question:").bold(), pair.question);
        println!("{} {}", style("Answer:").bold().green(), pair.answer);
        println!("{}", style("━".repeat(50)).dim());
    }
    println!();
}

fn print_help() {
    println!();
    println!("{}Commands:", BOOK);
    println!("  {:<22} {}", style("upload <path>").cyan(), "Upload a PDF");
    println!("  {:<22} {}", style("questions").cyan(), "Show the generated questions");
    println!("  {:<22} {}", style("answer <n,...>").cyan(), "Answer the chosen questions");
    println!("  {:<22} {}", style("cancel").cyan(), "Cancel your subscription");
    println!("  {:<22} {}", style("logout").cyan(), "Sign out");
    println!("  {:<22} {}", style("quit").cyan(), "Leave Smart Quiz");
    println!();
}

fn print_error(error: &anyhow::Error) {
    println!("{}{}", CROSS, style(format!("{:#}", error)).red());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_message_depends_on_existing_questions() {
        assert_eq!(upload_message(false), "Generating questions...");
        assert_eq!(upload_message(true), "Reading document...");
    }
}
