//! Turns pending interrupts into resume data by asking on the terminal.

use anyhow::{Context, Result};
use interlude_core::{InterruptContext, TextPrompt};
use interlude_runtime::{FeedbackDecision, FeedbackInfo, ResumeParams};
use interlude_tools::{ApprovalInfo, ApprovalResult, FollowUpAnswer, FollowUpInfo, ReviewEditInfo, ReviewEditResult};
use std::io::{self, BufRead, Write};

/// Line source for answers; stdin in the binary, a fixed script in tests.
pub trait Answers {
    fn ask(&mut self, question: &str) -> Result<String>;
}

pub struct Terminal;

impl Answers for Terminal {
    fn ask(&mut self, question: &str) -> Result<String> {
        print!("{} ", question);
        io::stdout().flush()?;
        let mut line = String::new();
        let read = io::stdin().lock().read_line(&mut line).context("Failed to read answer")?;
        if read == 0 {
            anyhow::bail!("stdin closed while waiting for an answer");
        }
        Ok(line.trim().to_string())
    }
}

fn yes(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Ask for one pending interrupt and add the answer to `params`.
pub fn resolve(answers: &mut dyn Answers, params: ResumeParams, context: &InterruptContext) -> Result<ResumeParams> {
    let info = &context.info;

    let params = if info.is::<ApprovalInfo>() {
        let answer = answers.ask("your input here (Y/N):")?;
        let result = if yes(&answer) {
            ApprovalResult::approve()
        } else {
            let reason = answers.ask("reason (optional):")?;
            ApprovalResult::reject((!reason.is_empty()).then_some(reason))
        };
        params.with_target(&context.id, &result)?
    } else if info.is::<ReviewEditInfo>() {
        let answer = answers.ask("'ok' to run as is, 'n' to refuse, or the edited JSON arguments:")?;
        let result = match answer.as_str() {
            "ok" | "OK" | "" => ReviewEditResult::NoNeedToEdit,
            "n" | "N" | "no" => ReviewEditResult::Disapproved {
                reason: Some(answers.ask("reason (optional):")?).filter(|r| !r.is_empty()),
            },
            edited => ReviewEditResult::EditedArguments {
                arguments_in_json: edited.to_string(),
            },
        };
        params.with_target(&context.id, &result)?
    } else if info.is::<FollowUpInfo>() {
        let questions = info.decode::<FollowUpInfo>()?.questions;
        let mut replies = Vec::with_capacity(questions.len());
        for question in &questions {
            replies.push(answers.ask(&format!("{}:", question))?);
        }
        params.with_target(&context.id, &FollowUpAnswer::Answers { answers: replies })?
    } else if info.is::<FeedbackInfo>() {
        let answer = answers.ask("'ok' to accept, or your feedback:")?;
        let decision = if answer.is_empty() || answer.eq_ignore_ascii_case("ok") {
            FeedbackDecision::NoNeedToEdit
        } else {
            FeedbackDecision::Feedback { text: answer }
        };
        params.with_target(&context.id, &decision)?
    } else if info.is::<TextPrompt>() {
        let answer = answers.ask(">")?;
        params.with_target(&context.id, &answer)?
    } else {
        anyhow::bail!("no prompt for interrupt payload '{}'", info.tag);
    };

    Ok(params)
}
