//! Keyword-driven sales assistant for free-text chat.
//!
//! The assistant never moves the funnel. It answers questions, collects the
//! applicant's name, and points the front end at the component that submits
//! the next funnel event. Its short-term memory (waiting for a yes/no or a
//! name) lives in the session context so it survives restarts.

pub mod intents;

use loan_flow::context::keys;
use loan_flow::{Component, Context, CrmRecord, Effect, FunnelStage, Result, Session, format_amount};
use serde::Serialize;

pub use intents::Intent;

/// The assistant's answer to one chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub intent: Option<&'static str>,
    pub effects: Vec<Effect>,
}

impl Reply {
    fn new(intent: Option<Intent>, effects: Vec<Effect>) -> Self {
        Self {
            intent: intent.map(Intent::as_str),
            effects,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assistant {
    lender: String,
}

impl Assistant {
    pub fn new(lender: impl Into<String>) -> Self {
        Self {
            lender: lender.into(),
        }
    }

    pub fn lender(&self) -> &str {
        &self.lender
    }

    /// Opening messages for a brand-new session.
    pub fn greeting(&self, customer: &CrmRecord) -> Vec<Effect> {
        let mut effects = vec![
            Effect::say(format!(
                "Hi {}! 👋 Welcome to {}! I'm your personal loan assistant.",
                customer.name, self.lender
            )),
            Effect::say(
                "I'm here to help you get the best personal loan with zero fees and instant approval! 💰\n\n\
                 You can ask me about:\n📊 Loan advantages & benefits\n💵 Interest rates & EMI\n\
                 ⚡ Processing time\n📄 Required documents\n✅ Eligibility criteria\n\n\
                 Or simply say \"apply\" to start your application!",
            ),
        ];
        if customer.pre_approved && customer.pre_approved_amount > 0.0 {
            effects.push(Effect::say(format!(
                "🎉 Great news! You're pre-approved for a loan of {} at just {}% p.a.! This is an exclusive offer just for you!",
                format_amount(customer.pre_approved_amount as u64),
                customer.preferred_purpose.interest_rate(),
            )));
        }
        effects
    }

    /// Answers one message, recording both sides in the transcript.
    pub fn respond(&self, session: &Session, context: &mut Context, message: &str) -> Result<Reply> {
        let message = message.trim();
        context.add_user_message(message);

        let reply = self.decide(session.stage(), context, message)?;
        context.record_effects(&reply.effects);
        Ok(reply)
    }

    fn decide(&self, stage: FunnelStage, context: &mut Context, message: &str) -> Result<Reply> {
        if stage == FunnelStage::Conversation {
            if context.get::<bool>(keys::AWAITING_NAME).unwrap_or(false) {
                return self.take_name(context, message);
            }
            if context.get::<bool>(keys::AWAITING_INTEREST).unwrap_or(false) {
                context.remove(keys::AWAITING_INTEREST);
                if intents::is_agreement(message) {
                    context.set(keys::AWAITING_NAME, true)?;
                    return Ok(Reply::new(
                        Some(Intent::Interested),
                        vec![Effect::say(
                            "Excellent! Let's get started with your loan application! 🎉\n\n\
                             First, may I know your full name please?",
                        )],
                    ));
                }
                return Ok(Reply::new(
                    None,
                    vec![Effect::say(
                        "No problem! Feel free to ask me anything else about our loans. I'm here to help! 😊",
                    )],
                ));
            }
        }

        let intent = Intent::detect(message, &self.lender);
        let text = intents::reply(intent, message, &self.lender);

        if stage != FunnelStage::Conversation && matches!(intent, Intent::Interested | Intent::Apply) {
            return Ok(Reply::new(Some(intent), vec![Effect::say(in_progress(stage))]));
        }

        let mut effects = vec![Effect::say(text)];
        match intent {
            Intent::Apply => effects.push(Effect::render(Component::LoanInputs)),
            Intent::Interested => context.set(keys::AWAITING_NAME, true)?,
            intent if intent.asks_for_interest() && stage == FunnelStage::Conversation => {
                context.set(keys::AWAITING_INTEREST, true)?
            }
            _ => {}
        }
        Ok(Reply::new(Some(intent), effects))
    }

    fn take_name(&self, context: &mut Context, message: &str) -> Result<Reply> {
        context.remove(keys::AWAITING_NAME);
        if !is_plausible_name(message) {
            context.set(keys::AWAITING_NAME, true)?;
            return Ok(Reply::new(
                None,
                vec![Effect::say("Sorry, I didn't catch that. What is your full name?")],
            ));
        }

        context.set(keys::APPLICANT_NAME, message)?;
        Ok(Reply::new(
            Some(Intent::Interested),
            vec![
                Effect::say(format!(
                    "Thank you, {message}! 😊\n\nNow, let's proceed with your loan application. \
                     I'll need to collect some documents from you.\n\n\
                     Please upload the following documents:\n📄 PAN Card\n🆔 Aadhaar Card\n\
                     💰 Salary Slips (last 3 months)\n🏦 Bank Statements (last 6 months)"
                )),
                Effect::render(Component::DocumentUpload),
            ],
        ))
    }
}

/// Longest applicant name accepted from chat, in characters.
pub const MAX_NAME_CHARS: usize = 80;

fn is_plausible_name(message: &str) -> bool {
    !message.is_empty()
        && message.chars().count() <= MAX_NAME_CHARS
        && !message.chars().any(char::is_control)
}

fn in_progress(stage: FunnelStage) -> String {
    let next = match stage {
        FunnelStage::Verification => "confirm your KYC documents",
        FunnelStage::Credit => "complete the credit check",
        FunnelStage::Approval => "request your sanction letter",
        FunnelStage::Sanction => "download your sanction letter",
        FunnelStage::Rejected => "review the fallback offer above",
        FunnelStage::Conversation => "share your loan details",
    };
    format!("Your application is already in progress ({stage} stage). Next step: {next}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant() -> Assistant {
        Assistant::new("Demo Capital")
    }

    fn said(reply: &Reply) -> String {
        reply
            .effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Say { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn apply_renders_loan_inputs() {
        let session = Session::new("asha@example.com");
        let mut context = session.context.clone();
        let reply = assistant().respond(&session, &mut context, "I want to apply").unwrap();

        assert_eq!(reply.intent, Some("apply"));
        assert!(reply.effects.contains(&Effect::render(Component::LoanInputs)));
        assert_eq!(context.message_count(), 3);
    }

    #[test]
    fn interest_question_then_yes_then_name() {
        let session = Session::new("asha@example.com");
        let mut context = session.context.clone();
        let assistant = assistant();

        assistant.respond(&session, &mut context, "why you?").unwrap();
        assert_eq!(context.get::<bool>(keys::AWAITING_INTEREST), Some(true));

        let reply = assistant.respond(&session, &mut context, "yes").unwrap();
        assert!(said(&reply).contains("may I know your full name"));
        assert_eq!(context.get::<bool>(keys::AWAITING_NAME), Some(true));
        assert_eq!(context.get::<bool>(keys::AWAITING_INTEREST), None);

        let reply = assistant.respond(&session, &mut context, " Asha Rao ").unwrap();
        assert!(said(&reply).contains("Thank you, Asha Rao!"));
        assert!(reply.effects.contains(&Effect::render(Component::DocumentUpload)));
        assert_eq!(
            context.get::<String>(keys::APPLICANT_NAME).as_deref(),
            Some("Asha Rao")
        );
        assert_eq!(context.get::<bool>(keys::AWAITING_NAME), None);
    }

    #[test]
    fn unusable_names_are_asked_again() {
        let session = Session::new("asha@example.com");
        let mut context = session.context.clone();
        let assistant = assistant();
        context.set(keys::AWAITING_NAME, true).unwrap();

        let too_long = "A".repeat(MAX_NAME_CHARS + 1);
        for name in ["Asha\u{1}Rao", "Asha\nRao", too_long.as_str()] {
            let reply = assistant.respond(&session, &mut context, name).unwrap();
            assert!(said(&reply).contains("What is your full name?"));
            assert_eq!(context.get::<String>(keys::APPLICANT_NAME), None);
            assert_eq!(context.get::<bool>(keys::AWAITING_NAME), Some(true));
        }

        let reply = assistant.respond(&session, &mut context, "Asha Rao").unwrap();
        assert!(reply.effects.contains(&Effect::render(Component::DocumentUpload)));
    }

    #[test]
    fn declining_clears_interest_flag() {
        let session = Session::new("asha@example.com");
        let mut context = session.context.clone();
        let assistant = assistant();

        assistant.respond(&session, &mut context, "what rates do you have").unwrap();
        let reply = assistant.respond(&session, &mut context, "not now").unwrap();
        assert!(said(&reply).starts_with("No problem!"));
        assert_eq!(context.get::<bool>(keys::AWAITING_INTEREST), None);
    }

    #[test]
    fn later_stages_redirect_application_requests() {
        let mut session = Session::new("asha@example.com");
        session.funnel.stage = FunnelStage::Verification;
        let mut context = session.context.clone();

        let reply = assistant().respond(&session, &mut context, "start my loan").unwrap();
        assert!(said(&reply).contains("verification stage"));
        assert!(!reply.effects.contains(&Effect::render(Component::LoanInputs)));

        let reply = assistant().respond(&session, &mut context, "any fees?").unwrap();
        assert_eq!(reply.intent, Some("fees"));
    }

    #[test]
    fn greeting_mentions_pre_approval() {
        let customer = loan_flow::FixedProviders::new(true, 800).record;
        let effects = assistant().greeting(&customer);
        assert_eq!(effects.len(), 3);
        assert!(matches!(&effects[2], Effect::Say { text } if text.contains("₹2,50,000")));

        let customer = loan_flow::FixedProviders::new(false, 800).record;
        assert_eq!(assistant().greeting(&customer).len(), 2);
    }
}
