//! Event-driven loan funnel.
//!
//! A [`Funnel`] is the per-session record of how far an application has
//! progressed. [`Funnel::apply`] takes an event and returns a [`Transition`]:
//! the next funnel value plus the effects a front end should perform
//! (messages to show, components to render). The input funnel is never
//! mutated, so a rejected event leaves the caller holding the last valid
//! state.
//!
//! Stages only move forward through
//! `Conversation -> Verification -> Credit -> Approval -> Sanction`, with a
//! terminal `Rejected` branch out of `Credit`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::eligibility::{
    AFFORDABLE_RATIO, CreditProfile, EligibilityDecision, RejectionReason, affordability_ratio,
    classify,
};
use crate::emi::EmiResult;
use crate::error::{LoanError, Result};
use crate::loan::{LoanRequest, format_amount};
use crate::providers::KycRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    #[default]
    Conversation,
    Verification,
    Credit,
    Approval,
    Sanction,
    Rejected,
}

impl FunnelStage {
    pub fn ordinal(self) -> u8 {
        match self {
            FunnelStage::Conversation => 0,
            FunnelStage::Verification => 1,
            FunnelStage::Credit => 2,
            FunnelStage::Approval => 3,
            FunnelStage::Sanction => 4,
            FunnelStage::Rejected => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FunnelStage::Sanction | FunnelStage::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FunnelStage::Conversation => "conversation",
            FunnelStage::Verification => "verification",
            FunnelStage::Credit => "credit",
            FunnelStage::Approval => "approval",
            FunnelStage::Sanction => "sanction",
            FunnelStage::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunnelEvent {
    LoanDetailsSubmitted {
        request: LoanRequest,
    },
    /// Identity documents checked; `documents_complete` is true once every
    /// required slot has been filled.
    KycConfirmed {
        documents_complete: bool,
    },
    CreditScoreObtained {
        score: u16,
        pre_approved: bool,
    },
    SalarySlipUploaded {
        documents_complete: bool,
        /// Salary read from the slip; the declared salary is used when absent.
        #[serde(default)]
        verified_salary: Option<f64>,
    },
    SanctionRequested,
}

impl FunnelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FunnelEvent::LoanDetailsSubmitted { .. } => "loan_details_submitted",
            FunnelEvent::KycConfirmed { .. } => "kyc_confirmed",
            FunnelEvent::CreditScoreObtained { .. } => "credit_score_obtained",
            FunnelEvent::SalarySlipUploaded { .. } => "salary_slip_uploaded",
            FunnelEvent::SanctionRequested => "sanction_requested",
        }
    }
}

/// Interactive widgets the chat front end knows how to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Component {
    LoanInputs,
    DocumentUpload,
    KycDetails { record: KycRecord },
    CreditScoreGauge { score: u16 },
    SalarySlipUpload,
    SanctionLetter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    Say { text: String },
    Render { component: Component },
    Celebrate,
    GenerateSanctionLetter,
}

impl Effect {
    pub fn say(text: impl Into<String>) -> Self {
        Effect::Say { text: text.into() }
    }

    pub fn render(component: Component) -> Self {
        Effect::Render { component }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStatus {
    AwaitingInput,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelPolicy {
    /// Failed salary-slip uploads tolerated before the application is rejected.
    pub max_salary_slip_attempts: u32,
}

impl Default for FunnelPolicy {
    fn default() -> Self {
        Self {
            max_salary_slip_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub funnel: Funnel,
    pub effects: Vec<Effect>,
    pub status: FunnelStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Funnel {
    pub stage: FunnelStage,
    pub loan: Option<LoanRequest>,
    pub interest_rate: Option<f64>,
    pub emi: Option<EmiResult>,
    pub pre_approved: Option<bool>,
    pub credit: Option<CreditProfile>,
    pub decision: Option<EligibilityDecision>,
    #[serde(default)]
    pub salary_slip_attempts: u32,
}

impl Funnel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> FunnelStatus {
        match self.stage {
            FunnelStage::Sanction => FunnelStatus::Completed,
            FunnelStage::Rejected => FunnelStatus::Rejected,
            _ => FunnelStatus::AwaitingInput,
        }
    }

    /// Events the funnel will accept in its current state.
    pub fn expected_events(&self) -> Vec<&'static str> {
        match (self.stage, &self.decision) {
            (FunnelStage::Conversation, _) => vec!["loan_details_submitted"],
            (FunnelStage::Verification, _) => vec!["kyc_confirmed"],
            (FunnelStage::Credit, None) => vec!["credit_score_obtained"],
            (FunnelStage::Credit, Some(EligibilityDecision::SalarySlipRequired { .. })) => {
                vec!["salary_slip_uploaded"]
            }
            (FunnelStage::Approval, _) => vec!["sanction_requested"],
            _ => Vec::new(),
        }
    }

    pub fn apply(&self, event: &FunnelEvent, policy: &FunnelPolicy) -> Result<Transition> {
        let transition = match (self.stage, event) {
            (FunnelStage::Conversation, FunnelEvent::LoanDetailsSubmitted { request }) => {
                self.on_loan_details(request)?
            }
            (FunnelStage::Verification, FunnelEvent::KycConfirmed { documents_complete }) => {
                self.on_kyc_confirmed(*documents_complete)
            }
            (FunnelStage::Credit, FunnelEvent::CreditScoreObtained { score, pre_approved })
                if self.decision.is_none() =>
            {
                self.on_credit_score(*score, *pre_approved)?
            }
            (
                FunnelStage::Credit,
                FunnelEvent::SalarySlipUploaded {
                    documents_complete,
                    verified_salary,
                },
            ) if matches!(
                self.decision,
                Some(EligibilityDecision::SalarySlipRequired { .. })
            ) =>
            {
                self.on_salary_slip(*documents_complete, *verified_salary, policy)?
            }
            (FunnelStage::Approval, FunnelEvent::SanctionRequested) => self.on_sanction_requested(),
            (stage, event) => {
                return Err(LoanError::StageViolation {
                    stage,
                    event: event.name().to_string(),
                });
            }
        };

        debug_assert!(transition.funnel.stage.ordinal() >= self.stage.ordinal());
        Ok(transition)
    }

    fn advance(&self, next: Funnel, effects: Vec<Effect>) -> Transition {
        let status = next.status();
        Transition {
            funnel: next,
            effects,
            status,
        }
    }

    fn loan_terms(&self) -> Result<(&LoanRequest, EmiResult, f64)> {
        match (&self.loan, self.emi, self.interest_rate) {
            (Some(loan), Some(emi), Some(rate)) => Ok((loan, emi, rate)),
            _ => Err(LoanError::invalid("loan details have not been submitted")),
        }
    }

    fn on_loan_details(&self, request: &LoanRequest) -> Result<Transition> {
        request.validate()?;
        let rate = request.interest_rate();
        let emi = request.emi()?;

        let mut next = self.clone();
        next.stage = FunnelStage::Verification;
        next.loan = Some(request.clone());
        next.interest_rate = Some(rate);
        next.emi = Some(emi);

        let effects = vec![
            Effect::say(format!(
                "Excellent choice! 🎯\n\nLoan Amount: {}\nTenure: {} months\nPurpose: {}\nInterest Rate: {}% p.a.\n\nYour Monthly EMI will be approximately {} 💰",
                format_amount(request.amount as u64),
                request.tenure_months,
                request.purpose,
                rate,
                format_amount(emi.monthly_installment),
            )),
            Effect::say("Now let's verify your KYC details... 🔍"),
        ];
        Ok(self.advance(next, effects))
    }

    fn on_kyc_confirmed(&self, documents_complete: bool) -> Transition {
        if !documents_complete {
            return self.advance(
                self.clone(),
                vec![
                    Effect::say(
                        "Some documents are still missing. Please upload your PAN card, Aadhaar card, salary slips and bank statements.",
                    ),
                    Effect::render(Component::DocumentUpload),
                ],
            );
        }

        let mut next = self.clone();
        next.stage = FunnelStage::Credit;
        self.advance(
            next,
            vec![
                Effect::say(
                    "✅ KYC Verified Successfully!\n\nAll your details look good! Moving to credit assessment...",
                ),
                Effect::say("Checking your credit score with the bureau... 📊"),
            ],
        )
    }

    fn on_credit_score(&self, score: u16, pre_approved: bool) -> Result<Transition> {
        let (loan, emi, rate) = self.loan_terms()?;
        let credit = CreditProfile::new(score)?;
        let decision = classify(
            pre_approved,
            emi.monthly_installment as f64,
            loan.salary,
            score,
            loan.amount,
        )?;

        let mut next = self.clone();
        next.pre_approved = Some(pre_approved);
        next.credit = Some(credit);
        next.decision = Some(decision.clone());

        let mut effects = vec![Effect::render(Component::CreditScoreGauge { score })];
        match &decision {
            EligibilityDecision::PreApproved => {
                next.stage = FunnelStage::Approval;
                effects.push(Effect::say(format!(
                    "🎉 CONGRATULATIONS! 🎉\n\nYour loan is INSTANTLY APPROVED! ✅\n\nLoan Amount: {}\nMonthly EMI: {}\nInterest Rate: {}% p.a.\nTenure: {} months\n\nYou're pre-approved with excellent credit! No additional documents needed! 🚀",
                    format_amount(loan.amount as u64),
                    format_amount(emi.monthly_installment),
                    rate,
                    loan.tenure_months,
                )));
                effects.push(Effect::Celebrate);
            }
            EligibilityDecision::SalarySlipRequired { ratio } => {
                effects.push(Effect::say(format!(
                    "Good news! You're eligible! 👍\n\nYour EMI is {ratio:.1}% of your salary. To proceed, please upload your latest salary slip for verification."
                )));
                effects.push(Effect::render(Component::SalarySlipUpload));
            }
            EligibilityDecision::Rejected {
                reason,
                fallback_offer,
            } => {
                next.stage = FunnelStage::Rejected;
                effects.extend(rejection_messages(*reason, fallback_offer.amount, fallback_offer.rate));
            }
        }

        Ok(self.advance(next, effects))
    }

    fn on_salary_slip(
        &self,
        documents_complete: bool,
        verified_salary: Option<f64>,
        policy: &FunnelPolicy,
    ) -> Result<Transition> {
        let (loan, emi, rate) = self.loan_terms()?;
        let salary = verified_salary.unwrap_or(loan.salary);
        let ratio = affordability_ratio(emi.monthly_installment as f64, salary)?;

        let mut next = self.clone();
        if documents_complete && ratio <= AFFORDABLE_RATIO {
            next.stage = FunnelStage::Approval;
            let effects = vec![
                Effect::say(
                    "✅ Salary slip verified successfully!\n\nYour income matches our requirements. Processing approval...",
                ),
                Effect::say(format!(
                    "🎉 LOAN APPROVED! 🎉\n\nCongratulations! Your loan has been approved!\n\nLoan Amount: {}\nMonthly EMI: {}\nInterest Rate: {}% p.a.",
                    format_amount(loan.amount as u64),
                    format_amount(emi.monthly_installment),
                    rate,
                )),
                Effect::Celebrate,
            ];
            return Ok(self.advance(next, effects));
        }

        next.salary_slip_attempts += 1;
        if next.salary_slip_attempts >= policy.max_salary_slip_attempts {
            let decision =
                EligibilityDecision::rejected(RejectionReason::SalarySlipAttemptsExhausted, loan.amount);
            let effects = match &decision {
                EligibilityDecision::Rejected {
                    reason,
                    fallback_offer,
                } => rejection_messages(*reason, fallback_offer.amount, fallback_offer.rate),
                _ => Vec::new(),
            };
            next.stage = FunnelStage::Rejected;
            next.decision = Some(decision);
            return Ok(self.advance(next, effects));
        }

        let problem = if !documents_complete {
            "The salary slip could not be read. Please upload a clear copy.".to_string()
        } else {
            format!(
                "EMI ({}) exceeds 50% of your salary ({}). The maximum allowed EMI is {}.",
                format_amount(emi.monthly_installment),
                format_amount(salary.max(0.0) as u64),
                format_amount((salary * 0.5).floor().max(0.0) as u64),
            )
        };
        let remaining = policy.max_salary_slip_attempts - next.salary_slip_attempts;
        let effects = vec![
            Effect::say(format!(
                "{problem}\n\nYou can try again ({remaining} attempt(s) left)."
            )),
            Effect::render(Component::SalarySlipUpload),
        ];
        Ok(self.advance(next, effects))
    }

    fn on_sanction_requested(&self) -> Transition {
        let mut next = self.clone();
        next.stage = FunnelStage::Sanction;
        self.advance(
            next,
            vec![
                Effect::say("🎊 Your loan has been sanctioned!\n\nGenerating your official sanction letter..."),
                Effect::GenerateSanctionLetter,
                Effect::render(Component::SanctionLetter),
            ],
        )
    }
}

fn rejection_messages(reason: RejectionReason, fallback_amount: u64, fallback_rate: f64) -> Vec<Effect> {
    vec![
        Effect::say(format!(
            "We're sorry, but we cannot approve the requested amount at this time. 😔\n\nReason: {reason}"
        )),
        Effect::say(format!(
            "💡 Fallback Offer:\n\nWe can offer you {} at {}% p.a.",
            format_amount(fallback_amount),
            fallback_rate,
        )),
    ]
}
