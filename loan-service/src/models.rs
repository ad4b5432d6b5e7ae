use chrono::{DateTime, Utc};
use loan_flow::{
    ChatMessage, CreditReport, EmiBreakdown, Funnel, FunnelStage, FunnelStatus, LoanOffer,
    LoanPurpose, RateQuote, Session, StepOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::assistant::Reply;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub customer_id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub customer_id: String,
    pub created: bool,
    pub stage: FunnelStage,
    pub status: FunnelStatus,
    pub expected_events: Vec<&'static str>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub customer_id: String,
    pub stage: FunnelStage,
    pub status: FunnelStatus,
    pub expected_events: Vec<&'static str>,
    pub funnel: Funnel,
    pub context: HashMap<String, Value>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionSnapshot {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id.clone(),
            customer_id: session.customer_id.clone(),
            stage: session.stage(),
            status: session.funnel.status(),
            expected_events: session.funnel.expected_events(),
            context: session.context.data().clone(),
            message_count: session.context.message_count(),
            created_at: session.created_at,
            updated_at: session.updated_at,
            funnel: session.funnel,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub stage: FunnelStage,
    #[serde(flatten)]
    pub reply: Reply,
}

#[derive(Debug, Deserialize)]
pub struct LoanDetailsRequest {
    pub amount: f64,
    pub tenure_months: u32,
    pub purpose: LoanPurpose,
    pub salary: f64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct KycRequest {
    #[serde(default = "default_true")]
    pub documents_complete: bool,
}

#[derive(Debug, Deserialize)]
pub struct SalarySlipRequest {
    #[serde(default = "default_true")]
    pub documents_complete: bool,
    #[serde(default)]
    pub verified_salary: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CreditCheckResponse {
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub report: CreditReport,
}

#[derive(Debug, Serialize)]
pub struct LetterMetadata {
    pub reference: String,
    pub file_name: String,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct SanctionResponse {
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub letter: LetterMetadata,
}

#[derive(Debug, Serialize)]
pub struct OffersResponse {
    pub offers: Vec<LoanOffer>,
    pub benefits: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct RateQuoteResponse {
    #[serde(flatten)]
    pub quote: RateQuote,
    pub savings: String,
}

#[derive(Debug, Deserialize)]
pub struct EmiRequest {
    pub principal: f64,
    pub rate: f64,
    pub tenure: u32,
}

#[derive(Debug, Serialize)]
pub struct EmiResponse {
    pub emi: u64,
    pub total_amount: u64,
    pub total_interest: u64,
    pub principal: f64,
    pub interest_rate: f64,
    pub tenure: u32,
    pub breakdown: EmiBreakdown,
}
