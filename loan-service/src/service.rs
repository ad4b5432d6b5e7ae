use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use loan_flow::{
    FunnelEvent, FunnelRunner, InMemorySessionStorage, LoanPurpose, LoanRequest,
    PostgresSessionStorage, Providers, RateQuote, SessionStorage, compute_emi, offers,
};
use regex::Regex;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info};
use uuid::Uuid;

use crate::{
    assistant::Assistant,
    config::ServiceConfig,
    error::{ApiError, ApiResult},
    models::{
        ChatRequest, ChatResponse, CreateSessionRequest, CreditCheckResponse, EmiRequest,
        EmiResponse, HistoryResponse, KycRequest, LetterMetadata, LoanDetailsRequest,
        OffersResponse, RateQuoteResponse, SalarySlipRequest, SanctionResponse, SessionCreated,
        SessionSnapshot,
    },
};

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Input format checks for identifiers that come straight off the wire.
#[derive(Debug, Clone)]
pub struct Validators {
    email: Regex,
    pan: Regex,
}

impl Validators {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            email: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")?,
            pan: Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$")?,
        })
    }

    fn customer_id(&self, raw: &str) -> ApiResult<String> {
        let id = raw.trim().to_lowercase();
        if !self.email.is_match(&id) {
            return Err(ApiError::bad_request(format!(
                "customer id must be an email address, got {raw:?}"
            )));
        }
        Ok(id)
    }

    fn pan(&self, raw: &str) -> ApiResult<String> {
        let pan = raw.trim().to_uppercase();
        if !self.pan.is_match(&pan) {
            return Err(ApiError::bad_request(format!(
                "PAN must look like ABCDE1234F, got {raw:?}"
            )));
        }
        Ok(pan)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub runner: FunnelRunner,
    pub assistant: Arc<Assistant>,
    pub validators: Arc<Validators>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn SessionStorage>,
        providers: Providers,
        config: &ServiceConfig,
    ) -> anyhow::Result<Self> {
        let runner = FunnelRunner::new(storage, providers)
            .with_policy(config.policy())
            .with_max_chat_messages(config.max_chat_messages);

        Ok(Self {
            runner,
            assistant: Arc::new(Assistant::new(config.lender_name.clone())),
            validators: Arc::new(Validators::new()?),
        })
    }
}

pub async fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let storage = create_session_storage(config).await;
    let state = AppState::new(storage, Providers::mock(), config)?;
    Ok(build_router(state))
}

async fn create_session_storage(config: &ServiceConfig) -> Arc<dyn SessionStorage> {
    // Use PostgreSQL when DATABASE_URL is set, otherwise keep sessions in memory
    match &config.database_url {
        Some(database_url) => {
            info!("Using PostgreSQL session storage");
            match PostgresSessionStorage::connect(database_url).await {
                Ok(postgres_storage) => Arc::new(postgres_storage),
                Err(e) => {
                    error!(
                        "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                        e
                    );
                    Arc::new(InMemorySessionStorage::new())
                }
            }
        }
        None => {
            info!("Using in-memory session storage (set DATABASE_URL to use PostgreSQL)");
            Arc::new(InMemorySessionStorage::new())
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/offers", get(list_offers))
        .route("/offers/rate/{purpose}", get(rate_quote))
        .route("/offers/calculate-emi", post(calculate_emi))
        .route("/crm/{customer_id}", get(crm_lookup))
        .route("/credit/{pan}", get(credit_report))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/history", get(get_history))
        .route("/sessions/{id}/chat", post(chat))
        .route("/sessions/{id}/loan", post(submit_loan))
        .route("/sessions/{id}/kyc", post(confirm_kyc))
        .route("/sessions/{id}/credit-check", post(credit_check))
        .route("/sessions/{id}/salary-slip", post(salary_slip))
        .route("/sessions/{id}/sanction", post(request_sanction))
        .route("/sessions/{id}/sanction-letter", get(download_sanction_letter))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(state)
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    // Keep a caller-supplied id, otherwise mint one
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header_value = HeaderValue::from_str(&correlation_id).ok();
    if let Some(value) = &header_value {
        request.headers_mut().insert(CORRELATION_ID_HEADER, value.clone());
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Loan Funnel Service",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /offers": "Product catalogue",
            "GET /offers/rate/{purpose}": "Interest rate quote for a purpose",
            "POST /offers/calculate-emi": "EMI calculator",
            "POST /sessions": "Create or resume a loan session",
            "GET /sessions/{id}": "Session snapshot",
            "POST /sessions/{id}/chat": "Talk to the loan assistant",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "storage": state.runner.storage().backend(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_offers() -> Json<OffersResponse> {
    Json(OffersResponse {
        offers: offers::catalogue(),
        benefits: offers::BENEFITS.to_vec(),
    })
}

async fn rate_quote(Path(purpose): Path<String>) -> Json<RateQuoteResponse> {
    let quote = RateQuote::for_purpose(LoanPurpose::from_label(&purpose));
    Json(RateQuoteResponse {
        savings: quote.savings_text(),
        quote,
    })
}

async fn calculate_emi(Json(request): Json<EmiRequest>) -> ApiResult<Json<EmiResponse>> {
    let emi = compute_emi(request.principal, request.rate, request.tenure)?;
    Ok(Json(EmiResponse {
        emi: emi.monthly_installment,
        total_amount: emi.total_payable,
        total_interest: emi.total_interest,
        principal: request.principal,
        interest_rate: request.rate,
        tenure: request.tenure,
        breakdown: emi.breakdown(request.principal, request.tenure),
    }))
}

async fn crm_lookup(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> ApiResult<Json<loan_flow::CrmRecord>> {
    let customer_id = state.validators.customer_id(&customer_id)?;
    let record = state.runner.providers().crm.lookup(&customer_id).await?;
    Ok(Json(record))
}

async fn credit_report(
    State(state): State<AppState>,
    Path(pan): Path<String>,
) -> ApiResult<Json<loan_flow::CreditReport>> {
    let pan = state.validators.pan(&pan)?;
    let report = state.runner.providers().bureau.report(&pan).await?;
    Ok(Json(report))
}

async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionCreated>)> {
    let customer_id = state.validators.customer_id(&request.customer_id)?;
    let customer = state.runner.providers().crm.lookup(&customer_id).await?;
    let (session, created) = state.runner.resume_or_start(&customer_id).await?;

    let session = if created {
        let greeting = state.assistant.greeting(&customer);
        state
            .runner
            .converse(&session.id, |_, context| {
                context.record_effects(&greeting);
                Ok(())
            })
            .await?;
        state.runner.load(&session.id).await?
    } else {
        session
    };

    info!(
        session_id = %session.id,
        customer_id = %customer_id,
        created,
        "Session ready"
    );

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SessionCreated {
            session_id: session.id.clone(),
            customer_id: session.customer_id.clone(),
            created,
            stage: session.stage(),
            status: session.funnel.status(),
            expected_events: session.funnel.expected_events(),
            messages: session.context.messages().cloned().collect(),
        }),
    ))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionSnapshot>> {
    let session = state.runner.load(&session_id).await?;
    Ok(Json(session.into()))
}

async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let session = state.runner.load(&session_id).await?;
    Ok(Json(HistoryResponse {
        messages: session.context.messages().cloned().collect(),
        session_id: session.id,
    }))
}

async fn chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let assistant = state.assistant.clone();
    let (stage, reply) = state
        .runner
        .converse(&session_id, |session, context| {
            let reply = assistant.respond(session, context, &request.message)?;
            Ok((session.stage(), reply))
        })
        .await?;

    info!(session_id = %session_id, intent = ?reply.intent, "Assistant replied");
    Ok(Json(ChatResponse {
        session_id,
        stage,
        reply,
    }))
}

async fn submit_loan(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<LoanDetailsRequest>,
) -> ApiResult<Json<loan_flow::StepOutcome>> {
    let loan = LoanRequest::new(
        request.amount,
        request.tenure_months,
        request.purpose,
        request.salary,
    )?;
    let outcome = state
        .runner
        .submit(&session_id, FunnelEvent::LoanDetailsSubmitted { request: loan })
        .await?;
    Ok(Json(outcome))
}

async fn confirm_kyc(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<KycRequest>,
) -> ApiResult<Json<loan_flow::StepOutcome>> {
    let outcome = state
        .runner
        .confirm_kyc(&session_id, request.documents_complete)
        .await?;
    Ok(Json(outcome))
}

async fn credit_check(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<CreditCheckResponse>> {
    let (outcome, report) = state.runner.run_credit_check(&session_id).await?;
    Ok(Json(CreditCheckResponse { outcome, report }))
}

async fn salary_slip(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SalarySlipRequest>,
) -> ApiResult<Json<loan_flow::StepOutcome>> {
    let outcome = state
        .runner
        .submit(
            &session_id,
            FunnelEvent::SalarySlipUploaded {
                documents_complete: request.documents_complete,
                verified_salary: request.verified_salary,
            },
        )
        .await?;
    Ok(Json(outcome))
}

async fn request_sanction(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SanctionResponse>> {
    let outcome = state
        .runner
        .submit(&session_id, FunnelEvent::SanctionRequested)
        .await?;
    let letter = state
        .runner
        .sanction_letter(&session_id, state.assistant.lender())
        .await?;

    info!(session_id = %session_id, reference = %letter.reference, "Loan sanctioned");
    Ok(Json(SanctionResponse {
        outcome,
        letter: LetterMetadata {
            download_url: format!("/sessions/{session_id}/sanction-letter"),
            file_name: letter.file_name(),
            reference: letter.reference,
        },
    }))
}

async fn download_sanction_letter(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let letter = state
        .runner
        .sanction_letter(&session_id, state.assistant.lender())
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", letter.file_name()),
            ),
        ],
        letter.render(),
    ))
}
