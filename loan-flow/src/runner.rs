//! FunnelRunner – loads a session, applies **one** funnel event, and persists
//! the updated session back to storage.
//!
//! Every mutation of a session goes through a per-session async mutex, so two
//! requests racing on the same session are applied one after the other rather
//! than overwriting each other. Different sessions never contend.
//!
//! External lookups (CRM, bureau, KYC) happen before the lock is taken; only
//! the pure [`Funnel::apply`](crate::funnel::Funnel::apply) step and the save
//! run under it.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    context::{Context, keys},
    error::{LoanError, Result},
    funnel::{Component, Effect, FunnelEvent, FunnelPolicy, FunnelStage, FunnelStatus},
    providers::{CreditReport, Providers},
    sanction::{self, SanctionLetter},
    storage::{Session, SessionStorage},
};

/// What one applied event produced.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub session_id: String,
    pub stage: FunnelStage,
    pub status: FunnelStatus,
    pub effects: Vec<Effect>,
}

/// High-level helper that orchestrates the _lock → load → apply → save_ pattern.
#[derive(Clone)]
pub struct FunnelRunner {
    storage: Arc<dyn SessionStorage>,
    providers: Providers,
    policy: FunnelPolicy,
    max_chat_messages: usize,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl FunnelRunner {
    pub fn new(storage: Arc<dyn SessionStorage>, providers: Providers) -> Self {
        Self {
            storage,
            providers,
            policy: FunnelPolicy::default(),
            max_chat_messages: crate::context::DEFAULT_MAX_CHAT_MESSAGES,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn with_policy(mut self, policy: FunnelPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_chat_messages(mut self, max_chat_messages: usize) -> Self {
        self.max_chat_messages = max_chat_messages;
        self
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn policy(&self) -> FunnelPolicy {
        self.policy
    }

    /// Starts a fresh session for the customer.
    pub async fn start(&self, customer_id: &str) -> Result<Session> {
        let session = Session::with_context(
            customer_id,
            Context::with_max_chat_messages(self.max_chat_messages),
        );
        self.storage.save(session.clone()).await?;
        info!(session_id = %session.id, customer_id = %customer_id, "Created loan session");
        Ok(session)
    }

    /// Returns the customer's latest unfinished session, or starts one.
    pub async fn resume_or_start(&self, customer_id: &str) -> Result<(Session, bool)> {
        match self.storage.find_active(customer_id).await? {
            Some(session) => {
                info!(session_id = %session.id, customer_id = %customer_id, "Resuming loan session");
                Ok((session, false))
            }
            None => Ok((self.start(customer_id).await?, true)),
        }
    }

    pub async fn load(&self, session_id: &str) -> Result<Session> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| LoanError::SessionNotFound(session_id.to_string()))
    }

    fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `f` against the stored session while holding the session's lock
    /// and saves the result. Nothing is saved when `f` fails.
    pub async fn transact<T, F>(&self, session_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T> + Send,
        T: Send,
    {
        let lock = self.lock_for(session_id);
        let result = async {
            let _guard = lock.lock().await;
            let mut session = self.load(session_id).await?;
            let value = f(&mut session)?;
            session.touch();
            self.storage.save(session).await?;
            Ok::<_, LoanError>(value)
        }
        .await;

        drop(lock);
        self.release_lock(session_id);
        result
    }

    /// Forgets the session's lock once no caller holds or awaits it.
    fn release_lock(&self, session_id: &str) {
        self.locks
            .remove_if(session_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Serialised update of the session's context and transcript, used by
    /// the free-text assistant. The funnel stage is left to [`Self::submit`].
    pub async fn converse<T, F>(&self, session_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Session, &mut Context) -> Result<T> + Send,
        T: Send,
    {
        self.transact(session_id, move |session| {
            let mut context = session.context.clone();
            let value = f(session, &mut context)?;
            session.context = context;
            Ok(value)
        })
        .await
    }

    /// Applies one event, prefixing `leading` effects to the transition's.
    async fn step(
        &self,
        session_id: &str,
        event: FunnelEvent,
        leading: Vec<Effect>,
    ) -> Result<StepOutcome> {
        let policy = self.policy;
        let outcome = self
            .transact(session_id, move |session| {
                let transition = match session.funnel.apply(&event, &policy) {
                    Ok(transition) => transition,
                    Err(err) => {
                        warn!(
                            session_id = %session.id,
                            stage = %session.funnel.stage,
                            event = event.name(),
                            error = %err,
                            "Funnel event rejected"
                        );
                        return Err(err);
                    }
                };

                let mut effects = leading;
                effects.extend(transition.effects);
                if effects.contains(&Effect::GenerateSanctionLetter) {
                    session
                        .context
                        .set(keys::SANCTION_REFERENCE, sanction::new_reference())?;
                }
                session.context.record_effects(&effects);
                session.funnel = transition.funnel;

                Ok(StepOutcome {
                    session_id: session.id.clone(),
                    stage: session.funnel.stage,
                    status: transition.status,
                    effects,
                })
            })
            .await?;

        info!(
            session_id = %outcome.session_id,
            stage = %outcome.stage,
            status = ?outcome.status,
            "Funnel advanced"
        );
        Ok(outcome)
    }

    pub async fn submit(&self, session_id: &str, event: FunnelEvent) -> Result<StepOutcome> {
        self.step(session_id, event, Vec::new()).await
    }

    /// Pulls the customer's KYC record, shows it, and confirms verification.
    pub async fn confirm_kyc(&self, session_id: &str, documents_complete: bool) -> Result<StepOutcome> {
        let session = self.load(session_id).await?;
        ensure_stage(&session, FunnelStage::Verification, "kyc_confirmed")?;

        let customer = self.providers.crm.lookup(&session.customer_id).await?;
        let record = self.providers.kyc.verify(&customer).await?;
        let verified = record.verified;

        self.step(
            session_id,
            FunnelEvent::KycConfirmed {
                documents_complete: documents_complete && verified,
            },
            vec![
                Effect::say("Here are your verified details:"),
                Effect::render(Component::KycDetails { record }),
            ],
        )
        .await
    }

    /// Queries CRM for pre-approval and the bureau for a score, then lets the
    /// funnel classify the application.
    pub async fn run_credit_check(&self, session_id: &str) -> Result<(StepOutcome, CreditReport)> {
        let session = self.load(session_id).await?;
        ensure_stage(&session, FunnelStage::Credit, "credit_score_obtained")?;

        let customer = self.providers.crm.lookup(&session.customer_id).await?;
        let report = self.providers.bureau.report(&customer.pan).await?;

        let outcome = self
            .submit(
                session_id,
                FunnelEvent::CreditScoreObtained {
                    score: report.credit_score,
                    pre_approved: customer.pre_approved,
                },
            )
            .await?;
        Ok((outcome, report))
    }

    /// Renders the sanction letter for a sanctioned session.
    pub async fn sanction_letter(&self, session_id: &str, lender: &str) -> Result<SanctionLetter> {
        let session = self.load(session_id).await?;
        ensure_stage(&session, FunnelStage::Sanction, "sanction_letter")?;

        let customer = self.providers.crm.lookup(&session.customer_id).await?;
        let applicant = session
            .context
            .get::<String>(keys::APPLICANT_NAME)
            .unwrap_or(customer.name);

        SanctionLetter::for_session(&session, lender, &applicant)
    }
}

fn ensure_stage(session: &Session, expected: FunnelStage, event: &str) -> Result<()> {
    if session.funnel.stage != expected {
        return Err(LoanError::StageViolation {
            stage: session.funnel.stage,
            event: event.to_string(),
        });
    }
    Ok(())
}
