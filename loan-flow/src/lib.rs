pub mod context;
pub mod eligibility;
pub mod emi;
pub mod error;
pub mod funnel;
pub mod loan;
pub mod offers;
pub mod providers;
pub mod runner;
pub mod sanction;
pub mod storage;
pub mod storage_postgres;

// Re-export commonly used types
pub use context::{ChatMessage, Context, Sender};
pub use eligibility::{
    CreditProfile, CreditTier, EligibilityDecision, FallbackOffer, RejectionReason,
    affordability_ratio, classify,
};
pub use emi::{EmiBreakdown, EmiResult, compute_emi};
pub use error::{LoanError, Result};
pub use funnel::{
    Component, Effect, Funnel, FunnelEvent, FunnelPolicy, FunnelStage, FunnelStatus, Transition,
};
pub use loan::{LoanPurpose, LoanRequest, format_amount};
pub use offers::{LoanOffer, RateQuote};
pub use providers::{
    CreditBureau, CreditReport, CrmProvider, CrmRecord, FixedProviders, KycRecord, KycVerifier,
    MockProviders, Providers,
};
pub use runner::{FunnelRunner, StepOutcome};
pub use sanction::SanctionLetter;
pub use storage::{InMemorySessionStorage, Session, SessionStorage};
pub use storage_postgres::PostgresSessionStorage;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn seeded_customer_gets_sanctioned() {
        let runner = FunnelRunner::new(
            Arc::new(InMemorySessionStorage::new()),
            Providers::from_single(Arc::new(MockProviders::with_seed(11))),
        );

        let (session, created) = runner
            .resume_or_start("rajesh.kumar@example.com")
            .await
            .unwrap();
        assert!(created);

        let request = LoanRequest::new(100_000.0, 24, LoanPurpose::Education, 75_000.0).unwrap();
        runner
            .submit(&session.id, FunnelEvent::LoanDetailsSubmitted { request })
            .await
            .unwrap();
        runner.confirm_kyc(&session.id, true).await.unwrap();

        let (outcome, report) = runner.run_credit_check(&session.id).await.unwrap();
        assert_eq!(report.credit_score, 820);
        assert_eq!(outcome.stage, FunnelStage::Approval);

        let outcome = runner
            .submit(&session.id, FunnelEvent::SanctionRequested)
            .await
            .unwrap();
        assert!(outcome.effects.contains(&Effect::GenerateSanctionLetter));

        let letter = runner.sanction_letter(&session.id, "Demo Capital").await.unwrap();
        assert_eq!(letter.file_name(), "Sanction_Letter_Rajesh_Kumar.txt");
        assert_eq!(letter.interest_rate, 12.5);

        // A finished application is not resumed.
        let (next, created) = runner
            .resume_or_start("rajesh.kumar@example.com")
            .await
            .unwrap();
        assert!(created);
        assert_ne!(next.id, session.id);
    }

    #[tokio::test]
    async fn low_score_customer_is_rejected_with_fallback() {
        let runner = FunnelRunner::new(
            Arc::new(InMemorySessionStorage::new()),
            Providers::mock(),
        );
        let session = runner.start("rohit.verma@example.com").await.unwrap();

        let request = LoanRequest::new(200_000.0, 36, LoanPurpose::Medical, 50_000.0).unwrap();
        runner
            .submit(&session.id, FunnelEvent::LoanDetailsSubmitted { request })
            .await
            .unwrap();
        runner.confirm_kyc(&session.id, true).await.unwrap();
        let (outcome, _) = runner.run_credit_check(&session.id).await.unwrap();

        assert_eq!(outcome.status, FunnelStatus::Rejected);
        let stored = runner.load(&session.id).await.unwrap();
        assert_eq!(
            stored.funnel.decision,
            Some(EligibilityDecision::Rejected {
                reason: RejectionReason::CreditScoreBelowMinimum,
                fallback_offer: FallbackOffer {
                    amount: 100_000,
                    rate: 14.0,
                },
            })
        );
    }
}
