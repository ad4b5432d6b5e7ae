//! Three-tier eligibility decision: instant approval for pre-approved
//! customers with an affordable EMI, salary-slip verification for customers
//! with a good score, rejection with a reduced fallback offer otherwise.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LoanError, Result};

pub const MIN_CREDIT_SCORE: u16 = 300;
pub const MAX_CREDIT_SCORE: u16 = 900;
/// Score required for the salary-slip tier.
pub const QUALIFYING_CREDIT_SCORE: u16 = 700;
/// EMI as a percentage of salary allowed for instant approval and slip verification.
pub const AFFORDABLE_RATIO: f64 = 50.0;
/// EMI as a percentage of salary beyond which the application is rejected.
pub const MAX_RATIO: f64 = 100.0;
pub const FALLBACK_SHARE: f64 = 0.5;
pub const FALLBACK_RATE: f64 = 14.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl CreditTier {
    pub fn from_score(score: u16) -> Self {
        match score {
            800.. => CreditTier::Excellent,
            750..=799 => CreditTier::Good,
            700..=749 => CreditTier::Fair,
            _ => CreditTier::Poor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CreditTier::Excellent => "Excellent",
            CreditTier::Good => "Good",
            CreditTier::Fair => "Fair",
            CreditTier::Poor => "Poor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditProfile {
    pub score: u16,
    pub tier: CreditTier,
}

impl CreditProfile {
    pub fn new(score: u16) -> Result<Self> {
        validate_score(score)?;
        Ok(Self {
            score,
            tier: CreditTier::from_score(score),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    CreditScoreBelowMinimum,
    EmiExceedsAffordableLimit,
    SalarySlipAttemptsExhausted,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::CreditScoreBelowMinimum => write!(f, "credit score below {QUALIFYING_CREDIT_SCORE}"),
            RejectionReason::EmiExceedsAffordableLimit => f.write_str("EMI exceeds affordable limit"),
            RejectionReason::SalarySlipAttemptsExhausted => {
                f.write_str("salary slip verification attempts exhausted")
            }
        }
    }
}

/// Reduced offer presented alongside a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackOffer {
    pub amount: u64,
    pub rate: f64,
}

impl FallbackOffer {
    pub fn for_requested(requested_amount: f64) -> Self {
        Self {
            amount: (requested_amount * FALLBACK_SHARE).floor() as u64,
            rate: FALLBACK_RATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum EligibilityDecision {
    PreApproved,
    SalarySlipRequired {
        ratio: f64,
    },
    Rejected {
        reason: RejectionReason,
        fallback_offer: FallbackOffer,
    },
}

impl EligibilityDecision {
    pub fn rejected(reason: RejectionReason, requested_amount: f64) -> Self {
        EligibilityDecision::Rejected {
            reason,
            fallback_offer: FallbackOffer::for_requested(requested_amount),
        }
    }

    pub fn tier_name(&self) -> &'static str {
        match self {
            EligibilityDecision::PreApproved => "pre_approved",
            EligibilityDecision::SalarySlipRequired { .. } => "salary_slip_required",
            EligibilityDecision::Rejected { .. } => "rejected",
        }
    }
}

/// EMI as a percentage of monthly salary.
pub fn affordability_ratio(emi: f64, salary: f64) -> Result<f64> {
    if !salary.is_finite() || salary <= 0.0 {
        return Err(LoanError::ClassificationUndefined(format!(
            "salary must be positive to compute the EMI ratio, got {salary}"
        )));
    }
    if !emi.is_finite() || emi < 0.0 {
        return Err(LoanError::invalid(format!(
            "EMI must be zero or positive, got {emi}"
        )));
    }
    Ok(emi / salary * 100.0)
}

/// Decides the eligibility tier. The first matching rule wins.
pub fn classify(
    pre_approved: bool,
    emi: f64,
    salary: f64,
    credit_score: u16,
    requested_amount: f64,
) -> Result<EligibilityDecision> {
    validate_score(credit_score)?;
    if !requested_amount.is_finite() || requested_amount <= 0.0 {
        return Err(LoanError::invalid(format!(
            "requested amount must be positive, got {requested_amount}"
        )));
    }
    let ratio = affordability_ratio(emi, salary)?;

    if pre_approved && ratio <= AFFORDABLE_RATIO {
        return Ok(EligibilityDecision::PreApproved);
    }
    if ratio <= MAX_RATIO && credit_score >= QUALIFYING_CREDIT_SCORE {
        return Ok(EligibilityDecision::SalarySlipRequired { ratio });
    }

    let reason = if credit_score < QUALIFYING_CREDIT_SCORE {
        RejectionReason::CreditScoreBelowMinimum
    } else {
        RejectionReason::EmiExceedsAffordableLimit
    };
    Ok(EligibilityDecision::rejected(reason, requested_amount))
}

fn validate_score(score: u16) -> Result<()> {
    if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&score) {
        return Err(LoanError::invalid(format!(
            "credit score must be between {MIN_CREDIT_SCORE} and {MAX_CREDIT_SCORE}, got {score}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUESTED: f64 = 200_000.0;

    #[test]
    fn pre_approved_and_affordable() {
        let decision = classify(true, 4_000.0, 10_000.0, 720, REQUESTED).unwrap();
        assert_eq!(decision, EligibilityDecision::PreApproved);
    }

    #[test]
    fn salary_slip_for_stretched_ratio() {
        let decision = classify(false, 6_000.0, 10_000.0, 720, REQUESTED).unwrap();
        assert_eq!(decision, EligibilityDecision::SalarySlipRequired { ratio: 60.0 });
    }

    #[test]
    fn rejected_when_emi_exceeds_salary() {
        let decision = classify(false, 12_000.0, 10_000.0, 720, REQUESTED).unwrap();
        assert_eq!(
            decision,
            EligibilityDecision::Rejected {
                reason: RejectionReason::EmiExceedsAffordableLimit,
                fallback_offer: FallbackOffer {
                    amount: 100_000,
                    rate: 14.0
                },
            }
        );
        if let EligibilityDecision::Rejected { reason, .. } = decision {
            assert_eq!(reason.to_string(), "EMI exceeds affordable limit");
        }
    }

    #[test]
    fn rejected_for_low_score_regardless_of_ratio() {
        for emi in [1_000.0, 5_000.0, 9_000.0, 10_000.0] {
            let decision = classify(false, emi, 10_000.0, 650, REQUESTED).unwrap();
            match decision {
                EligibilityDecision::Rejected { reason, .. } => {
                    assert_eq!(reason, RejectionReason::CreditScoreBelowMinimum);
                    assert_eq!(reason.to_string(), "credit score below 700");
                }
                other => panic!("expected rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn ratio_boundaries() {
        let at_limit = classify(true, 5_000.0, 10_000.0, 700, REQUESTED).unwrap();
        assert_eq!(at_limit, EligibilityDecision::PreApproved);

        let just_over = classify(true, 5_001.0, 10_000.0, 700, REQUESTED).unwrap();
        assert!(matches!(
            just_over,
            EligibilityDecision::SalarySlipRequired { ratio } if (ratio - 50.01).abs() < 1e-9
        ));

        let at_max = classify(false, 10_000.0, 10_000.0, 700, REQUESTED).unwrap();
        assert!(matches!(at_max, EligibilityDecision::SalarySlipRequired { .. }));
    }

    #[test]
    fn growing_emi_never_leaves_rejection() {
        for score in [650, 700, 820] {
            for pre_approved in [true, false] {
                let mut rejected = false;
                for step in 0..=300 {
                    let emi = step as f64 * 50.0;
                    let decision = classify(pre_approved, emi, 10_000.0, score, REQUESTED).unwrap();
                    let is_rejected = matches!(decision, EligibilityDecision::Rejected { .. });
                    assert!(!(rejected && !is_rejected), "emi {emi} left a rejection");
                    rejected |= is_rejected;
                }
            }
        }
    }

    #[test]
    fn fallback_offer_floors_half_the_request() {
        let offer = FallbackOffer::for_requested(123_457.0);
        assert_eq!(offer.amount, 61_728);
        assert_eq!(offer.rate, 14.0);
    }

    #[test]
    fn non_positive_salary_is_undefined() {
        assert!(matches!(
            classify(true, 4_000.0, 0.0, 720, REQUESTED),
            Err(LoanError::ClassificationUndefined(_))
        ));
        assert!(matches!(
            classify(true, 4_000.0, -10.0, 720, REQUESTED),
            Err(LoanError::ClassificationUndefined(_))
        ));
    }

    #[test]
    fn rejects_bad_scores_and_amounts() {
        assert!(matches!(
            classify(true, 4_000.0, 10_000.0, 250, REQUESTED),
            Err(LoanError::InvalidInput(_))
        ));
        assert!(matches!(
            classify(true, 4_000.0, 10_000.0, 901, REQUESTED),
            Err(LoanError::InvalidInput(_))
        ));
        assert!(matches!(
            classify(true, -1.0, 10_000.0, 720, REQUESTED),
            Err(LoanError::InvalidInput(_))
        ));
    }

    #[test]
    fn tiers_follow_score_bands() {
        assert_eq!(CreditTier::from_score(850), CreditTier::Excellent);
        assert_eq!(CreditTier::from_score(800), CreditTier::Excellent);
        assert_eq!(CreditTier::from_score(799), CreditTier::Good);
        assert_eq!(CreditTier::from_score(700), CreditTier::Fair);
        assert_eq!(CreditTier::from_score(699), CreditTier::Poor);
        assert!(CreditProfile::new(200).is_err());
    }

    #[test]
    fn decision_serializes_with_tier_tag() {
        let json = serde_json::to_value(EligibilityDecision::SalarySlipRequired { ratio: 60.0 }).unwrap();
        assert_eq!(json["tier"], "salary_slip_required");
        assert_eq!(json["ratio"], 60.0);
    }
}
