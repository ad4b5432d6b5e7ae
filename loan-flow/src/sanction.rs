use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::keys;
use crate::error::{LoanError, Result};
use crate::funnel::FunnelStage;
use crate::loan::{LoanPurpose, format_amount};
use crate::storage::Session;

pub const PROCESSING_FEE_SHARE: f64 = 0.02;

const TERMS: [&str; 5] = [
    "The loan is subject to verification of documents and credit assessment.",
    "Zero processing fees applicable for this loan.",
    "Prepayment allowed after 6 months with no charges.",
    "EMI auto-debit from registered bank account.",
    "Loan disbursal within 24-48 hours of document verification.",
];

const NEXT_STEPS: [&str; 3] = [
    "Submit required documents (if any)",
    "Complete e-sign process",
    "Loan amount will be disbursed to your registered bank account",
];

/// Terms of a sanctioned loan, ready to be rendered as a letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionLetter {
    pub reference: String,
    pub lender: String,
    pub applicant: String,
    pub amount: u64,
    pub interest_rate: f64,
    pub tenure_months: u32,
    pub monthly_emi: u64,
    pub purpose: LoanPurpose,
    pub issued_at: DateTime<Utc>,
}

impl SanctionLetter {
    pub fn for_session(session: &Session, lender: &str, applicant: &str) -> Result<Self> {
        if session.stage() != FunnelStage::Sanction {
            return Err(LoanError::StageViolation {
                stage: session.stage(),
                event: "sanction_letter".to_string(),
            });
        }

        let funnel = &session.funnel;
        let (loan, emi, rate) = match (&funnel.loan, funnel.emi, funnel.interest_rate) {
            (Some(loan), Some(emi), Some(rate)) => (loan, emi, rate),
            _ => return Err(LoanError::invalid("sanctioned session has no loan terms")),
        };

        Ok(Self {
            reference: session
                .context
                .get(keys::SANCTION_REFERENCE)
                .unwrap_or_else(new_reference),
            lender: lender.to_string(),
            applicant: applicant.trim().to_string(),
            amount: loan.amount.round() as u64,
            interest_rate: rate,
            tenure_months: loan.tenure_months,
            monthly_emi: emi.monthly_installment,
            purpose: loan.purpose,
            issued_at: session.updated_at,
        })
    }

    pub fn processing_fee_saving(&self) -> u64 {
        (self.amount as f64 * PROCESSING_FEE_SHARE).floor() as u64
    }

    /// Attachment name built from ASCII letters, digits, `-` and `_` only.
    pub fn file_name(&self) -> String {
        let words: Vec<String> = self
            .applicant
            .split_whitespace()
            .map(|word| {
                word.chars()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                    .collect::<String>()
            })
            .filter(|word| !word.is_empty())
            .collect();
        if words.is_empty() {
            return "Sanction_Letter.txt".to_string();
        }
        format!("Sanction_Letter_{}.txt", words.join("_"))
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SanctionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.lender.to_uppercase())?;
        writeln!(f, "LOAN SANCTION LETTER")?;
        writeln!(f)?;
        writeln!(f, "Reference: {}", self.reference)?;
        writeln!(f, "Date: {}", self.issued_at.format("%d/%m/%Y"))?;
        writeln!(f)?;
        writeln!(f, "Dear {},", self.applicant)?;
        writeln!(f)?;
        writeln!(
            f,
            "We are pleased to inform you that your personal loan application has been approved."
        )?;
        writeln!(f)?;
        writeln!(f, "LOAN DETAILS")?;
        writeln!(f, "  Applicant Name: {}", self.applicant)?;
        writeln!(f, "  Loan Amount:    {}", format_amount(self.amount))?;
        writeln!(f, "  Interest Rate:  {}% p.a.", self.interest_rate)?;
        writeln!(f, "  Tenure:         {} months", self.tenure_months)?;
        writeln!(f, "  Monthly EMI:    {}", format_amount(self.monthly_emi))?;
        writeln!(f, "  Purpose:        {}", self.purpose)?;
        writeln!(f)?;
        writeln!(f, "TERMS & CONDITIONS")?;
        for (i, term) in TERMS.iter().enumerate() {
            writeln!(f, "  {}. {term}", i + 1)?;
        }
        writeln!(f)?;
        writeln!(f, "YOUR BENEFITS")?;
        writeln!(
            f,
            "  - Zero processing fees - Save {}",
            format_amount(self.processing_fee_saving())
        )?;
        writeln!(f, "  - Flexible repayment options")?;
        writeln!(f, "  - 24/7 customer support")?;
        writeln!(f)?;
        writeln!(f, "NEXT STEPS")?;
        for (i, step) in NEXT_STEPS.iter().enumerate() {
            writeln!(f, "  {}. {step}", i + 1)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "This is a system-generated letter and does not require a signature."
        )?;
        write!(f, "{} | {}", self.lender, self.reference)
    }
}

/// A fresh `SL-` reference with eight uppercase alphanumerics.
pub fn new_reference() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("SL-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emi::compute_emi;
    use crate::loan::LoanRequest;

    fn sanctioned() -> Session {
        let mut session = Session::new("asha@example.com");
        session.funnel.stage = FunnelStage::Sanction;
        session.funnel.loan =
            Some(LoanRequest::new(250_000.0, 36, LoanPurpose::HomeRenovation, 80_000.0).unwrap());
        session.funnel.interest_rate = Some(13.0);
        session.funnel.emi = Some(compute_emi(250_000.0, 13.0, 36).unwrap());
        session
    }

    #[test]
    fn letter_carries_loan_terms() {
        let letter = SanctionLetter::for_session(&sanctioned(), "Demo Capital", "Asha Rao").unwrap();
        assert_eq!(letter.amount, 250_000);
        assert_eq!(letter.tenure_months, 36);
        assert_eq!(letter.processing_fee_saving(), 5_000);

        let text = letter.render();
        assert!(text.starts_with("DEMO CAPITAL\nLOAN SANCTION LETTER"));
        assert!(text.contains("Dear Asha Rao,"));
        assert!(text.contains("Loan Amount:    ₹2,50,000"));
        assert!(text.contains("Purpose:        Home Renovation"));
        assert!(text.contains("Save ₹5,000"));
        assert!(text.contains(&letter.reference));
    }

    #[test]
    fn reference_and_file_name_format() {
        let letter =
            SanctionLetter::for_session(&sanctioned(), "Demo Capital", "  Asha  Devi Rao ").unwrap();
        assert_eq!(letter.file_name(), "Sanction_Letter_Asha_Devi_Rao.txt");

        let suffix = letter.reference.strip_prefix("SL-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn file_name_keeps_header_safe_characters() {
        let session = sanctioned();
        for (applicant, expected) in [
            ("Asha \"x\" Rao", "Sanction_Letter_Asha_x_Rao.txt"),
            ("Asha\u{1}Rao", "Sanction_Letter_AshaRao.txt"),
            ("Anne-Marie O'Neil", "Sanction_Letter_Anne-Marie_ONeil.txt"),
            ("\u{0915}\u{093f}", "Sanction_Letter.txt"),
        ] {
            let letter = SanctionLetter::for_session(&session, "Demo Capital", applicant).unwrap();
            assert_eq!(letter.file_name(), expected);
        }
    }

    #[test]
    fn stored_reference_is_reused() {
        let mut session = sanctioned();
        session
            .context
            .set(keys::SANCTION_REFERENCE, "SL-ABCD1234")
            .unwrap();
        let first = SanctionLetter::for_session(&session, "Demo Capital", "Asha").unwrap();
        let second = SanctionLetter::for_session(&session, "Demo Capital", "Asha").unwrap();
        assert_eq!(first.reference, "SL-ABCD1234");
        assert_eq!(first.reference, second.reference);
    }

    #[test]
    fn only_sanctioned_sessions_get_letters() {
        let mut session = sanctioned();
        session.funnel.stage = FunnelStage::Approval;
        assert!(matches!(
            SanctionLetter::for_session(&session, "Demo Capital", "Asha"),
            Err(LoanError::StageViolation { stage: FunnelStage::Approval, .. })
        ));
    }
}
