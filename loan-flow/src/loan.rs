use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::emi::{EmiResult, compute_emi};
use crate::error::{LoanError, Result};

pub const MIN_LOAN_AMOUNT: f64 = 10_000.0;
pub const MAX_LOAN_AMOUNT: f64 = 1_000_000.0;
pub const MIN_TENURE_MONTHS: u32 = 12;
pub const MAX_TENURE_MONTHS: u32 = 60;

/// What the borrower intends to use the money for. Drives the interest rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoanPurpose {
    Education,
    Medical,
    Business,
    HomeRenovation,
    Wedding,
    Travel,
    Other,
}

impl LoanPurpose {
    pub const ALL: [LoanPurpose; 7] = [
        LoanPurpose::Education,
        LoanPurpose::Medical,
        LoanPurpose::Business,
        LoanPurpose::HomeRenovation,
        LoanPurpose::Wedding,
        LoanPurpose::Travel,
        LoanPurpose::Other,
    ];

    /// Annual interest rate in percent.
    pub fn interest_rate(self) -> f64 {
        match self {
            LoanPurpose::Education => 12.5,
            LoanPurpose::Medical => 12.0,
            LoanPurpose::Business => 13.5,
            LoanPurpose::HomeRenovation => 13.0,
            LoanPurpose::Wedding => 13.5,
            LoanPurpose::Travel => 14.0,
            LoanPurpose::Other => 13.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoanPurpose::Education => "Education",
            LoanPurpose::Medical => "Medical",
            LoanPurpose::Business => "Business",
            LoanPurpose::HomeRenovation => "Home Renovation",
            LoanPurpose::Wedding => "Wedding",
            LoanPurpose::Travel => "Travel",
            LoanPurpose::Other => "Other",
        }
    }

    /// Lenient lookup; anything unrecognised is treated as `Other`.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "education" => LoanPurpose::Education,
            "medical" => LoanPurpose::Medical,
            "business" => LoanPurpose::Business,
            "homerenovation" => LoanPurpose::HomeRenovation,
            "wedding" => LoanPurpose::Wedding,
            "travel" => LoanPurpose::Travel,
            _ => LoanPurpose::Other,
        }
    }
}

impl fmt::Display for LoanPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for LoanPurpose {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<LoanPurpose> for String {
    fn from(purpose: LoanPurpose) -> Self {
        purpose.label().to_string()
    }
}

impl FromStr for LoanPurpose {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

/// Formats a rupee amount with Indian digit grouping, e.g. `₹1,00,000`.
pub fn format_amount(amount: u64) -> String {
    let digits = amount.to_string();
    if digits.len() <= 3 {
        return format!("₹{digits}");
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();

    format!("₹{},{}", groups.join(","), tail)
}

/// Loan parameters collected from the loan-input form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub amount: f64,
    pub tenure_months: u32,
    pub purpose: LoanPurpose,
    /// Declared monthly salary.
    pub salary: f64,
}

impl LoanRequest {
    pub fn new(amount: f64, tenure_months: u32, purpose: LoanPurpose, salary: f64) -> Result<Self> {
        let request = Self {
            amount,
            tenure_months,
            purpose,
            salary,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || !(MIN_LOAN_AMOUNT..=MAX_LOAN_AMOUNT).contains(&self.amount) {
            return Err(LoanError::invalid(format!(
                "loan amount must be between {MIN_LOAN_AMOUNT} and {MAX_LOAN_AMOUNT}, got {}",
                self.amount
            )));
        }
        if !(MIN_TENURE_MONTHS..=MAX_TENURE_MONTHS).contains(&self.tenure_months) {
            return Err(LoanError::invalid(format!(
                "tenure must be between {MIN_TENURE_MONTHS} and {MAX_TENURE_MONTHS} months, got {}",
                self.tenure_months
            )));
        }
        if !self.salary.is_finite() || self.salary <= 0.0 {
            return Err(LoanError::invalid(format!(
                "salary must be positive, got {}",
                self.salary
            )));
        }
        Ok(())
    }

    pub fn interest_rate(&self) -> f64 {
        self.purpose.interest_rate()
    }

    pub fn emi(&self) -> Result<EmiResult> {
        compute_emi(self.amount, self.interest_rate(), self.tenure_months)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_purpose_has_a_rate() {
        let rates: Vec<f64> = LoanPurpose::ALL.iter().map(|p| p.interest_rate()).collect();
        assert_eq!(rates, vec![12.5, 12.0, 13.5, 13.0, 13.5, 14.0, 13.0]);
    }

    #[test]
    fn unknown_labels_fall_back_to_other() {
        assert_eq!(LoanPurpose::from_label("Vacation home"), LoanPurpose::Other);
        assert_eq!(LoanPurpose::from_label("home renovation"), LoanPurpose::HomeRenovation);
        assert_eq!("MEDICAL".parse::<LoanPurpose>().unwrap(), LoanPurpose::Medical);

        let parsed: LoanPurpose = serde_json::from_str("\"Crypto\"").unwrap();
        assert_eq!(parsed, LoanPurpose::Other);
        let parsed: LoanPurpose = serde_json::from_str("\"Home Renovation\"").unwrap();
        assert_eq!(parsed, LoanPurpose::HomeRenovation);
        assert_eq!(
            serde_json::to_string(&LoanPurpose::HomeRenovation).unwrap(),
            "\"Home Renovation\""
        );
    }

    #[test]
    fn request_bounds_are_enforced() {
        assert!(LoanRequest::new(100_000.0, 24, LoanPurpose::Other, 50_000.0).is_ok());
        assert!(LoanRequest::new(9_999.0, 24, LoanPurpose::Other, 50_000.0).is_err());
        assert!(LoanRequest::new(1_000_001.0, 24, LoanPurpose::Other, 50_000.0).is_err());
        assert!(LoanRequest::new(100_000.0, 11, LoanPurpose::Other, 50_000.0).is_err());
        assert!(LoanRequest::new(100_000.0, 61, LoanPurpose::Other, 50_000.0).is_err());
        assert!(LoanRequest::new(100_000.0, 24, LoanPurpose::Other, 0.0).is_err());
    }

    #[test]
    fn amounts_use_indian_grouping() {
        assert_eq!(format_amount(0), "₹0");
        assert_eq!(format_amount(999), "₹999");
        assert_eq!(format_amount(4_754), "₹4,754");
        assert_eq!(format_amount(100_000), "₹1,00,000");
        assert_eq!(format_amount(1_000_000), "₹10,00,000");
        assert_eq!(format_amount(12_345_678), "₹1,23,45,678");
    }

    #[test]
    fn emi_uses_purpose_rate() {
        let request = LoanRequest::new(100_000.0, 24, LoanPurpose::HomeRenovation, 50_000.0).unwrap();
        assert_eq!(request.emi().unwrap().monthly_installment, 4754);
    }
}
