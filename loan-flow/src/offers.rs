use serde::Serialize;

use crate::loan::LoanPurpose;

/// Typical unsecured personal-loan rate in the market, % p.a.
pub const MARKET_AVERAGE_RATE: f64 = 16.0;

#[derive(Debug, Clone, Serialize)]
pub struct EligibilityCriteria {
    pub min_age: u8,
    pub max_age: u8,
    pub min_salary: u64,
    pub min_credit_score: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanOffer {
    pub id: u32,
    pub name: &'static str,
    pub purpose: LoanPurpose,
    pub min_amount: u64,
    pub max_amount: u64,
    pub interest_rate: f64,
    pub min_tenure_months: u32,
    pub max_tenure_months: u32,
    pub features: &'static [&'static str],
    pub eligibility: EligibilityCriteria,
}

impl LoanOffer {
    pub fn covers(&self, amount: u64, tenure_months: u32) -> bool {
        (self.min_amount..=self.max_amount).contains(&amount)
            && (self.min_tenure_months..=self.max_tenure_months).contains(&tenure_months)
    }
}

pub const BENEFITS: [&str; 7] = [
    "Zero processing fees",
    "30-minute approval",
    "Competitive interest rates",
    "100% digital process",
    "Secure & confidential",
    "10L+ satisfied customers",
    "Flexible tenure options",
];

/// The product catalogue shown to prospective borrowers.
pub fn catalogue() -> Vec<LoanOffer> {
    vec![
        LoanOffer {
            id: 1,
            name: "Personal Loan - Education",
            purpose: LoanPurpose::Education,
            min_amount: 50_000,
            max_amount: 1_000_000,
            interest_rate: LoanPurpose::Education.interest_rate(),
            min_tenure_months: 12,
            max_tenure_months: 60,
            features: &[
                "Zero processing fees",
                "Flexible repayment",
                "Quick approval in 30 minutes",
                "No collateral required",
            ],
            eligibility: EligibilityCriteria {
                min_age: 21,
                max_age: 60,
                min_salary: 25_000,
                min_credit_score: 700,
            },
        },
        LoanOffer {
            id: 2,
            name: "Personal Loan - Medical",
            purpose: LoanPurpose::Medical,
            min_amount: 25_000,
            max_amount: 500_000,
            interest_rate: LoanPurpose::Medical.interest_rate(),
            min_tenure_months: 12,
            max_tenure_months: 48,
            features: &[
                "Lowest interest rate",
                "Emergency approval",
                "Instant disbursal",
            ],
            eligibility: EligibilityCriteria {
                min_age: 21,
                max_age: 65,
                min_salary: 20_000,
                min_credit_score: 650,
            },
        },
        LoanOffer {
            id: 3,
            name: "Personal Loan - General",
            purpose: LoanPurpose::Other,
            min_amount: 10_000,
            max_amount: 1_000_000,
            interest_rate: LoanPurpose::Other.interest_rate(),
            min_tenure_months: 12,
            max_tenure_months: 60,
            features: &[
                "No end-use restriction",
                "Competitive rates",
                "Digital process",
            ],
            eligibility: EligibilityCriteria {
                min_age: 21,
                max_age: 60,
                min_salary: 30_000,
                min_credit_score: 700,
            },
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateQuote {
    pub purpose: LoanPurpose,
    pub interest_rate: f64,
    pub market_average: f64,
    /// Rupees saved per lakh borrowed per year against the market average.
    pub savings_per_lakh: u64,
}

impl RateQuote {
    pub fn for_purpose(purpose: LoanPurpose) -> Self {
        let rate = purpose.interest_rate();
        Self {
            purpose,
            interest_rate: rate,
            market_average: MARKET_AVERAGE_RATE,
            savings_per_lakh: ((MARKET_AVERAGE_RATE - rate) * 1000.0).floor().max(0.0) as u64,
        }
    }

    pub fn savings_text(&self) -> String {
        format!("Save ₹{} per lakh per year", self.savings_per_lakh)
    }
}
