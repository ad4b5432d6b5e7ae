//! Equated monthly installment calculation for amortising loans.

use serde::{Deserialize, Serialize};

use crate::error::{LoanError, Result};

/// Installment figures, each rounded to the nearest whole currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmiResult {
    pub monthly_installment: u64,
    pub total_payable: u64,
    pub total_interest: u64,
}

/// Per-month split of the installment as shown by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmiBreakdown {
    pub monthly_emi: u64,
    pub principal_component: u64,
    pub interest_component: u64,
}

/// Computes the monthly installment, total payable and total interest.
///
/// Uses `P * r / (1 - (1+r)^-n)` with `r = annual_rate_percent / 12 / 100`,
/// which equals `P * r * (1+r)^n / ((1+r)^n - 1)` without overflowing for long
/// tenures. A zero rate degenerates to `P / n`. Rounding is applied to the
/// final figures only, so `total_interest` is exactly zero when the rate is zero.
pub fn compute_emi(principal: f64, annual_rate_percent: f64, tenure_months: u32) -> Result<EmiResult> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(LoanError::invalid(format!(
            "principal must be positive, got {principal}"
        )));
    }
    if !annual_rate_percent.is_finite() || annual_rate_percent < 0.0 {
        return Err(LoanError::invalid(format!(
            "annual rate must be zero or positive, got {annual_rate_percent}"
        )));
    }
    if tenure_months == 0 {
        return Err(LoanError::invalid("tenure must be at least one month"));
    }

    let n = f64::from(tenure_months);
    let monthly_rate = annual_rate_percent / 12.0 / 100.0;

    let emi = if monthly_rate == 0.0 {
        principal / n
    } else {
        // 1 - (1+r)^-n, kept accurate for rates close to zero
        let discount = -(-n * monthly_rate.ln_1p()).exp_m1();
        principal * monthly_rate / discount
    };

    let total_payable = emi * n;
    let total_interest = (total_payable - principal).max(0.0);

    let monthly_installment = whole_units("monthly installment", emi)?;
    if monthly_installment == 0 {
        return Err(LoanError::invalid(format!(
            "principal {principal} is too small to produce an installment"
        )));
    }

    Ok(EmiResult {
        monthly_installment,
        total_payable: whole_units("total payable", total_payable)?,
        total_interest: whole_units("total interest", total_interest)?,
    })
}

fn whole_units(label: &str, value: f64) -> Result<u64> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 0.0 || rounded >= u64::MAX as f64 {
        return Err(LoanError::invalid(format!(
            "{label} is out of range, got {value}"
        )));
    }
    Ok(rounded as u64)
}

impl EmiResult {
    pub fn breakdown(&self, principal: f64, tenure_months: u32) -> EmiBreakdown {
        let n = f64::from(tenure_months.max(1));
        EmiBreakdown {
            monthly_emi: self.monthly_installment,
            principal_component: (principal / n).round() as u64,
            interest_component: (self.total_interest as f64 / n).round() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_amortisation() {
        let result = compute_emi(100_000.0, 13.0, 24).unwrap();
        assert_eq!(result.monthly_installment, 4754);
        assert_eq!(result.total_payable, 114_100);
        assert_eq!(result.total_interest, 14_100);
    }

    #[test]
    fn other_purposes_and_tenures() {
        let education = compute_emi(100_000.0, 12.5, 24).unwrap();
        assert_eq!(education.monthly_installment, 4731);

        let business = compute_emi(500_000.0, 13.5, 36).unwrap();
        assert_eq!(business.monthly_installment, 16_968);
        assert_eq!(business.total_interest, 110_835);
    }

    #[test]
    fn zero_rate_divides_evenly() {
        let result = compute_emi(120_000.0, 0.0, 12).unwrap();
        assert_eq!(result.monthly_installment, 10_000);
        assert_eq!(result.total_payable, 120_000);
        assert_eq!(result.total_interest, 0);
    }

    #[test]
    fn total_payable_tracks_installment() {
        for (principal, rate, tenure) in [
            (10_000.0, 12.0, 12),
            (250_000.0, 14.0, 60),
            (1_000_000.0, 13.5, 48),
            (75_000.0, 0.0, 18),
        ] {
            let result = compute_emi(principal, rate, tenure).unwrap();
            assert!(result.monthly_installment > 0);
            let approx = result.monthly_installment as i64 * tenure as i64;
            assert!((approx - result.total_payable as i64).abs() <= tenure as i64);
            assert_eq!(
                result.total_interest as i64,
                result.total_payable as i64 - principal as i64
            );
        }
    }

    #[test]
    fn identical_inputs_identical_outputs() {
        let first = compute_emi(333_333.0, 13.0, 37).unwrap();
        let second = compute_emi(333_333.0, 13.0, 37).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_out_of_domain_inputs() {
        assert!(matches!(
            compute_emi(0.0, 13.0, 24),
            Err(LoanError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_emi(100_000.0, -1.0, 24),
            Err(LoanError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_emi(100_000.0, 13.0, 0),
            Err(LoanError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_emi(f64::NAN, 13.0, 24),
            Err(LoanError::InvalidInput(_))
        ));
    }

    #[test]
    fn very_long_tenure_converges_to_interest_only() {
        let result = compute_emi(100_000.0, 13.0, 100_000).unwrap();
        assert_eq!(result.monthly_installment, 1083);
        assert!(result.total_payable > result.total_interest);
        assert_eq!(
            result.total_interest,
            result.total_payable - 100_000
        );
    }

    #[test]
    fn unrepresentable_totals_are_rejected() {
        assert!(matches!(
            compute_emi(1e20, 13.0, 24),
            Err(LoanError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_emi(f64::MAX, 0.0, 1),
            Err(LoanError::InvalidInput(_))
        ));
        assert!(matches!(
            compute_emi(0.001, 13.0, 24),
            Err(LoanError::InvalidInput(_))
        ));
    }

    #[test]
    fn tiny_rate_matches_even_split() {
        let result = compute_emi(120_000.0, 1e-300, 12).unwrap();
        assert_eq!(result.monthly_installment, 10_000);
        assert_eq!(result.total_interest, 0);
    }

    #[test]
    fn breakdown_splits_per_month() {
        let result = compute_emi(100_000.0, 13.0, 24).unwrap();
        let breakdown = result.breakdown(100_000.0, 24);
        assert_eq!(breakdown.monthly_emi, 4754);
        assert_eq!(breakdown.principal_component, 4167);
        assert_eq!(breakdown.interest_component, 588);
    }
}
