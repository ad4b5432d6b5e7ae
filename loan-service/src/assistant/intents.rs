use loan_flow::offers::MARKET_AVERAGE_RATE;
use loan_flow::{LoanPurpose, RateQuote};

/// What a free-text chat message is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Advantages,
    InterestRates,
    Trust,
    Interested,
    Apply,
    Fees,
    Timeline,
    Documents,
    Eligibility,
    Help,
    Fallback,
}

/// Keyword table, checked in order; the first row with a matching keyword wins.
const KEYWORDS: &[(Intent, &[&str])] = &[
    (Intent::Advantages, &["advantage", "benefit", "why"]),
    (Intent::InterestRates, &["interest", "rate"]),
    (Intent::Trust, &["trust", "reliable", "safe", "good"]),
    (Intent::Interested, &["interested", "yes", "proceed"]),
    (Intent::Apply, &["apply", "start", "loan"]),
    (Intent::Fees, &["fee", "charge"]),
    (Intent::Timeline, &["time", "fast", "quick"]),
    (Intent::Documents, &["document", "paper"]),
    (Intent::Eligibility, &["eligib", "qualify"]),
    (Intent::Help, &["help", "info"]),
];

/// Words that count as agreement when the assistant has asked whether to proceed.
const AGREEMENT: [&str; 4] = ["yes", "interested", "proceed", "apply"];

impl Intent {
    pub fn detect(message: &str, lender: &str) -> Self {
        let lower = message.to_lowercase();
        let lender = lender.to_lowercase();
        if !lender.is_empty() && lower.contains(&lender) {
            return Intent::Trust;
        }

        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|word| lower.contains(word)))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::Fallback)
    }

    /// Intents that end with a "shall we proceed?" question.
    pub fn asks_for_interest(self) -> bool {
        matches!(self, Intent::Advantages | Intent::InterestRates)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Advantages => "advantages",
            Intent::InterestRates => "interest_rates",
            Intent::Trust => "trust",
            Intent::Interested => "interested",
            Intent::Apply => "apply",
            Intent::Fees => "fees",
            Intent::Timeline => "timeline",
            Intent::Documents => "documents",
            Intent::Eligibility => "eligibility",
            Intent::Help => "help",
            Intent::Fallback => "fallback",
        }
    }
}

pub fn is_agreement(message: &str) -> bool {
    let lower = message.to_lowercase();
    AGREEMENT.iter().any(|word| lower.contains(word))
}

pub fn reply(intent: Intent, message: &str, lender: &str) -> String {
    match intent {
        Intent::Advantages => format!(
            "Great question! Here are the key advantages of our personal loan: 🌟\n\n\
             ✅ Low interest rates starting from {lowest}% p.a.\n\
             ✅ Zero processing fees\n\
             ✅ Instant approval in 30 minutes\n\
             ✅ Money in your account within 24-48 hours\n\
             ✅ Flexible tenure from 12 to 60 months\n\
             ✅ 100% digital process with minimal documentation\n\
             ✅ No hidden charges\n\n\
             Would you like to proceed with the application?",
            lowest = lowest_rate(),
        ),
        Intent::InterestRates => {
            let lines: Vec<String> = LoanPurpose::ALL
                .iter()
                .map(|purpose| format!("• {purpose}: {}% p.a.", purpose.interest_rate()))
                .collect();
            let best = LoanPurpose::ALL
                .iter()
                .map(|purpose| RateQuote::for_purpose(*purpose))
                .max_by_key(|quote| quote.savings_per_lakh)
                .map(|quote| quote.savings_per_lakh)
                .unwrap_or_default();
            format!(
                "Our interest rates start from just {lowest}% p.a. 📉\n\n{}\n\n\
                 The market average is {MARKET_AVERAGE_RATE}% p.a. You can save up to ₹{best} per lakh per year with us, \
                 and there are zero processing fees on top of that! 💰\n\nInterested in applying?",
                lines.join("\n"),
                lowest = lowest_rate(),
            )
        }
        Intent::Trust => format!(
            "Absolutely! {lender} has served lakhs of happy customers. 🏆\n\n\
             ✅ Zero hidden charges\n✅ 30-minute approval\n✅ 24-hour disbursal\n\n\
             You're in safe hands! 🤝"
        ),
        Intent::Interested => "Wonderful! I'm excited to help you get your loan! 🎉\n\n\
             To get started, may I know your full name please?"
            .to_string(),
        Intent::Apply => "Perfect! Let's start your loan application! 🚀\n\n\
             I'll need a few details to find the best loan for you. This will only take 2 minutes!"
            .to_string(),
        Intent::Fees => "Zero fees! That's right, ₹0! 🎉\n\n\
             No processing fees and no hidden charges. What you see is what you get."
            .to_string(),
        Intent::Timeline => "Super fast! ⚡\n\n✓ Approval: 30 minutes\n✓ Disbursal: 24-48 hours\n\
             ✓ 100% digital process"
            .to_string(),
        Intent::Documents => DOCUMENT_LIST.to_string(),
        Intent::Eligibility => "Simple eligibility! ✅\n\n✓ Age: 21-60 years\n\
             ✓ Salary: Minimum ₹25,000/month\n✓ Credit Score: 700+\n\
             ✓ Employment: Salaried or Self-employed"
            .to_string(),
        Intent::Help => "I'm here to help! 😊 You can ask me about:\n\n\
             💰 Loan amounts & rates\n⚡ Approval process\n📊 EMI calculations\n\
             🎯 Eligibility criteria\n📄 Documentation\n\n\
             Or simply say \"apply\" to start your application!"
            .to_string(),
        Intent::Fallback => format!(
            "I understand you're asking about \"{}\". Let me help! 😊\n\n\
             Would you like to:\n1️⃣ Start your loan application\n2️⃣ Learn about our interest rates\n\
             3️⃣ Check eligibility criteria\n4️⃣ Calculate your EMI\n\n\
             Just type what you'd like to know!",
            message.trim()
        ),
    }
}

pub const DOCUMENT_LIST: &str = "Minimal documentation! 📄\n\nJust need:\n✓ PAN Card\n✓ Aadhaar Card\n\
     ✓ Salary Slips (last 3 months)\n✓ Bank Statements (last 6 months)\n\n\
     Everything is digital, no physical paperwork needed!";

fn lowest_rate() -> f64 {
    LoanPurpose::ALL
        .iter()
        .map(|purpose| purpose.interest_rate())
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_route_in_order() {
        let lender = "Demo Capital";
        assert_eq!(Intent::detect("Why should I pick you?", lender), Intent::Advantages);
        assert_eq!(Intent::detect("what is the interest rate", lender), Intent::InterestRates);
        assert_eq!(Intent::detect("is demo capital legit", lender), Intent::Trust);
        assert_eq!(Intent::detect("yes please", lender), Intent::Interested);
        assert_eq!(Intent::detect("I want to apply", lender), Intent::Apply);
        assert_eq!(Intent::detect("any hidden charges?", lender), Intent::Fees);
        assert_eq!(Intent::detect("how quick is it", lender), Intent::Timeline);
        assert_eq!(Intent::detect("which papers", lender), Intent::Documents);
        assert_eq!(Intent::detect("do I qualify", lender), Intent::Eligibility);
        assert_eq!(Intent::detect("HELP", lender), Intent::Help);
        assert_eq!(Intent::detect("what's the weather", lender), Intent::Fallback);
    }

    #[test]
    fn interest_beats_interested() {
        // "interested" contains "interest", so the rate row fires first.
        assert_eq!(Intent::detect("I'm interested", "x"), Intent::InterestRates);
    }

    #[test]
    fn rates_reply_lists_every_purpose() {
        let text = reply(Intent::InterestRates, "", "Demo Capital");
        for purpose in LoanPurpose::ALL {
            assert!(text.contains(purpose.label()));
        }
        assert!(text.contains("from just 12% p.a."));
        assert!(text.contains("save up to ₹4000 per lakh"));
    }

    #[test]
    fn fallback_echoes_message() {
        let text = reply(Intent::Fallback, "  weather? ", "Demo Capital");
        assert!(text.contains("\"weather?\""));
        assert!(is_agreement("Yes, let's PROCEED"));
        assert!(!is_agreement("not now"));
    }
}
