//! External collaborators of the funnel: CRM, credit bureau and KYC.
//!
//! The funnel itself never calls these; the runner fetches what it needs
//! and feeds the results in as events. [`MockProviders`] simulates the demo
//! back office with a seeded customer directory and randomised data for
//! anyone else; [`FixedProviders`] returns canned answers for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

use crate::eligibility::{CreditTier, MAX_CREDIT_SCORE, MIN_CREDIT_SCORE};
use crate::error::{LoanError, Result};
use crate::loan::LoanPurpose;

pub const BUREAU_NAME: &str = "CIBIL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrmRecord {
    pub name: String,
    pub email: String,
    pub city: String,
    pub salary: f64,
    pub pre_approved: bool,
    pub pre_approved_amount: f64,
    pub preferred_purpose: LoanPurpose,
    pub pan: String,
    pub aadhaar: String,
    pub bank_account: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditReport {
    pub pan: String,
    pub credit_score: u16,
    pub history: CreditTier,
    pub bureau: String,
    pub last_updated: DateTime<Utc>,
}

impl CreditReport {
    pub fn new(pan: impl Into<String>, credit_score: u16) -> Self {
        Self {
            pan: pan.into(),
            credit_score,
            history: CreditTier::from_score(credit_score),
            bureau: BUREAU_NAME.to_string(),
            last_updated: Utc::now(),
        }
    }
}

/// Identity details as confirmed by KYC, with sensitive numbers masked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycRecord {
    pub name: String,
    pub pan: String,
    pub aadhaar: String,
    pub bank_account: String,
    pub verified: bool,
}

#[async_trait]
pub trait CrmProvider: Send + Sync {
    async fn lookup(&self, customer_id: &str) -> Result<CrmRecord>;
}

#[async_trait]
pub trait CreditBureau: Send + Sync {
    async fn report(&self, pan: &str) -> Result<CreditReport>;
}

#[async_trait]
pub trait KycVerifier: Send + Sync {
    async fn verify(&self, customer: &CrmRecord) -> Result<KycRecord>;
}

/// The three collaborators bundled for injection.
#[derive(Clone)]
pub struct Providers {
    pub crm: Arc<dyn CrmProvider>,
    pub bureau: Arc<dyn CreditBureau>,
    pub kyc: Arc<dyn KycVerifier>,
}

impl Providers {
    pub fn new(
        crm: Arc<dyn CrmProvider>,
        bureau: Arc<dyn CreditBureau>,
        kyc: Arc<dyn KycVerifier>,
    ) -> Self {
        Self { crm, bureau, kyc }
    }

    /// Uses one value for all three roles.
    pub fn from_single<P>(provider: Arc<P>) -> Self
    where
        P: CrmProvider + CreditBureau + KycVerifier + 'static,
    {
        Self {
            crm: provider.clone(),
            bureau: provider.clone(),
            kyc: provider,
        }
    }

    pub fn mock() -> Self {
        Self::from_single(Arc::new(MockProviders::new()))
    }
}

pub fn mask_pan(pan: &str) -> String {
    if pan.len() < 6 || !pan.is_ascii() {
        return "XXXXX0000X".to_string();
    }
    format!("{}XX{}", &pan[..3], &pan[5..])
}

pub fn mask_aadhaar(aadhaar: &str) -> String {
    match aadhaar.split_whitespace().last() {
        Some(last) => format!("XXXX XXXX {last}"),
        None => "XXXX XXXX XXXX".to_string(),
    }
}

fn normalize_customer_id(customer_id: &str) -> Result<String> {
    let id = customer_id.trim().to_lowercase();
    if id.is_empty() {
        return Err(LoanError::invalid("customer id must not be empty"));
    }
    Ok(id)
}

struct SeedCustomer {
    name: &'static str,
    email: &'static str,
    city: &'static str,
    salary: f64,
    pre_approved_amount: f64,
    credit_score: u16,
    purpose: LoanPurpose,
    pan: &'static str,
    aadhaar: &'static str,
    bank_account: &'static str,
    phone: &'static str,
}

const SEED_CUSTOMERS: &[SeedCustomer] = &[
    SeedCustomer { name: "Rajesh Kumar", email: "rajesh.kumar@example.com", city: "Mumbai", salary: 75_000.0, pre_approved_amount: 300_000.0, credit_score: 820, purpose: LoanPurpose::Education, pan: "ABCDE1234F", aadhaar: "1234 5678 9012", bank_account: "XXXX4567", phone: "+91 9876543210" },
    SeedCustomer { name: "Priya Sharma", email: "priya.sharma@example.com", city: "Delhi", salary: 55_000.0, pre_approved_amount: 200_000.0, credit_score: 780, purpose: LoanPurpose::Medical, pan: "FGHIJ5678K", aadhaar: "2345 6789 0123", bank_account: "XXXX7890", phone: "+91 9876543211" },
    SeedCustomer { name: "Amit Patel", email: "amit.patel@example.com", city: "Bangalore", salary: 95_000.0, pre_approved_amount: 500_000.0, credit_score: 850, purpose: LoanPurpose::Business, pan: "KLMNO9012P", aadhaar: "3456 7890 1234", bank_account: "XXXX2345", phone: "+91 9876543212" },
    SeedCustomer { name: "Sneha Reddy", email: "sneha.reddy@example.com", city: "Hyderabad", salary: 45_000.0, pre_approved_amount: 0.0, credit_score: 720, purpose: LoanPurpose::Wedding, pan: "PQRST3456U", aadhaar: "4567 8901 2345", bank_account: "XXXX6789", phone: "+91 9876543213" },
    SeedCustomer { name: "Vikram Singh", email: "vikram.singh@example.com", city: "Pune", salary: 120_000.0, pre_approved_amount: 800_000.0, credit_score: 870, purpose: LoanPurpose::HomeRenovation, pan: "UVWXY7890Z", aadhaar: "5678 9012 3456", bank_account: "XXXX0123", phone: "+91 9876543214" },
    SeedCustomer { name: "Ananya Iyer", email: "ananya.iyer@example.com", city: "Chennai", salary: 60_000.0, pre_approved_amount: 250_000.0, credit_score: 790, purpose: LoanPurpose::Travel, pan: "ZABCD1234E", aadhaar: "6789 0123 4567", bank_account: "XXXX3456", phone: "+91 9876543215" },
    SeedCustomer { name: "Karan Malhotra", email: "karan.malhotra@example.com", city: "Mumbai", salary: 85_000.0, pre_approved_amount: 0.0, credit_score: 710, purpose: LoanPurpose::Other, pan: "EFGHI5678J", aadhaar: "7890 1234 5678", bank_account: "XXXX5678", phone: "+91 9876543216" },
    SeedCustomer { name: "Divya Nair", email: "divya.nair@example.com", city: "Kochi", salary: 70_000.0, pre_approved_amount: 350_000.0, credit_score: 800, purpose: LoanPurpose::Education, pan: "JKLMN9012O", aadhaar: "8901 2345 6789", bank_account: "XXXX8901", phone: "+91 9876543217" },
    SeedCustomer { name: "Rohit Verma", email: "rohit.verma@example.com", city: "Jaipur", salary: 50_000.0, pre_approved_amount: 0.0, credit_score: 690, purpose: LoanPurpose::Medical, pan: "OPQRS3456T", aadhaar: "9012 3456 7890", bank_account: "XXXX9012", phone: "+91 9876543218" },
    SeedCustomer { name: "Meera Desai", email: "meera.desai@example.com", city: "Ahmedabad", salary: 100_000.0, pre_approved_amount: 600_000.0, credit_score: 840, purpose: LoanPurpose::Business, pan: "TUVWX7890Y", aadhaar: "0123 4567 8901", bank_account: "XXXX1234", phone: "+91 9876543219" },
];

const GENERATED_CITIES: [&str; 5] = ["Mumbai", "Delhi", "Bangalore", "Pune", "Hyderabad"];

/// Simulated back office. Seeded customers answer consistently; anyone else
/// gets a randomised profile derived from the instance seed and their email,
/// so repeated lookups agree without the directory growing.
pub struct MockProviders {
    customers: HashMap<String, CrmRecord>,
    scores: HashMap<String, u16>,
    seed: u64,
}

impl MockProviders {
    pub fn new() -> Self {
        Self::with_seed(rand::rng().random())
    }

    /// Deterministic randomness, for reproducible demos.
    pub fn with_seed(seed: u64) -> Self {
        let mut customers = HashMap::new();
        let mut scores = HashMap::new();
        for customer in SEED_CUSTOMERS {
            customers.insert(
                customer.email.to_string(),
                CrmRecord {
                    name: customer.name.to_string(),
                    email: customer.email.to_string(),
                    city: customer.city.to_string(),
                    salary: customer.salary,
                    pre_approved: customer.pre_approved_amount > 0.0,
                    pre_approved_amount: customer.pre_approved_amount,
                    preferred_purpose: customer.purpose,
                    pan: customer.pan.to_string(),
                    aadhaar: customer.aadhaar.to_string(),
                    bank_account: customer.bank_account.to_string(),
                    phone: customer.phone.to_string(),
                },
            );
            scores.insert(customer.pan.to_string(), customer.credit_score);
        }

        Self {
            customers,
            scores,
            seed,
        }
    }

    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }

    /// Random source keyed by `key`; the same key always yields the same draws.
    fn rng_for(&self, key: &str) -> StdRng {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        StdRng::seed_from_u64(hasher.finish())
    }

    fn generate_customer(&self, email: &str) -> CrmRecord {
        let name = email.split('@').next().unwrap_or(email).to_string();
        let mut rng = self.rng_for(email);
        let mut letter = || char::from(b'A' + rng.random_range(0..26u8));
        let prefix: String = (0..5).map(|_| letter()).collect();
        let check = letter();
        let pan = format!("{prefix}{:04}{check}", rng.random_range(0..10_000u32));
        CrmRecord {
            name,
            email: email.to_string(),
            city: GENERATED_CITIES[rng.random_range(0..GENERATED_CITIES.len())].to_string(),
            salary: f64::from(rng.random_range(30_000..130_000u32)),
            pre_approved: rng.random_bool(0.5),
            pre_approved_amount: f64::from(rng.random_range(100_000..500_000u32)),
            preferred_purpose: LoanPurpose::Other,
            pan,
            aadhaar: format!(
                "{} {} {}",
                rng.random_range(1000..10_000u32),
                rng.random_range(1000..10_000u32),
                rng.random_range(1000..10_000u32)
            ),
            bank_account: format!("XXXX{}", rng.random_range(1000..10_000u32)),
            phone: format!("+91 {}", rng.random_range(1_000_000_000..10_000_000_000u64)),
        }
    }
}

impl Default for MockProviders {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CrmProvider for MockProviders {
    async fn lookup(&self, customer_id: &str) -> Result<CrmRecord> {
        let email = normalize_customer_id(customer_id)?;
        if let Some(record) = self.customers.get(&email) {
            return Ok(record.clone());
        }

        let record = self.generate_customer(&email);
        debug!(customer = %email, pre_approved = record.pre_approved, "Generated CRM profile");
        Ok(record)
    }
}

#[async_trait]
impl CreditBureau for MockProviders {
    async fn report(&self, pan: &str) -> Result<CreditReport> {
        let pan = pan.trim().to_uppercase();
        if pan.is_empty() {
            return Err(LoanError::invalid("PAN must not be empty"));
        }

        let score = match self.scores.get(&pan) {
            Some(score) => *score,
            None => self.rng_for(&pan).random_range(700..900u16),
        };
        Ok(CreditReport::new(pan, score))
    }
}

#[async_trait]
impl KycVerifier for MockProviders {
    async fn verify(&self, customer: &CrmRecord) -> Result<KycRecord> {
        Ok(KycRecord {
            name: customer.name.clone(),
            pan: mask_pan(&customer.pan),
            aadhaar: mask_aadhaar(&customer.aadhaar),
            bank_account: customer.bank_account.clone(),
            verified: true,
        })
    }
}

/// Canned answers for every customer; used to make funnel runs deterministic.
#[derive(Debug, Clone)]
pub struct FixedProviders {
    pub record: CrmRecord,
    pub credit_score: u16,
    pub kyc_verified: bool,
}

impl FixedProviders {
    pub fn new(pre_approved: bool, credit_score: u16) -> Self {
        Self {
            record: CrmRecord {
                name: "Test Customer".to_string(),
                email: "test.customer@example.com".to_string(),
                city: "Mumbai".to_string(),
                salary: 50_000.0,
                pre_approved,
                pre_approved_amount: if pre_approved { 250_000.0 } else { 0.0 },
                preferred_purpose: LoanPurpose::Other,
                pan: "ABCDE1234F".to_string(),
                aadhaar: "1234 5678 9012".to_string(),
                bank_account: "XXXX4567".to_string(),
                phone: "+91 9876543210".to_string(),
            },
            credit_score,
            kyc_verified: true,
        }
    }
}

#[async_trait]
impl CrmProvider for FixedProviders {
    async fn lookup(&self, customer_id: &str) -> Result<CrmRecord> {
        let email = normalize_customer_id(customer_id)?;
        Ok(CrmRecord {
            email,
            ..self.record.clone()
        })
    }
}

#[async_trait]
impl CreditBureau for FixedProviders {
    async fn report(&self, pan: &str) -> Result<CreditReport> {
        if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&self.credit_score) {
            return Err(LoanError::Provider(format!(
                "bureau returned out-of-range score {}",
                self.credit_score
            )));
        }
        Ok(CreditReport::new(pan.trim().to_uppercase(), self.credit_score))
    }
}

#[async_trait]
impl KycVerifier for FixedProviders {
    async fn verify(&self, customer: &CrmRecord) -> Result<KycRecord> {
        Ok(KycRecord {
            name: customer.name.clone(),
            pan: mask_pan(&customer.pan),
            aadhaar: mask_aadhaar(&customer.aadhaar),
            bank_account: customer.bank_account.clone(),
            verified: self.kyc_verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_customers_are_stable() {
        let providers = MockProviders::with_seed(7);
        assert_eq!(providers.customer_count(), SEED_CUSTOMERS.len());

        let record = providers.lookup("Rajesh.Kumar@example.com ").await.unwrap();
        assert_eq!(record.name, "Rajesh Kumar");
        assert!(record.pre_approved);

        let report = providers.report(&record.pan).await.unwrap();
        assert_eq!(report.credit_score, 820);
        assert_eq!(report.history, CreditTier::Excellent);

        let rohit = providers.lookup("rohit.verma@example.com").await.unwrap();
        assert!(!rohit.pre_approved);
        assert_eq!(providers.report(&rohit.pan).await.unwrap().credit_score, 690);
    }

    #[tokio::test]
    async fn unknown_customers_are_generated_once() {
        let providers = MockProviders::with_seed(42);
        let first = providers.lookup("new.person@example.com").await.unwrap();
        let second = providers.lookup("new.person@example.com").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name, "new.person");
        assert!((30_000.0..130_000.0).contains(&first.salary));
        assert_eq!(first.pan.len(), 10);
        assert!(first.pan[..5].chars().all(|c| c.is_ascii_uppercase()));
        assert!(first.pan[5..9].chars().all(|c| c.is_ascii_digit()));

        let report = providers.report(&first.pan).await.unwrap();
        assert!((700..900).contains(&report.credit_score));
        let again = providers.report(&first.pan).await.unwrap();
        assert_eq!(report.credit_score, again.credit_score);
    }

    #[tokio::test]
    async fn generated_profiles_do_not_accumulate() {
        let providers = MockProviders::with_seed(42);
        for i in 0..50 {
            providers.lookup(&format!("visitor{i}@example.com")).await.unwrap();
            providers.report(&format!("ZZZZZ{i:04}Z")).await.unwrap();
        }
        assert_eq!(providers.customer_count(), SEED_CUSTOMERS.len());

        let same_seed = MockProviders::with_seed(42);
        assert_eq!(
            providers.lookup("visitor7@example.com").await.unwrap(),
            same_seed.lookup("visitor7@example.com").await.unwrap()
        );
    }

    #[tokio::test]
    async fn empty_identifiers_are_rejected() {
        let providers = MockProviders::with_seed(1);
        assert!(matches!(
            providers.lookup("   ").await,
            Err(LoanError::InvalidInput(_))
        ));
        assert!(matches!(
            providers.report("").await,
            Err(LoanError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn kyc_masks_identifiers() {
        let providers = MockProviders::with_seed(3);
        let record = providers.lookup("priya.sharma@example.com").await.unwrap();
        let kyc = providers.verify(&record).await.unwrap();
        assert_eq!(kyc.pan, "FGHXX5678K");
        assert_eq!(kyc.aadhaar, "XXXX XXXX 0123");
        assert!(kyc.verified);
    }

    #[tokio::test]
    async fn fixed_providers_echo_configuration() {
        let providers = Providers::from_single(Arc::new(FixedProviders::new(true, 810)));
        let record = providers.crm.lookup("someone@example.com").await.unwrap();
        assert_eq!(record.email, "someone@example.com");
        assert!(record.pre_approved);
        assert_eq!(providers.bureau.report("abcde1234f").await.unwrap().pan, "ABCDE1234F");
        assert_eq!(
            providers.bureau.report("x").await.unwrap().credit_score,
            810
        );
    }
}
