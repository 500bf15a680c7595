use serde::Serialize;

use super::service::SubscriptionError;

/// Recruiter subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub code: &'static str,
    pub name: &'static str,
    pub price_cents: i64,
    pub currency: &'static str,
    pub subtitle: &'static str,
    pub highlight: bool,
}

impl Plan {
    pub fn is_paid(&self) -> bool {
        self.price_cents > 0
    }
}

#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn standard() -> Self {
        Self {
            plans: vec![
                Plan {
                    code: "STARTER",
                    name: "Starter",
                    price_cents: 0,
                    currency: "EUR",
                    subtitle: "For a first recruiting team getting started.",
                    highlight: false,
                },
                Plan {
                    code: "GROWTH",
                    name: "Growth",
                    price_cents: 3900,
                    currency: "EUR",
                    subtitle: "For teams structuring impact recruiting.",
                    highlight: true,
                },
                Plan {
                    code: "SCALE",
                    name: "Scale",
                    price_cents: 9900,
                    currency: "EUR",
                    subtitle: "For organisations with volume and ATS integrations.",
                    highlight: false,
                },
            ],
        }
    }

    pub fn all(&self) -> &[Plan] {
        &self.plans
    }

    pub fn get(&self, code: &str) -> Option<&Plan> {
        let code = code.trim();
        self.plans
            .iter()
            .find(|plan| plan.code.eq_ignore_ascii_case(code))
    }

    /// Checkout is only offered for plans with a price.
    pub fn paid_plan(&self, code: &str) -> Result<&Plan, SubscriptionError> {
        let plan = self
            .get(code)
            .ok_or_else(|| SubscriptionError::UnknownPlan(code.trim().to_string()))?;
        if !plan.is_paid() {
            return Err(SubscriptionError::Invalid(format!(
                "plan {} is free and needs no checkout",
                plan.code
            )));
        }
        Ok(plan)
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
