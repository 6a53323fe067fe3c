// src/commission.rs

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::debug;

use crate::model::{round2, CommissionProfile, CommissionResult, InvoiceLine, SalesRole};

/// Documented default gold commission, LYD per gram sold.
static DEFAULT_GOLD_RATES: Lazy<HashMap<SalesRole, Decimal>> = Lazy::new(|| {
    HashMap::from([
        (SalesRole::SalesRep, dec!(1)),
        (SalesRole::SeniorSalesRep, dec!(1.25)),
        (SalesRole::SalesLead, dec!(1.5)),
        (SalesRole::SalesManager, dec!(1.5)),
    ])
});

/// Documented default diamond commission, percent of sale amount.
static DEFAULT_DIAMOND_RATES: Lazy<HashMap<SalesRole, Decimal>> = Lazy::new(|| {
    HashMap::from([
        (SalesRole::SalesRep, dec!(1.5)),
        (SalesRole::SeniorSalesRep, dec!(3)),
        (SalesRole::SalesLead, dec!(3)),
        (SalesRole::SalesManager, dec!(3)),
    ])
});

/// Role-keyed commission rates: documented defaults with externally supplied
/// settings merged on top.
#[derive(Debug, Clone)]
pub struct CommissionRates {
    gold_per_gram: HashMap<SalesRole, Decimal>,
    diamond_percent: HashMap<SalesRole, Decimal>,
}

impl Default for CommissionRates {
    fn default() -> Self {
        Self {
            gold_per_gram: DEFAULT_GOLD_RATES.clone(),
            diamond_percent: DEFAULT_DIAMOND_RATES.clone(),
        }
    }
}

impl CommissionRates {
    pub fn with_overrides(
        gold: HashMap<SalesRole, Decimal>,
        diamond: HashMap<SalesRole, Decimal>,
    ) -> Self {
        let mut rates = Self::default();
        rates.gold_per_gram.extend(gold);
        rates.diamond_percent.extend(diamond);
        rates
    }

    pub fn gold_rate(&self, role: Option<SalesRole>) -> Decimal {
        role.and_then(|r| self.gold_per_gram.get(&r).copied())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn diamond_percent(&self, role: Option<SalesRole>) -> Decimal {
        role.and_then(|r| self.diamond_percent.get(&r).copied())
            .unwrap_or(Decimal::ZERO)
    }
}

/// Case-insensitive substring match on the free-text supplier type. Brittle
/// by design; the upstream catalog is free text and this mirrors it.
fn supplier_matches(supplier_type: Option<&str>, needle: &str) -> bool {
    supplier_type
        .map(|t| t.to_lowercase().contains(needle))
        .unwrap_or(false)
}

fn gold_grams(invoice: &InvoiceLine) -> Decimal {
    invoice
        .lines
        .iter()
        .filter(|l| supplier_matches(l.supplier_type.as_deref(), "gold"))
        .map(|l| l.qty)
        .sum()
}

/// Resolves one employee's gold and diamond bonuses from the month's invoice
/// rows.
///
/// Gold is LYD-only. Lead and manager roles earn gold on all volume within
/// their commission PS scope regardless of seller attribution; everyone else
/// earns on self-attributed rows only. Diamond has no scope variant: it is
/// self-attributed for every role.
pub fn resolve_commission(
    profile: &CommissionProfile,
    own_ps: Option<i64>,
    invoices: &[InvoiceLine],
    rates: &CommissionRates,
) -> CommissionResult {
    // No seller mapping, no bonus.
    let Some(seller_id) = profile.seller_user_id else {
        return CommissionResult::default();
    };

    let gold_rate = profile
        .gold_rate_per_gram
        .unwrap_or_else(|| rates.gold_rate(profile.role));
    let diamond_pct = profile
        .diamond_percent
        .unwrap_or_else(|| rates.diamond_percent(profile.role));

    let scope: Vec<i64> = if profile.ps_scope.is_empty() {
        own_ps.into_iter().collect()
    } else {
        profile.ps_scope.clone()
    };

    let scope_commission = profile
        .role
        .map(|r| r.has_scope_commission())
        .unwrap_or(false);

    let mut result = CommissionResult::default();
    for invoice in invoices {
        let self_attributed = invoice.seller_user_id == Some(seller_id);
        let in_scope = invoice.ps.map(|ps| scope.contains(&ps)).unwrap_or(false);

        // Gold grams: branch volume for lead/manager, own sales otherwise.
        let counts_for_gold = if scope_commission {
            in_scope
        } else {
            self_attributed && supplier_matches(invoice.supplier_type.as_deref(), "gold")
        };
        if counts_for_gold {
            result.gold_grams_used += gold_grams(invoice);
        }

        // Diamond is always self-attributed.
        if self_attributed && supplier_matches(invoice.supplier_type.as_deref(), "diamond") {
            result.diamond_items += 1;
            result.diamond_bonus_lyd += invoice.amount_lyd;
            result.diamond_bonus_usd += invoice.amount_usd;
        }
    }

    result.gold_bonus_lyd = round2(result.gold_grams_used * gold_rate);
    result.diamond_bonus_lyd = round2(result.diamond_bonus_lyd * diamond_pct / dec!(100));
    result.diamond_bonus_usd = round2(result.diamond_bonus_usd * diamond_pct / dec!(100));

    debug!(
        seller_id,
        grams = %result.gold_grams_used,
        gold = %result.gold_bonus_lyd,
        diamond_lyd = %result.diamond_bonus_lyd,
        "resolved commission"
    );
    result
}
