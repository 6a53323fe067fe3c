// src/commission_tests.rs

#[cfg(test)]
mod tests {
    use crate::commission::{resolve_commission, CommissionRates};
    use crate::model::{CommissionProfile, InvoiceLine, PurchaseLine, SalesRole};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn gold_invoice(seller: Option<i64>, ps: Option<i64>, grams: Decimal) -> InvoiceLine {
        InvoiceLine {
            seller_user_id: seller,
            ps,
            supplier_type: Some("Gold - 21K".to_string()),
            lines: vec![PurchaseLine {
                supplier_type: Some("gold ingots".to_string()),
                qty: grams,
            }],
            amount_lyd: Decimal::ZERO,
            amount_usd: Decimal::ZERO,
        }
    }

    fn diamond_invoice(
        seller: Option<i64>,
        ps: Option<i64>,
        lyd: Decimal,
        usd: Decimal,
    ) -> InvoiceLine {
        InvoiceLine {
            seller_user_id: seller,
            ps,
            supplier_type: Some("Diamond supplier".to_string()),
            lines: vec![],
            amount_lyd: lyd,
            amount_usd: usd,
        }
    }

    fn profile(seller: Option<i64>, role: Option<SalesRole>, scope: Vec<i64>) -> CommissionProfile {
        CommissionProfile {
            seller_user_id: seller,
            role,
            ps_scope: scope,
            gold_rate_per_gram: None,
            diamond_percent: None,
        }
    }

    #[test]
    fn no_seller_mapping_means_no_commission() {
        let invoices = vec![gold_invoice(Some(5), Some(1), dec!(100))];
        let result = resolve_commission(
            &profile(None, Some(SalesRole::SalesRep), vec![]),
            Some(1),
            &invoices,
            &CommissionRates::default(),
        );
        assert_eq!(result.gold_bonus_lyd, Decimal::ZERO);
        assert_eq!(result.diamond_bonus_lyd, Decimal::ZERO);
    }

    #[test]
    fn rep_earns_on_own_gold_sales_only() {
        let invoices = vec![
            gold_invoice(Some(5), Some(1), dec!(10)),
            gold_invoice(Some(6), Some(1), dec!(40)),
        ];
        let result = resolve_commission(
            &profile(Some(5), Some(SalesRole::SalesRep), vec![]),
            Some(1),
            &invoices,
            &CommissionRates::default(),
        );
        assert_eq!(result.gold_grams_used, dec!(10));
        assert_eq!(result.gold_bonus_lyd, dec!(10.00));
    }

    #[test]
    fn lead_earns_on_branch_volume_regardless_of_seller() {
        let invoices = vec![
            gold_invoice(Some(6), Some(1), dec!(50)),
            gold_invoice(Some(7), Some(2), dec!(30)),
            gold_invoice(Some(8), Some(3), dec!(99)),
        ];
        let result = resolve_commission(
            &profile(Some(5), Some(SalesRole::SalesLead), vec![1, 2]),
            Some(1),
            &invoices,
            &CommissionRates::default(),
        );
        assert_eq!(result.gold_grams_used, dec!(80));
        assert_eq!(result.gold_bonus_lyd, dec!(120.00));
    }

    #[test]
    fn empty_scope_falls_back_to_own_ps() {
        let invoices = vec![
            gold_invoice(Some(6), Some(2), dec!(50)),
            gold_invoice(Some(7), Some(9), dec!(10)),
        ];
        let result = resolve_commission(
            &profile(Some(5), Some(SalesRole::SalesManager), vec![]),
            Some(2),
            &invoices,
            &CommissionRates::default(),
        );
        assert_eq!(result.gold_grams_used, dec!(50));
    }

    #[test]
    fn diamond_stays_self_attributed_for_leads() {
        let invoices = vec![
            diamond_invoice(Some(5), Some(1), dec!(1000), dec!(200)),
            diamond_invoice(Some(6), Some(1), dec!(5000), dec!(900)),
        ];
        let result = resolve_commission(
            &profile(Some(5), Some(SalesRole::SalesLead), vec![1]),
            Some(1),
            &invoices,
            &CommissionRates::default(),
        );
        assert_eq!(result.diamond_items, 1);
        assert_eq!(result.diamond_bonus_lyd, dec!(30.00));
        assert_eq!(result.diamond_bonus_usd, dec!(6.00));
    }

    #[test]
    fn rep_diamond_rate_is_lower() {
        let invoices = vec![diamond_invoice(Some(5), Some(1), dec!(1000), Decimal::ZERO)];
        let result = resolve_commission(
            &profile(Some(5), Some(SalesRole::SalesRep), vec![]),
            Some(1),
            &invoices,
            &CommissionRates::default(),
        );
        assert_eq!(result.diamond_bonus_lyd, dec!(15.00));
    }

    #[test]
    fn per_employee_rate_override_beats_role_table() {
        let invoices = vec![gold_invoice(Some(5), Some(1), dec!(10))];
        let mut p = profile(Some(5), Some(SalesRole::SalesRep), vec![]);
        p.gold_rate_per_gram = Some(dec!(2.5));
        let result = resolve_commission(&p, Some(1), &invoices, &CommissionRates::default());
        assert_eq!(result.gold_bonus_lyd, dec!(25.00));
    }

    #[test]
    fn settings_overrides_extend_role_defaults() {
        let mut gold = HashMap::new();
        gold.insert(SalesRole::SalesRep, dec!(2));
        let rates = CommissionRates::with_overrides(gold, HashMap::new());
        assert_eq!(rates.gold_rate(Some(SalesRole::SalesRep)), dec!(2));
        // Untouched roles keep their defaults.
        assert_eq!(rates.gold_rate(Some(SalesRole::SalesLead)), dec!(1.5));
        assert_eq!(rates.diamond_percent(Some(SalesRole::SalesRep)), dec!(1.5));
    }

    #[test]
    fn roleless_seller_gets_zero_rates() {
        let invoices = vec![gold_invoice(Some(5), Some(1), dec!(10))];
        let result = resolve_commission(
            &profile(Some(5), None, vec![]),
            Some(1),
            &invoices,
            &CommissionRates::default(),
        );
        assert_eq!(result.gold_bonus_lyd, Decimal::ZERO);
    }
}
