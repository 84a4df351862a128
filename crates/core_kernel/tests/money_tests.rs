//! Unit tests for the Money module
//!
//! Tests cover money creation, arithmetic, tolerance comparisons,
//! rate application, and edge cases.

use core_kernel::{Money, MoneyError, Rate, TOLERANCE};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_rounds_to_two_decimal_places() {
        let m = Money::new(dec!(100.125));
        assert_eq!(m.amount(), dec!(100.13));
    }

    #[test]
    fn test_deserialized_amounts_are_rounded() {
        let m: Money = serde_json::from_str("\"10.005\"").unwrap();
        assert_eq!(m.amount(), dec!(10.01));

        let m: Money = serde_json::from_str("\"12.345\"").unwrap();
        assert_eq!(m, Money::new(dec!(12.35)));
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"12.35\"");
    }

    #[test]
    fn test_zero_is_zero() {
        assert!(Money::zero().is_zero());
        assert_eq!(Money::ZERO, Money::default());
    }

    #[test]
    fn test_parse_valid_amount() {
        assert_eq!(Money::parse(" 12.50 ").unwrap().amount(), dec!(12.50));
    }

    #[test]
    fn test_parse_invalid_amount() {
        assert!(matches!(Money::parse("12,50"), Err(MoneyError::InvalidAmount(_))));
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_add_and_sub() {
        let a = Money::new(dec!(100.00));
        let b = Money::new(dec!(30.25));

        assert_eq!((a + b).amount(), dec!(130.25));
        assert_eq!((a - b).amount(), dec!(69.75));
    }

    #[test]
    fn test_assign_operators() {
        let mut m = Money::new(dec!(10));
        m += Money::new(dec!(5));
        m -= Money::new(dec!(2.5));
        assert_eq!(m.amount(), dec!(12.5));
    }

    #[test]
    fn test_sum_of_references() {
        let amounts = vec![Money::new(dec!(1.10)), Money::new(dec!(2.20)), Money::new(dec!(3.30))];
        let total: Money = amounts.iter().sum();
        assert_eq!(total.amount(), dec!(6.60));
    }

    #[test]
    fn test_divide_by_zero() {
        let m = Money::new(dec!(10));
        assert_eq!(m.divide(Decimal::ZERO), Err(MoneyError::DivisionByZero));
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::new(dec!(-0.50)).clamp_non_negative(), Money::ZERO);
        assert_eq!(Money::new(dec!(0.50)).clamp_non_negative().amount(), dec!(0.50));
    }
}

mod tolerance {
    use super::*;

    #[test]
    fn test_tolerance_is_one_cent() {
        assert_eq!(TOLERANCE.amount(), dec!(0.01));
    }

    #[test]
    fn test_exceeds_respects_tolerance() {
        let remaining = Money::new(dec!(50.00));

        assert!(!Money::new(dec!(50.00)).exceeds(&remaining));
        assert!(!Money::new(dec!(50.01)).exceeds(&remaining));
        assert!(Money::new(dec!(50.02)).exceeds(&remaining));
        assert!(Money::new(dec!(60.00)).exceeds(&remaining));
    }

    #[test]
    fn test_negligible() {
        assert!(Money::new(dec!(0.01)).is_negligible());
        assert!(Money::new(dec!(-0.01)).is_negligible());
        assert!(!Money::new(dec!(0.02)).is_negligible());
    }
}

mod rates {
    use super::*;

    #[test]
    fn test_rate_percentage_roundtrip() {
        let rate = Rate::from_percentage(dec!(3));
        assert_eq!(rate.as_percentage(), dec!(3));
        assert_eq!(rate.as_decimal(), dec!(0.03));
    }

    #[test]
    fn test_rate_display() {
        assert_eq!(Rate::from_percentage(dec!(2.50)).to_string(), "2.5%");
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(dec!(30)).to_string(), "30.00");
    }
}
