//! Price resolution.

use crate::domain::market_data::{Bar, QuoteSnapshot, ResolvedPrice, TickerSymbol};

use super::candidates::{
    CURRENT_PRICE_CANDIDATES, PREVIOUS_CLOSE_CANDIDATES, ResolutionInputs, first_valid,
};
use super::errors::ResolutionError;

/// Resolve a price record from an optional quote and recent daily bars.
///
/// Bars may arrive in any order. Only finite, strictly positive values are
/// accepted from any candidate.
///
/// # Errors
///
/// Returns [`ResolutionError::NoPriceData`] when every current-price
/// candidate is missing or invalid.
pub fn resolve(
    ticker: &TickerSymbol,
    quote: Option<&QuoteSnapshot>,
    bars: &[Bar],
) -> Result<ResolvedPrice, ResolutionError> {
    let inputs = ResolutionInputs::new(quote, bars);

    let Some((_, current_price)) = first_valid(&CURRENT_PRICE_CANDIDATES, &inputs) else {
        return Err(ResolutionError::NoPriceData {
            ticker: ticker.clone(),
        });
    };
    let previous_close = first_valid(&PREVIOUS_CLOSE_CANDIDATES, &inputs).map(|(_, value)| value);
    let (price_change, price_change_percent) = daily_change(current_price, previous_close).unzip();

    Ok(ResolvedPrice::real(
        ticker.clone(),
        current_price,
        previous_close,
        price_change,
        price_change_percent,
    ))
}

/// Absolute and percentage change from `previous_close` to `current`.
///
/// `None` unless the previous close is present and positive.
#[must_use]
pub fn daily_change(current: f64, previous_close: Option<f64>) -> Option<(f64, f64)> {
    previous_close.filter(|prev| *prev > 0.0).map(|prev| {
        let change = current - prev;
        (change, change / prev * 100.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market_data::DataSource;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;
    use test_case::test_case;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 5, 0, 0).unwrap()
    }

    fn ticker() -> TickerSymbol {
        TickerSymbol::new("AAPL")
    }

    fn quote(ask: Option<f64>, bid: Option<f64>) -> QuoteSnapshot {
        QuoteSnapshot::new(ask, bid, day(10))
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap();
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn two_bars_with_quote_uses_bar_closes() {
        let bars = [Bar::new(95.0, day(1)), Bar::new(100.0, day(2))];
        let q = quote(Some(101.0), Some(99.0));

        let price = resolve(&ticker(), Some(&q), &bars).unwrap();

        assert_eq!(price.data_source, DataSource::Real);
        assert_eq!(price.current_price, Some(100.0));
        assert_eq!(price.previous_close, Some(95.0));
        assert_close(price.price_change, 5.0);
        assert_close(price.price_change_percent, 5.263_157_894_736_842);
        assert!(price.error.is_none());
    }

    #[test]
    fn bars_in_any_order_are_ranked_by_time() {
        let shuffled = [
            Bar::new(95.0, day(2)),
            Bar::new(100.0, day(3)),
            Bar::new(90.0, day(1)),
        ];
        let sorted = [
            Bar::new(90.0, day(1)),
            Bar::new(95.0, day(2)),
            Bar::new(100.0, day(3)),
        ];

        let a = resolve(&ticker(), None, &shuffled).unwrap();
        let b = resolve(&ticker(), None, &sorted).unwrap();

        assert_eq!(a.current_price, Some(100.0));
        assert_eq!(a.previous_close, Some(95.0));
        assert_eq!(a, b);
    }

    #[test]
    fn no_bars_falls_back_to_quote_sides_in_opposite_orders() {
        let q = quote(Some(101.0), Some(99.0));

        let price = resolve(&ticker(), Some(&q), &[]).unwrap();

        assert_eq!(price.current_price, Some(101.0));
        assert_eq!(price.previous_close, Some(99.0));
        assert_close(price.price_change, 2.0);
        assert_close(price.price_change_percent, 2.020_202_020_202_02);
    }

    #[test]
    fn single_bar_without_quote_has_zero_change() {
        let bars = [Bar::new(50.0, day(3))];

        let price = resolve(&ticker(), None, &bars).unwrap();

        assert_eq!(price.current_price, Some(50.0));
        assert_eq!(price.previous_close, Some(50.0));
        assert_eq!(price.price_change, Some(0.0));
        assert_eq!(price.price_change_percent, Some(0.0));
    }

    #[test]
    fn single_bar_is_preferred_over_quote_for_previous_close() {
        let bars = [Bar::new(50.0, day(3))];
        let q = quote(Some(52.0), Some(51.0));

        let price = resolve(&ticker(), Some(&q), &bars).unwrap();

        assert_eq!(price.current_price, Some(50.0));
        assert_eq!(price.previous_close, Some(50.0));
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(-1.0 ; "negative")]
    #[test_case(f64::NAN ; "nan")]
    #[test_case(f64::INFINITY ; "infinite")]
    fn invalid_current_bar_close_is_skipped(close: f64) {
        let bars = [Bar::new(close, day(2)), Bar::new(95.0, day(1))];
        let q = quote(Some(101.0), None);

        let price = resolve(&ticker(), Some(&q), &bars).unwrap();

        assert_eq!(price.current_price, Some(101.0));
        assert_eq!(price.previous_close, Some(95.0));
    }

    #[test]
    fn nothing_usable_is_no_price_data() {
        let q = quote(Some(0.0), Some(f64::NAN));

        let err = resolve(&ticker(), Some(&q), &[]).unwrap_err();

        assert_eq!(err, ResolutionError::NoPriceData { ticker: ticker() });
    }

    #[test]
    fn no_inputs_is_no_price_data() {
        assert!(resolve(&ticker(), None, &[]).is_err());
    }

    #[test]
    fn daily_change_requires_positive_previous() {
        assert_eq!(daily_change(10.0, None), None);
        assert_eq!(daily_change(10.0, Some(0.0)), None);
        assert_eq!(daily_change(10.0, Some(5.0)), Some((5.0, 100.0)));
    }

    fn raw_price() -> impl Strategy<Value = Option<f64>> {
        prop_oneof![
            Just(None),
            Just(Some(0.0)),
            Just(Some(-3.0)),
            Just(Some(f64::NAN)),
            (0.01f64..10_000.0).prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn resolved_prices_are_always_valid(
            current in raw_price(),
            previous in raw_price(),
            ask in raw_price(),
            bid in raw_price(),
        ) {
            let mut bars = Vec::new();
            if let Some(close) = previous {
                bars.push(Bar::new(close, day(1)));
            }
            if let Some(close) = current {
                bars.push(Bar::new(close, day(2)));
            }
            let q = quote(ask, bid);

            match resolve(&ticker(), Some(&q), &bars) {
                Ok(price) => {
                    let cp = price.current_price.unwrap();
                    prop_assert!(cp.is_finite() && cp > 0.0);
                    let pc = price.previous_close.unwrap();
                    prop_assert!(pc.is_finite() && pc > 0.0);
                    let change = price.price_change.unwrap();
                    prop_assert!((change - (cp - pc)).abs() < 1e-9);
                }
                Err(ResolutionError::NoPriceData { .. }) => {
                    let any_valid = [current, previous, ask, bid]
                        .iter()
                        .flatten()
                        .any(|v| v.is_finite() && *v > 0.0);
                    prop_assert!(!any_valid);
                }
            }
        }
    }
}
