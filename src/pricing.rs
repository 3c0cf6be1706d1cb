//! Money math for the order workflow. All amounts are integer JPY.

use chrono::NaiveDate;
use rand::Rng;

use crate::models::{Product, SelectedOption};

/// Orders at or above this subtotal ship free.
pub const FREE_SHIPPING_THRESHOLD: i64 = 10_000;

/// Flat shipping fee below the free-shipping threshold, in JPY.
pub const SHIPPING_FEE: i64 = 800;

/// Japanese consumption tax: floor(subtotal * 0.10). Integer division keeps
/// this exact for yen amounts.
pub fn tax(subtotal: i64) -> i64 {
    subtotal / 10
}

pub fn shipping(subtotal: i64) -> i64 {
    if subtotal >= FREE_SHIPPING_THRESHOLD {
        0
    } else {
        SHIPPING_FEE
    }
}

/// Server-side unit price for one line: base price plus the modifier of each
/// selected option value. Client-submitted prices are never consulted.
pub fn unit_price(product: &Product, selected_options: &[SelectedOption]) -> i64 {
    let modifiers: i64 = selected_options
        .iter()
        .map(|selected| product.option_modifier(&selected.option_id, &selected.value))
        .sum();
    product.base_price + modifiers
}

/// Human-readable order number: `WM{yyyyMMdd}-{3-digit random}`.
///
/// No uniqueness is enforced; collisions within a day are possible and
/// tolerated (the order id is the real key).
pub fn order_number(date: NaiveDate) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("WM{}-{suffix:03}", date.format("%Y%m%d"))
}
