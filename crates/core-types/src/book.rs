// In crates/core-types/src/book.rs

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::types::{Position, PositionChange, Symbol};

/// The maximum number of distinct symbols the account may hold at once.
/// Checked when a trade would insert a *new* symbol, never on updates to
/// an existing one.
pub const MAX_POSITIONS: usize = 10;

/// In-memory state of the account: free cash plus all open positions.
///
/// A `PositionBook` is owned by exactly one engine session at a time
/// (hydrate, trade zero or more times, summarize); nothing else mutates it.
/// The `can_*` predicates answer "would this trade violate an invariant"
/// without touching state; the `apply_*` mutators assume the engine has
/// already validated and only perform the arithmetic, with every step
/// checked so a value past `Decimal` range is an error, not a panic.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    pub cash: Decimal,
    pub positions: HashMap<Symbol, Position>,
}

impl PositionBook {
    pub fn new(cash: Decimal, positions: HashMap<Symbol, Position>) -> Self {
        Self { cash, positions }
    }

    /// True if `symbol` is already held, or there is room for one more
    /// distinct symbol.
    pub fn can_open_new_position(&self, symbol: &Symbol) -> bool {
        self.positions.contains_key(symbol) || self.positions.len() < MAX_POSITIONS
    }

    /// True if `amount` can be paid out of free cash.
    pub fn can_afford(&self, amount: Decimal) -> bool {
        amount <= self.cash
    }

    /// True if a position exists for `symbol` with at least `quantity` shares.
    pub fn can_sell(&self, symbol: &Symbol, quantity: Decimal) -> bool {
        self.positions
            .get(symbol)
            .is_some_and(|position| position.quantity >= quantity)
    }

    /// Quantity currently held for `symbol`; zero when not held.
    pub fn held_quantity(&self, symbol: &Symbol) -> Decimal {
        self.positions
            .get(symbol)
            .map(|position| position.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// Applies a purchase of `quantity` shares for a total `cost`.
    ///
    /// Debits cash and folds the purchase into the cost-weighted average:
    /// `new_avg = (prev_qty * prev_avg + cost) / (prev_qty + quantity)`.
    /// Buying is the only operation that moves `avg_price`. Fails with
    /// `InvalidArgument` when the updated quantity or cost basis leaves
    /// `Decimal` range, with the book untouched.
    pub fn apply_buy(
        &mut self,
        symbol: &Symbol,
        quantity: Decimal,
        cost: Decimal,
    ) -> Result<PositionChange> {
        debug_assert!(quantity > Decimal::ZERO);
        let (prev_quantity, prev_avg) = match self.positions.get(symbol) {
            Some(position) => (position.quantity, position.avg_price),
            None => (Decimal::ZERO, Decimal::ZERO),
        };
        let new_quantity = prev_quantity
            .checked_add(quantity)
            .ok_or_else(|| out_of_range(symbol))?;
        let avg_price = prev_quantity
            .checked_mul(prev_avg)
            .and_then(|basis| basis.checked_add(cost))
            .and_then(|basis| basis.checked_div(new_quantity))
            .ok_or_else(|| out_of_range(symbol))?;
        // Cash and cost are both non-negative, so the debit cannot leave range.
        self.cash -= cost;
        let position = Position {
            symbol: symbol.clone(),
            quantity: new_quantity,
            avg_price,
        };
        self.positions.insert(symbol.clone(), position.clone());
        Ok(PositionChange::Upsert(position))
    }

    /// Applies a sale of `quantity` shares for a total `proceeds`.
    ///
    /// Credits cash and reduces the position. `avg_price` of the remainder
    /// is untouched; a position sold down to exactly zero is removed from
    /// the book rather than kept at zero quantity. Fails with
    /// `InvalidArgument` when the credited cash would leave `Decimal`
    /// range, with the book untouched.
    pub fn apply_sell(
        &mut self,
        symbol: &Symbol,
        quantity: Decimal,
        proceeds: Decimal,
    ) -> Result<PositionChange> {
        debug_assert!(self.can_sell(symbol, quantity));
        self.cash = self
            .cash
            .checked_add(proceeds)
            .ok_or_else(|| out_of_range(symbol))?;
        match self.positions.get_mut(symbol) {
            Some(position) if position.quantity > quantity => {
                position.quantity -= quantity;
                Ok(PositionChange::Upsert(position.clone()))
            }
            _ => {
                self.positions.remove(symbol);
                Ok(PositionChange::Remove(symbol.clone()))
            }
        }
    }

    /// Number of distinct symbols currently held.
    pub fn distinct_symbols(&self) -> usize {
        self.positions.len()
    }
}

fn out_of_range(symbol: &Symbol) -> Error {
    Error::InvalidArgument {
        reason: format!("position value for {} is out of range", symbol.0),
    }
}
