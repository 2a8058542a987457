//! Trading ledger consumed by strategies.
//!
//! The backtester mirrors every simulated entry and exit into a [`TradingRecord`] so
//! that rule predicates such as "a position is open" see the same state the
//! simulation does. The ledger tracks a single logical position at a time.

use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: u64,
    pub side: OrderSide,
    pub index: usize,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Monotonic order id source owned by one ledger.
#[derive(Debug, Clone, Default)]
pub struct OrderIdSequence {
    next: u64,
}

impl OrderIdSequence {
    pub fn next_id(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerPosition {
    entry: Option<Order>,
    exit: Option<Order>,
}

impl LedgerPosition {
    pub fn is_new(&self) -> bool {
        self.entry.is_none() && self.exit.is_none()
    }

    pub fn is_open(&self) -> bool {
        self.entry.is_some() && self.exit.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.entry.is_some() && self.exit.is_some()
    }

    pub fn is_long(&self) -> bool {
        matches!(&self.entry, Some(o) if o.side == OrderSide::Buy)
    }

    pub fn is_short(&self) -> bool {
        matches!(&self.entry, Some(o) if o.side == OrderSide::Sell)
    }

    pub fn entry_order(&self) -> Option<&Order> {
        self.entry.as_ref()
    }

    pub fn exit_order(&self) -> Option<&Order> {
        self.exit.as_ref()
    }

    pub fn cost_basis(&self) -> Decimal {
        self.entry
            .as_ref()
            .map(|o| o.amount * o.price)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn exit_value(&self) -> Decimal {
        self.exit
            .as_ref()
            .map(|o| o.amount * o.price)
            .unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TradingRecord {
    ids: OrderIdSequence,
    current: LedgerPosition,
    trades: Vec<LedgerPosition>,
    last_index: Option<usize>,
}

impl TradingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an order against the current ledger position: a new position is
    /// entered, an open one is exited and archived. Orders older than the last
    /// recorded order are ignored. Returns the assigned order id when recorded.
    pub fn operate(
        &mut self,
        side: OrderSide,
        index: usize,
        price: Decimal,
        amount: Decimal,
    ) -> Option<u64> {
        if self.last_index.is_some_and(|last| index < last) {
            return None;
        }

        let order = Order {
            id: self.ids.next_id(),
            side,
            index,
            price,
            amount,
        };
        let id = order.id;
        self.last_index = Some(index);

        if self.current.is_new() {
            self.current.entry = Some(order);
        } else {
            self.current.exit = Some(order);
            let closed = std::mem::take(&mut self.current);
            self.trades.push(closed);
        }
        Some(id)
    }

    pub fn current_position(&self) -> &LedgerPosition {
        &self.current
    }

    pub fn last_trade(&self) -> Option<&LedgerPosition> {
        self.trades.last()
    }

    pub fn trades(&self) -> &[LedgerPosition] {
        &self.trades
    }
}
