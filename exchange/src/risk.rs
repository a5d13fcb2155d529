//! Pre-trade risk gate.
//!
//! Every accepted order first passes the per-(ticker, client) checks, in
//! order: single-order size, worst-case projected position, realized loss.
//! The first failing check wins and the order is rejected with its tagged
//! reason; the book is never touched by a refused order.
//!
//! The gate tracks positions and realized P&L itself, fed from the fills the
//! matcher produces for both participants of every trade.

use crate::error::RiskRejectReason;
use common::types::{
    price_str, ClientId, Limits, Price, Qty, RiskCfg, Side, TickerId,
};

/// Net position and realized P&L of one client in one instrument.
///
/// Realized P&L uses average-open-price accounting: closing quantity
/// realizes `(exit - avg_open)` per unit for longs and the mirror for
/// shorts; flipping through zero re-opens at the fill price.
#[derive(Debug, Clone, Default)]
pub struct Position {
    /// Signed net position, positive = long.
    pub position: i64,
    /// Realized P&L in price units.
    pub realized_pnl: i64,
    /// Average entry price of the open position.
    pub avg_open_price: Price,
    /// Total traded volume.
    pub volume: u64,
}

impl Position {
    pub fn on_fill(&mut self, side: Side, qty: Qty, price: Price) {
        let signed_qty = side.sign() * qty as i64;
        self.volume += qty as u64;

        let old_position = self.position;
        let new_position = old_position + signed_qty;

        if old_position == 0 {
            self.avg_open_price = price;
        } else if (old_position > 0) != (signed_qty > 0) {
            // Reducing, closing, or flipping.
            let closing_qty = old_position.abs().min(signed_qty.abs());
            let pnl_per_unit = if old_position > 0 {
                price - self.avg_open_price
            } else {
                self.avg_open_price - price
            };
            self.realized_pnl += pnl_per_unit * closing_qty;

            if new_position != 0 && (new_position > 0) != (old_position > 0) {
                // Flipped through zero; the remainder opens at this price.
                self.avg_open_price = price;
            }
        } else {
            // Adding to the open position: volume-weighted average entry.
            let total_cost =
                self.avg_open_price * old_position.abs() + price * signed_qty.abs();
            self.avg_open_price = total_cost / new_position.abs();
        }

        self.position = new_position;
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Position{{pos:{} pnl:{} avg-price:{} vol:{}}}",
            self.position,
            self.realized_pnl,
            price_str(self.avg_open_price),
            self.volume
        )
    }
}

/// Pre-trade acceptance gate with per-(ticker, client) limits and tracked
/// positions. Construction sizes both tables from the startup limits; no
/// allocation afterwards.
pub struct RiskGate {
    cfg: Vec<Vec<RiskCfg>>,
    positions: Vec<Vec<Position>>,
    max_tickers: usize,
    max_clients: usize,
}

impl RiskGate {
    /// All limits start unlimited; configure real ones with `set_cfg`.
    pub fn new(limits: &Limits) -> Self {
        let cfg = (0..limits.max_tickers)
            .map(|_| vec![RiskCfg::unlimited(); limits.max_clients])
            .collect();
        let positions = (0..limits.max_tickers)
            .map(|_| vec![Position::default(); limits.max_clients])
            .collect();
        Self {
            cfg,
            positions,
            max_tickers: limits.max_tickers,
            max_clients: limits.max_clients,
        }
    }

    #[inline]
    fn in_range(&self, ticker_id: TickerId, client_id: ClientId) -> bool {
        (ticker_id as usize) < self.max_tickers && (client_id as usize) < self.max_clients
    }

    pub fn set_cfg(&mut self, ticker_id: TickerId, client_id: ClientId, cfg: RiskCfg) {
        if self.in_range(ticker_id, client_id) {
            self.cfg[ticker_id as usize][client_id as usize] = cfg;
        }
    }

    pub fn cfg(&self, ticker_id: TickerId, client_id: ClientId) -> &RiskCfg {
        &self.cfg[ticker_id as usize][client_id as usize]
    }

    pub fn position(&self, ticker_id: TickerId, client_id: ClientId) -> &Position {
        &self.positions[ticker_id as usize][client_id as usize]
    }

    /// Checks a proposed order. First failure wins:
    /// (a) order size, (b) worst-case position after a full fill,
    /// (c) realized loss.
    pub fn check(
        &self,
        ticker_id: TickerId,
        client_id: ClientId,
        side: Side,
        qty: Qty,
    ) -> Result<(), RiskRejectReason> {
        // Ids outside the configured ranges carry no limits here; the book
        // rejects them as invalid orders.
        if !self.in_range(ticker_id, client_id) {
            return Ok(());
        }
        let cfg = &self.cfg[ticker_id as usize][client_id as usize];
        let position = &self.positions[ticker_id as usize][client_id as usize];

        if qty > cfg.max_order_size {
            return Err(RiskRejectReason::OrderTooLarge);
        }

        let projected = position.position + side.sign() * qty as i64;
        if projected.unsigned_abs() > cfg.max_position as u64 {
            return Err(RiskRejectReason::PositionLimit);
        }

        if (position.realized_pnl as f64) < -cfg.max_loss {
            return Err(RiskRejectReason::LossLimit);
        }

        Ok(())
    }

    /// Applies one participant's execution to their tracked position.
    pub fn on_fill(
        &mut self,
        ticker_id: TickerId,
        client_id: ClientId,
        side: Side,
        qty: Qty,
        price: Price,
    ) {
        if self.in_range(ticker_id, client_id) {
            self.positions[ticker_id as usize][client_id as usize].on_fill(side, qty, price);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RiskGate {
        RiskGate::new(&Limits::small(64, 16))
    }

    #[test]
    fn test_unlimited_defaults_allow() {
        let gate = gate();
        assert!(gate.check(0, 1, Side::Buy, 1_000_000).is_ok());
        assert!(gate.check(1, 7, Side::Sell, 1).is_ok());
    }

    #[test]
    fn test_order_size_limit() {
        let mut gate = gate();
        gate.set_cfg(
            0,
            1,
            RiskCfg {
                max_order_size: 100,
                max_position: 1000,
                max_loss: 1e9,
            },
        );

        assert!(gate.check(0, 1, Side::Buy, 100).is_ok());
        assert_eq!(
            gate.check(0, 1, Side::Buy, 101),
            Err(RiskRejectReason::OrderTooLarge)
        );
    }

    #[test]
    fn test_position_limit_uses_worst_case_fill() {
        let mut gate = gate();
        gate.set_cfg(
            0,
            1,
            RiskCfg {
                max_order_size: 1000,
                max_position: 100,
                max_loss: 1e9,
            },
        );

        gate.on_fill(0, 1, Side::Buy, 80, 50);
        assert_eq!(gate.position(0, 1).position, 80);

        assert!(gate.check(0, 1, Side::Buy, 20).is_ok());
        assert_eq!(
            gate.check(0, 1, Side::Buy, 21),
            Err(RiskRejectReason::PositionLimit)
        );
        // The short direction has the full range available.
        assert!(gate.check(0, 1, Side::Sell, 180).is_ok());
        assert_eq!(
            gate.check(0, 1, Side::Sell, 181),
            Err(RiskRejectReason::PositionLimit)
        );
    }

    #[test]
    fn test_loss_limit() {
        let mut gate = gate();
        gate.set_cfg(
            0,
            1,
            RiskCfg {
                max_order_size: 1000,
                max_position: 10_000,
                max_loss: 100.0,
            },
        );

        // Buy 10 @ 100, sell 10 @ 90: realized -100, still within the limit.
        gate.on_fill(0, 1, Side::Buy, 10, 100);
        gate.on_fill(0, 1, Side::Sell, 10, 90);
        assert_eq!(gate.position(0, 1).realized_pnl, -100);
        assert!(gate.check(0, 1, Side::Buy, 1).is_ok());

        // One more losing round trip pushes past it.
        gate.on_fill(0, 1, Side::Buy, 1, 100);
        gate.on_fill(0, 1, Side::Sell, 1, 90);
        assert_eq!(
            gate.check(0, 1, Side::Buy, 1),
            Err(RiskRejectReason::LossLimit)
        );
    }

    #[test]
    fn test_check_order_precedence() {
        let mut gate = gate();
        gate.set_cfg(
            0,
            1,
            RiskCfg {
                max_order_size: 10,
                max_position: 5,
                max_loss: 100.0,
            },
        );

        // Both size and position would fail; size is checked first.
        assert_eq!(
            gate.check(0, 1, Side::Buy, 11),
            Err(RiskRejectReason::OrderTooLarge)
        );
    }

    #[test]
    fn test_position_accounting() {
        let mut p = Position::default();

        p.on_fill(Side::Buy, 10, 100);
        assert_eq!(p.position, 10);
        assert_eq!(p.avg_open_price, 100);
        assert_eq!(p.realized_pnl, 0);

        // Add at a different price: weighted average entry.
        p.on_fill(Side::Buy, 10, 110);
        assert_eq!(p.position, 20);
        assert_eq!(p.avg_open_price, 105);

        // Reduce at a profit.
        p.on_fill(Side::Sell, 5, 115);
        assert_eq!(p.position, 15);
        assert_eq!(p.realized_pnl, 50);
        assert_eq!(p.avg_open_price, 105);

        // Flip through zero; remainder opens at the fill price.
        p.on_fill(Side::Sell, 25, 100);
        assert_eq!(p.position, -10);
        assert_eq!(p.realized_pnl, 50 + (100 - 105) * 15);
        assert_eq!(p.avg_open_price, 100);

        // Cover the short at a profit.
        p.on_fill(Side::Buy, 10, 95);
        assert_eq!(p.position, 0);
        assert_eq!(p.realized_pnl, 50 - 75 + 50);
        assert_eq!(p.volume, 60);
    }
}
