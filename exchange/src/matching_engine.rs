// Order routing and matching engine
//
// The matching engine is the per-process front of the matching core:
// 1. Receives client requests (already decoded from the wire)
// 2. Assigns the market order id and runs the pre-trade risk gate
// 3. Routes to the per-ticker order book, which matches and rests
// 4. Applies resulting executions to the tracked positions
// 5. Appends client responses and public market updates to the caller's
//    buffers, which the owning thread forwards to its rings
//
// One engine is owned by exactly one thread; books share nothing across
// instruments, so no locking happens anywhere below this point.

use crate::error::OrderBookError;
use crate::order_book::OrderBook;
use crate::protocol::{
    ClientRequest, ClientRequestType, ClientResponse, ClientResponseType, MarketUpdate,
    RejectReason,
};
use crate::risk::RiskGate;
use common::logging::{LogLevel, Logger};
use common::types::{
    ClientId, Limits, OrderId, Price, Qty, RiskCfg, Side, TickerId, INVALID_ORDER_ID,
};
use std::sync::Arc;

/// Routes client requests to per-ticker books and emits the results.
pub struct MatchingEngine {
    books: Vec<OrderBook>,
    risk: RiskGate,
    logger: Option<Arc<Logger>>,
}

impl MatchingEngine {
    /// Creates an engine with one order book per configured ticker.
    pub fn new(limits: &Limits) -> Self {
        let books = (0..limits.max_tickers)
            .map(|ticker_id| OrderBook::new(ticker_id as TickerId, limits))
            .collect();
        Self {
            books,
            risk: RiskGate::new(limits),
            logger: None,
        }
    }

    /// Attaches the operational logger used for pool-exhaustion and
    /// index-collision alerts.
    pub fn set_logger(&mut self, logger: Arc<Logger>) {
        self.logger = Some(logger);
    }

    pub fn set_risk_cfg(&mut self, ticker_id: TickerId, client_id: ClientId, cfg: RiskCfg) {
        self.risk.set_cfg(ticker_id, client_id, cfg);
    }

    #[inline]
    pub fn book(&self, ticker_id: TickerId) -> Option<&OrderBook> {
        self.books.get(ticker_id as usize)
    }

    #[inline]
    pub fn book_mut(&mut self, ticker_id: TickerId) -> Option<&mut OrderBook> {
        self.books.get_mut(ticker_id as usize)
    }

    #[inline]
    pub fn risk(&self) -> &RiskGate {
        &self.risk
    }

    #[inline]
    pub fn ticker_count(&self) -> usize {
        self.books.len()
    }

    /// Processes one client request, appending every resulting response and
    /// public update. The buffers are caller-owned so a steady-state engine
    /// never allocates here.
    pub fn process_request(
        &mut self,
        request: &ClientRequest,
        responses: &mut Vec<ClientResponse>,
        updates: &mut Vec<MarketUpdate>,
    ) {
        // Copy fields out of the packed struct before use.
        let msg_type = request.msg_type;

        match ClientRequestType::from_u8(msg_type) {
            Some(ClientRequestType::New) => self.handle_new_order(request, responses, updates),
            Some(ClientRequestType::Cancel) => self.handle_cancel(request, responses, updates),
            None => {
                let client_id = request.client_id;
                let ticker_id = request.ticker_id;
                let order_id = request.order_id;
                let side = request.side;
                let price = request.price;
                let qty = request.qty;
                responses.push(Self::reject(
                    RejectReason::InvalidOrder,
                    client_id,
                    ticker_id,
                    order_id,
                    side,
                    price,
                    qty,
                ));
            }
        }
    }

    fn handle_new_order(
        &mut self,
        request: &ClientRequest,
        responses: &mut Vec<ClientResponse>,
        updates: &mut Vec<MarketUpdate>,
    ) {
        let client_id = request.client_id;
        let ticker_id = request.ticker_id;
        let client_order_id = request.order_id;
        let side_raw = request.side;
        let price = request.price;
        let qty = request.qty;
        let side = Side::from_i8(side_raw);

        if (ticker_id as usize) >= self.books.len() {
            responses.push(Self::reject(
                RejectReason::InvalidOrder,
                client_id,
                ticker_id,
                client_order_id,
                side_raw,
                price,
                qty,
            ));
            return;
        }

        // The id is assigned before the gate runs; a rejected order burns
        // its id, which keeps accepted ids strictly increasing in arrival
        // order.
        let market_order_id = self.books[ticker_id as usize].allocate_market_order_id();

        if let Err(reason) = self.risk.check(ticker_id, client_id, side, qty) {
            responses.push(Self::reject(
                OrderBookError::RiskReject(reason).reject_reason(),
                client_id,
                ticker_id,
                client_order_id,
                side_raw,
                price,
                qty,
            ));
            return;
        }

        let first_new_response = responses.len();
        let result = self.books[ticker_id as usize].add(
            market_order_id,
            client_id,
            client_order_id,
            side,
            price,
            qty,
            responses,
            updates,
        );

        match result {
            Ok(()) => self.apply_fills(ticker_id, &responses[first_new_response..]),
            Err(err) => {
                self.alert(ticker_id, err);
                responses.push(Self::reject(
                    err.reject_reason(),
                    client_id,
                    ticker_id,
                    client_order_id,
                    side_raw,
                    price,
                    qty,
                ));
            }
        }
    }

    fn handle_cancel(
        &mut self,
        request: &ClientRequest,
        responses: &mut Vec<ClientResponse>,
        updates: &mut Vec<MarketUpdate>,
    ) {
        let client_id = request.client_id;
        let ticker_id = request.ticker_id;
        let client_order_id = request.order_id;
        let side_raw = request.side;
        let price = request.price;

        if (ticker_id as usize) >= self.books.len() {
            responses.push(Self::cancel_reject(
                RejectReason::UnknownOrder,
                client_id,
                ticker_id,
                client_order_id,
                side_raw,
                price,
            ));
            return;
        }

        if let Err(err) =
            self.books[ticker_id as usize].cancel(client_id, client_order_id, responses, updates)
        {
            responses.push(Self::cancel_reject(
                err.reject_reason(),
                client_id,
                ticker_id,
                client_order_id,
                side_raw,
                price,
            ));
        }
    }

    /// Feeds both participants' executions into the position tracker.
    fn apply_fills(&mut self, ticker_id: TickerId, new_responses: &[ClientResponse]) {
        for response in new_responses {
            if response.response_type() != Some(ClientResponseType::Filled) {
                continue;
            }
            let client_id = response.client_id;
            let side = response.side;
            let price = response.price;
            let exec_qty = response.exec_qty;
            self.risk
                .on_fill(ticker_id, client_id, Side::from_i8(side), exec_qty, price);
        }
    }

    fn alert(&self, ticker_id: TickerId, err: OrderBookError) {
        if !err.is_operational_alert() {
            return;
        }
        if let Some(logger) = &self.logger {
            match err {
                OrderBookError::PoolExhausted => {
                    logger.log_with_u64(LogLevel::Error, "order pool exhausted, ticker", ticker_id as u64)
                }
                OrderBookError::PriceIndexCollision => logger.log_with_u64(
                    LogLevel::Error,
                    "price index collision, ticker",
                    ticker_id as u64,
                ),
                _ => {}
            }
        }
    }

    fn reject(
        reason: RejectReason,
        client_id: ClientId,
        ticker_id: TickerId,
        client_order_id: OrderId,
        side: i8,
        price: Price,
        qty: Qty,
    ) -> ClientResponse {
        ClientResponse::new(
            ClientResponseType::Rejected,
            reason,
            client_id,
            ticker_id,
            client_order_id,
            INVALID_ORDER_ID,
            side,
            price,
            0,
            qty,
        )
    }

    fn cancel_reject(
        reason: RejectReason,
        client_id: ClientId,
        ticker_id: TickerId,
        client_order_id: OrderId,
        side: i8,
        price: Price,
    ) -> ClientResponse {
        ClientResponse::new(
            ClientResponseType::CancelRejected,
            reason,
            client_id,
            ticker_id,
            client_order_id,
            INVALID_ORDER_ID,
            side,
            price,
            0,
            0,
        )
    }
}
