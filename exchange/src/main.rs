//! Exchange demo entry point.
//!
//! Runs the matching engine on its own thread behind SPSC rings, feeds it a
//! deterministic synthetic order flow, and drains the response and market
//! data streams, printing summary statistics and the final book state.
//! The rings stand where the wire gateways would plug in.

use clap::Parser;
use common::lf_queue::LFQueue;
use common::logging::{LogLevel, Logger};
use common::time::{now_nanos, LatencyStats};
use common::types::{Limits, Price, Qty, Side};
use exchange::matching_engine::MatchingEngine;
use exchange::protocol::{
    ClientRequest, ClientRequestType, ClientResponse, ClientResponseType, MarketUpdate,
    MarketUpdateType,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Matching engine demo driver
#[derive(Parser, Debug)]
#[command(name = "exchange")]
#[command(about = "Price-time priority matching engine demo")]
struct Args {
    /// Number of synthetic orders to feed
    #[arg(short, long, default_value_t = 100_000)]
    orders: u64,

    /// Number of tickers to trade
    #[arg(short, long, default_value_t = 2)]
    tickers: u32,

    /// Number of synthetic clients
    #[arg(short, long, default_value_t = 8)]
    clients: u32,

    /// Seed for the synthetic flow generator
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Ring buffer capacity (power of two)
    #[arg(long, default_value_t = 65_536)]
    ring_capacity: usize,
}

/// Small xorshift generator so runs are reproducible from the seed.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[derive(Default)]
struct Stats {
    accepted: u64,
    rejected: u64,
    canceled: u64,
    fills: u64,
    trades: u64,
    md_updates: u64,
}

fn drain(responses: &LFQueue<ClientResponse>, updates: &LFQueue<MarketUpdate>, stats: &mut Stats) {
    while let Some(response) = responses.pop() {
        match response.response_type() {
            Some(ClientResponseType::Accepted) => stats.accepted += 1,
            Some(ClientResponseType::Rejected) | Some(ClientResponseType::CancelRejected) => {
                stats.rejected += 1
            }
            Some(ClientResponseType::Canceled) => stats.canceled += 1,
            Some(ClientResponseType::Filled) => stats.fills += 1,
            None => {}
        }
    }
    while let Some(update) = updates.pop() {
        stats.md_updates += 1;
        if update.update_type() == Some(MarketUpdateType::Trade) {
            stats.trades += 1;
        }
    }
}

fn main() {
    let args = Args::parse();

    let limits = Limits {
        max_tickers: args.tickers as usize,
        max_clients: args.clients as usize,
        max_order_ids: 16 * 1024,
        max_price_levels: 1024,
    };

    let logger = Arc::new(Logger::with_level(LogLevel::Info));
    logger.log(LogLevel::Info, "exchange demo starting");

    let requests: Arc<LFQueue<ClientRequest>> = Arc::new(LFQueue::new(args.ring_capacity));
    let responses: Arc<LFQueue<ClientResponse>> = Arc::new(LFQueue::new(args.ring_capacity));
    let updates: Arc<LFQueue<MarketUpdate>> = Arc::new(LFQueue::new(args.ring_capacity));

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .expect("failed to set Ctrl-C handler");
    }

    // Matching thread: requests in, responses and public updates out.
    let engine_thread = {
        let requests = requests.clone();
        let responses = responses.clone();
        let updates = updates.clone();
        let running = running.clone();
        let logger = logger.clone();

        thread::spawn(move || {
            let mut engine = MatchingEngine::new(&limits);
            engine.set_logger(logger);

            let mut out_responses = Vec::with_capacity(256);
            let mut out_updates = Vec::with_capacity(256);

            loop {
                match requests.pop() {
                    Some(request) => {
                        engine.process_request(&request, &mut out_responses, &mut out_updates);
                        for response in out_responses.drain(..) {
                            let mut item = response;
                            while let Err(back) = responses.push(item) {
                                item = back;
                                std::hint::spin_loop();
                            }
                        }
                        for update in out_updates.drain(..) {
                            let mut item = update;
                            while let Err(back) = updates.push(item) {
                                item = back;
                                std::hint::spin_loop();
                            }
                        }
                    }
                    None => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        std::hint::spin_loop();
                    }
                }
            }

            engine
        })
    };

    // Synthetic flow: mostly passive orders around a fixed mid, with a
    // crossing order or a cancel mixed in.
    let mut rng = Rng(args.seed | 1);
    let mut stats = Stats::default();
    let mut feed_latency = LatencyStats::new();
    let mut next_order_id = vec![0u64; args.clients as usize];

    for i in 0..args.orders {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let client_id = (rng.next() % args.clients as u64) as u32;
        let ticker_id = (rng.next() % args.tickers as u64) as u32;
        let side = if rng.next() % 2 == 0 {
            Side::Buy
        } else {
            Side::Sell
        };
        // Prices hover in a band around the mid; the band edges overlap so
        // a fraction of the flow crosses and trades.
        let mid: Price = 10_000;
        let offset = (rng.next() % 20) as Price;
        let price = match side {
            Side::Buy => mid - 10 + offset,
            _ => mid + 10 - offset,
        };
        let qty: Qty = 1 + (rng.next() % 100) as Qty;

        let request = if rng.next() % 10 == 0 && next_order_id[client_id as usize] > 0 {
            // Cancel a recent order (it may already be gone; a cancel
            // reject is part of normal flow).
            let target = rng.next() % next_order_id[client_id as usize];
            ClientRequest::new(
                ClientRequestType::Cancel,
                client_id,
                ticker_id,
                target,
                side as i8,
                price,
                0,
            )
        } else {
            let order_id = next_order_id[client_id as usize];
            next_order_id[client_id as usize] += 1;
            ClientRequest::new(
                ClientRequestType::New,
                client_id,
                ticker_id,
                order_id,
                side as i8,
                price,
                qty,
            )
        };

        let start = now_nanos();
        let mut item = request;
        while let Err(back) = requests.push(item) {
            item = back;
            // Producer backpressure: drain our side while the ring is full.
            drain(&responses, &updates, &mut stats);
        }
        feed_latency.record(start.elapsed());

        if i % 1024 == 0 {
            drain(&responses, &updates, &mut stats);
        }
    }

    // Let the engine finish the backlog, then stop it. Keep draining while
    // it winds down so it can never wedge on a full output ring.
    while !requests.is_empty() {
        drain(&responses, &updates, &mut stats);
        thread::yield_now();
    }
    running.store(false, Ordering::SeqCst);
    while !engine_thread.is_finished() {
        drain(&responses, &updates, &mut stats);
        thread::yield_now();
    }
    let engine = engine_thread.join().expect("engine thread panicked");
    drain(&responses, &updates, &mut stats);

    println!("accepted:   {}", stats.accepted);
    println!("rejected:   {}", stats.rejected);
    println!("canceled:   {}", stats.canceled);
    println!("fills:      {}", stats.fills);
    println!("trades:     {}", stats.trades);
    println!("md updates: {}", stats.md_updates);
    println!(
        "feed latency ns: mean {:.0} min {} max {}",
        feed_latency.mean(),
        feed_latency.min(),
        feed_latency.max()
    );

    for ticker_id in 0..args.tickers {
        if let Some(book) = engine.book(ticker_id) {
            if let Err(violation) = book.check_invariants() {
                logger.log_formatted(
                    LogLevel::Error,
                    format!("book integrity violation: {}", violation),
                );
            }
            println!("{}", book.render());
        }
    }

    logger.log(LogLevel::Info, "exchange demo stopped");
    logger.flush();
}
