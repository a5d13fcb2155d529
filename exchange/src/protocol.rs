// Message definitions for exchange protocol
//
// Binary message protocol using zerocopy for zero-copy serialization.
// All structs are #[repr(C, packed)] for predictable memory layout.
//
// The max-value sentinel of each primitive type travels on the wire
// unchanged and means absent/invalid end to end.

use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ============================================================================
// Message Type Enums
// ============================================================================

/// Client request types for order submission
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequestType {
    New = 1,
    Cancel = 2,
}

impl ClientRequestType {
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ClientRequestType::New),
            2 => Some(ClientRequestType::Cancel),
            _ => None,
        }
    }
}

/// Client response types for order acknowledgments
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientResponseType {
    Accepted = 1,
    Canceled = 2,
    Filled = 3,
    CancelRejected = 4,
    Rejected = 5,
}

impl ClientResponseType {
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ClientResponseType::Accepted),
            2 => Some(ClientResponseType::Canceled),
            3 => Some(ClientResponseType::Filled),
            4 => Some(ClientResponseType::CancelRejected),
            5 => Some(ClientResponseType::Rejected),
            _ => None,
        }
    }
}

/// Reason byte carried on Rejected / CancelRejected responses
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    None = 0,
    InvalidOrder = 1,
    DuplicateOrderId = 2,
    RiskOrderTooLarge = 3,
    RiskPositionLimit = 4,
    RiskLossLimit = 5,
    UnknownOrder = 6,
    PoolExhausted = 7,
    PriceIndexCollision = 8,
}

impl RejectReason {
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RejectReason::None),
            1 => Some(RejectReason::InvalidOrder),
            2 => Some(RejectReason::DuplicateOrderId),
            3 => Some(RejectReason::RiskOrderTooLarge),
            4 => Some(RejectReason::RiskPositionLimit),
            5 => Some(RejectReason::RiskLossLimit),
            6 => Some(RejectReason::UnknownOrder),
            7 => Some(RejectReason::PoolExhausted),
            8 => Some(RejectReason::PriceIndexCollision),
            _ => None,
        }
    }
}

/// Market data update types
///
/// The per-ticker update stream is totally ordered, gap-free and sufficient
/// to reconstruct the book on the participant side.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketUpdateType {
    /// Full reset for a ticker
    Clear = 1,
    Add = 2,
    Modify = 3,
    Cancel = 4,
    Trade = 5,
    /// Brackets the recovery snapshot stream
    SnapshotStart = 6,
    SnapshotEnd = 7,
}

impl MarketUpdateType {
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(MarketUpdateType::Clear),
            2 => Some(MarketUpdateType::Add),
            3 => Some(MarketUpdateType::Modify),
            4 => Some(MarketUpdateType::Cancel),
            5 => Some(MarketUpdateType::Trade),
            6 => Some(MarketUpdateType::SnapshotStart),
            7 => Some(MarketUpdateType::SnapshotEnd),
            _ => None,
        }
    }
}

// ============================================================================
// Message Structs
// ============================================================================

/// Client request message for order submission
///
/// Layout (30 bytes total):
/// - msg_type: u8 (1 byte) - ClientRequestType
/// - client_id: u32 (4 bytes)
/// - ticker_id: u32 (4 bytes)
/// - order_id: u64 (8 bytes) - client order id
/// - side: i8 (1 byte) - Side wire value
/// - price: i64 (8 bytes) - fixed-point price
/// - qty: u32 (4 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct ClientRequest {
    pub msg_type: u8,
    pub client_id: u32,
    pub ticker_id: u32,
    pub order_id: u64,
    pub side: i8,
    pub price: i64,
    pub qty: u32,
}

impl ClientRequest {
    #[inline]
    pub fn new(
        msg_type: ClientRequestType,
        client_id: u32,
        ticker_id: u32,
        order_id: u64,
        side: i8,
        price: i64,
        qty: u32,
    ) -> Self {
        Self {
            msg_type: msg_type as u8,
            client_id,
            ticker_id,
            order_id,
            side,
            price,
            qty,
        }
    }

    #[inline]
    pub fn request_type(&self) -> Option<ClientRequestType> {
        ClientRequestType::from_u8(self.msg_type)
    }

    /// Get a byte slice reference to this message (zero-copy)
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        AsBytes::as_bytes(self)
    }

    /// Create a reference from a byte slice (zero-copy)
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<&Self> {
        FromBytes::ref_from(bytes)
    }
}

/// Client response message for order acknowledgments
///
/// Layout (43 bytes total):
/// - msg_type: u8 (1 byte) - ClientResponseType
/// - reason: u8 (1 byte) - RejectReason (None unless a reject)
/// - client_id: u32 (4 bytes)
/// - ticker_id: u32 (4 bytes)
/// - client_order_id: u64 (8 bytes)
/// - market_order_id: u64 (8 bytes)
/// - side: i8 (1 byte)
/// - price: i64 (8 bytes)
/// - exec_qty: u32 (4 bytes)
/// - leaves_qty: u32 (4 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct ClientResponse {
    pub msg_type: u8,
    pub reason: u8,
    pub client_id: u32,
    pub ticker_id: u32,
    pub client_order_id: u64,
    pub market_order_id: u64,
    pub side: i8,
    pub price: i64,
    pub exec_qty: u32,
    pub leaves_qty: u32,
}

impl ClientResponse {
    #[allow(clippy::too_many_arguments)]
    #[inline]
    pub fn new(
        msg_type: ClientResponseType,
        reason: RejectReason,
        client_id: u32,
        ticker_id: u32,
        client_order_id: u64,
        market_order_id: u64,
        side: i8,
        price: i64,
        exec_qty: u32,
        leaves_qty: u32,
    ) -> Self {
        Self {
            msg_type: msg_type as u8,
            reason: reason as u8,
            client_id,
            ticker_id,
            client_order_id,
            market_order_id,
            side,
            price,
            exec_qty,
            leaves_qty,
        }
    }

    #[inline]
    pub fn response_type(&self) -> Option<ClientResponseType> {
        ClientResponseType::from_u8(self.msg_type)
    }

    #[inline]
    pub fn reject_reason(&self) -> Option<RejectReason> {
        RejectReason::from_u8(self.reason)
    }

    /// Get a byte slice reference to this message (zero-copy)
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        AsBytes::as_bytes(self)
    }

    /// Create a reference from a byte slice (zero-copy)
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<&Self> {
        FromBytes::ref_from(bytes)
    }
}

/// Market data update message
///
/// Layout (42 bytes total):
/// - msg_type: u8 (1 byte) - MarketUpdateType
/// - ticker_id: u32 (4 bytes)
/// - seq_num: u64 (8 bytes) - per-ticker monotonic sequence
/// - order_id: u64 (8 bytes) - market order id the update refers to
/// - side: i8 (1 byte)
/// - price: i64 (8 bytes)
/// - qty: u32 (4 bytes)
/// - priority: u64 (8 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
pub struct MarketUpdate {
    pub msg_type: u8,
    pub ticker_id: u32,
    pub seq_num: u64,
    pub order_id: u64,
    pub side: i8,
    pub price: i64,
    pub qty: u32,
    pub priority: u64,
}

impl MarketUpdate {
    /// Create a new market update. The sequence number is stamped by the
    /// book when the update enters the public stream.
    #[inline]
    pub fn new(
        msg_type: MarketUpdateType,
        ticker_id: u32,
        order_id: u64,
        side: i8,
        price: i64,
        qty: u32,
        priority: u64,
    ) -> Self {
        Self {
            msg_type: msg_type as u8,
            ticker_id,
            seq_num: 0,
            order_id,
            side,
            price,
            qty,
            priority,
        }
    }

    #[inline]
    pub fn update_type(&self) -> Option<MarketUpdateType> {
        MarketUpdateType::from_u8(self.msg_type)
    }

    /// Get a byte slice reference to this message (zero-copy)
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        AsBytes::as_bytes(self)
    }

    /// Create a reference from a byte slice (zero-copy)
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<&Self> {
        FromBytes::ref_from(bytes)
    }
}

// ============================================================================
// Message Size Constants
// ============================================================================

pub const CLIENT_REQUEST_SIZE: usize = std::mem::size_of::<ClientRequest>();
pub const CLIENT_RESPONSE_SIZE: usize = std::mem::size_of::<ClientResponse>();
pub const MARKET_UPDATE_SIZE: usize = std::mem::size_of::<MarketUpdate>();

// ============================================================================
// Tests
// ============================================================================
