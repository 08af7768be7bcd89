//! Wheel strategy screener pipeline.
//!
//! Given an underlying symbol, picks the expiration closest to the target
//! days-to-expiration, resolves the streamer symbols of its strikes, snapshots
//! their quotes and greeks, and returns the put and call whose absolute delta
//! is nearest the target.
//!
//! All I/O goes through the port traits in `wheel_scan_core::traits`, so the
//! pipeline runs against the tastytrade adapters in production and against
//! in-process fakes in tests.

pub mod assembler;
pub mod delta;
pub mod expiration;
pub mod pipeline;
pub mod streamer_symbols;

pub use assembler::assemble;
pub use delta::{nearest_delta, DeltaPick, DeltaSelection, TARGET_DELTA};
pub use expiration::{
    days_to_expiration, rank_by_dte, Clock, EasternClock, ExpirationChoice, ExpirationSelector,
    FixedClock,
};
pub use pipeline::{ScreenSettings, WheelScreener};
pub use streamer_symbols::{resolve, ResolvedSymbols};
