//! Race-safe stock reservation primitives.
//!
//! The [`ReservationService`] exposes reserve, release and finalize
//! operations at product or variant granularity. Each operation is
//! individually atomic with respect to the same product/variant; holding
//! several reservations together in one unit of work is the checkout
//! orchestrator's job, not this crate's.

pub mod reservation;

pub use reservation::ReservationService;
