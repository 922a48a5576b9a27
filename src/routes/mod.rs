//! Router Module Index
//!
//! Routes are split by who may reach them. Authentication is applied as a layer on the
//! authenticated and staff routers; role checks happen in the services through the
//! Authorization Gate, so a staff route called by a student still answers 403.

/// Routes reachable without credentials.
pub mod public;

/// Routes open to every authenticated account.
pub mod authenticated;

/// Routes that act on queues, notices and result ingestion. Authenticated like the
/// routes above; each handler's service decides whether the caller's role qualifies.
pub mod staff;
