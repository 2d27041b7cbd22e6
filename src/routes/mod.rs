/// Router Module Index
///
/// Splits the edge's routes by who serves them. Both modules sit behind the gate
/// middleware applied in `create_router`, so a protected page is never forwarded
/// before the session check ran.

/// Routes answered by the edge itself.
pub mod public;

/// The fallback that relays allowed navigation to the page origin.
pub mod pages;
