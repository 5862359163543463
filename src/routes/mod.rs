//! Router Module Index
//!
//! Routes are grouped by the gate they sit behind. `create_router` applies the
//! authentication layer to `authenticated` and `admin`; the role gates are applied here,
//! inside the modules, so each group carries its own policy.

/// Routes open to anyone: health check, signup, login, logout.
pub mod public;

/// Routes that require a valid token; the profile routes also pass the baseline role gate.
pub mod authenticated;

/// Routes restricted to the administrative role.
pub mod admin;
