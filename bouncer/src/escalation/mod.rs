//! Escalation: attempt accounting and the punishment ladder.
//!
//! Each lapsed role offer raises a member's attempt count, which in turn
//! lengthens both the waiting period before their next offer and the
//! decision window of the offer itself. Once the count would reach the
//! configured maximum, the punishment steps up from kick to ban and the
//! count is cleared.
//!
//! With the default ladder (base 20s, max 3, waits 10m/20m/40m):
//!
//! ```text
//! join        offer 20s   ── lapse ──▶  kick      attempt 1/3
//! rejoin      wait 10m ─▶ offer 40s ── lapse ──▶  kick      attempt 2/3
//! rejoin      wait 20m ─▶ offer 60s ── lapse ──▶  ban       attempt 3/3
//!                                                 (count cleared)
//! ```
//!
//! Counts past the ladder's last rung reuse the final wait, so a member who
//! somehow returns after a ban keeps getting the longest cooldown.

pub mod ledger;
pub mod policy;

pub use ledger::AttemptLedger;
pub use policy::{EscalationPolicy, PunitiveAction};
