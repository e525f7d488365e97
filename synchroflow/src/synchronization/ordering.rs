//! Ordering values for synchronizations.

use super::Synchronization;

/// Notified before everything else.
pub const HIGHEST_ORDER: i32 = i32::MIN;

/// Notified after everything else.
pub const LOWEST_ORDER: i32 = i32::MAX;

/// Position of callbacks that declare no explicit order.
pub const DEFAULT_ORDER: i32 = 0;

/// Returns the order a synchronization is sorted by.
pub fn effective_order<S: Synchronization + ?Sized>(synchronization: &S) -> i32 {
    synchronization.order().unwrap_or(DEFAULT_ORDER)
}
