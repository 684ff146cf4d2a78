//! Two-phase registers.
//!
//! Every value the hardware keeps in flip-flops lives in a [`Reg`]. While a
//! tick is being evaluated, logic reads [`Reg::get`] (the value latched at the
//! previous edge) and writes [`Reg::drive`]. Nothing becomes visible until
//! [`Clocked::commit`] runs at the end of the tick, so evaluation order never
//! leaks into results.
//!
//! A register driven more than once in the same tick keeps the last drive.
//! Write priority is therefore expressed by evaluation order: the statement
//! that has to win is evaluated last.

use serde::{Deserialize, Serialize};

/// Anything holding registers that latch together on the clock edge.
pub trait Clocked {
    /// Latch all pending drives.
    fn commit(&mut self);
}

/// A clocked register holding a `T`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct Reg<T: Copy> {
    cur: T,
    #[serde(skip)]
    next: Option<T>,
}

impl<T: Copy> Reg<T> {
    pub const fn new(reset: T) -> Self {
        Reg { cur: reset, next: None }
    }

    /// Value latched at the last edge.
    #[inline]
    pub fn get(&self) -> T {
        self.cur
    }

    /// Schedule `value` for the next edge. Later drives override earlier ones.
    #[inline]
    pub fn drive(&mut self, value: T) {
        self.next = Some(value);
    }
}

impl<T: Copy> Clocked for Reg<T> {
    #[inline]
    fn commit(&mut self) {
        if let Some(v) = self.next.take() {
            self.cur = v;
        }
    }
}

impl<T: Copy + Default> Default for Reg<T> {
    fn default() -> Self {
        Reg::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_is_invisible_until_commit() {
        let mut r = Reg::new(5u8);
        r.drive(9);
        assert_eq!(r.get(), 5);
        r.commit();
        assert_eq!(r.get(), 9);
        r.commit();
        assert_eq!(r.get(), 9);
    }

    #[test]
    fn test_last_drive_wins() {
        let mut r = Reg::new(0u16);
        r.drive(1);
        r.drive(2);
        r.drive(3);
        r.commit();
        assert_eq!(r.get(), 3);
    }

    #[test]
    fn test_undriven_register_holds() {
        let mut r = Reg::new(true);
        r.commit();
        r.commit();
        assert!(r.get());
    }

    #[test]
    fn test_swap_without_temporaries() {
        // Two registers exchanging values in one tick read only latched state.
        let mut a = Reg::new(1u8);
        let mut b = Reg::new(2u8);
        a.drive(b.get());
        b.drive(a.get());
        a.commit();
        b.commit();
        assert_eq!((a.get(), b.get()), (2, 1));
    }
}
