//! Monotonic time source
//!
//! Bus timeouts are measured in milliseconds by subtraction, so a counter
//! that wraps at `u32::MAX` is fine as long as no single wait spans a wrap.

/// Monotonic millisecond clock
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u32;

    /// Milliseconds elapsed since `since`, tolerant of counter wrap
    fn elapsed_ms(&self, since: u32) -> u32 {
        self.now_ms().wrapping_sub(since)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct Fixed(Cell<u32>);

    impl Clock for Fixed {
        fn now_ms(&self) -> u32 {
            self.0.get()
        }
    }

    #[test]
    fn test_elapsed_simple() {
        let clock = Fixed(Cell::new(150));
        assert_eq!(clock.elapsed_ms(100), 50);
    }

    #[test]
    fn test_elapsed_across_wrap() {
        let clock = Fixed(Cell::new(5));
        assert_eq!(clock.elapsed_ms(u32::MAX - 4), 10);
    }

    #[test]
    fn test_reference_forwards() {
        let clock = Fixed(Cell::new(7));
        let by_ref = &clock;
        assert_eq!(by_ref.now_ms(), 7);
    }
}
