use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A once-only flag shared by one resolve/reject pair. The first `claim`
/// wins, every later one sees `false`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Latch(Arc<AtomicBool>);

impl Latch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::Latch;
    use std::thread;

    #[test]
    fn test_first_claim_wins() {
        let latch = Latch::new();
        let other = latch.clone();
        assert!(!latch.is_claimed());
        assert!(other.claim());
        assert!(!latch.claim());
        assert!(!other.claim());
        assert!(latch.is_claimed());
    }

    #[test]
    fn test_claim_across_threads() {
        let latch = Latch::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let latch = latch.clone();
                thread::spawn(move || latch.claim())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().expect("The claim thread has panicked"))
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }
}
