//! Permit handles

/// One unit of granted concurrency within a pool
///
/// A permit is handed out by [`Controller::acquire`](crate::Controller::acquire)
/// and must be given back exactly once through
/// [`Controller::release`](crate::Controller::release). It is move-only, so
/// releasing it twice does not compile.
#[must_use = "a permit must be released back to the controller that granted it"]
#[derive(Debug, PartialEq, Eq)]
pub struct Permit {
    pool: usize,
}

impl Permit {
    pub(crate) fn new(pool: usize) -> Self {
        Self { pool }
    }

    /// Index of the pool this permit was drawn from
    pub fn pool(&self) -> usize {
        self.pool
    }
}
