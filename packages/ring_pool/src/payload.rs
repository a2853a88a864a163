/// The contract that any type stored in a [`RingPool`][crate::RingPool] must satisfy.
///
/// A payload is created once per slot by the factory given to the pool and is then reused for
/// the lifetime of the pool. It is never reallocated, only reset.
///
/// # Example
///
/// ```rust
/// use ring_pool::Payload;
///
/// struct Frame {
///     data: Vec<u8>,
///     len: usize,
/// }
///
/// impl Payload for Frame {
///     fn reset(&mut self) {
///         self.len = 0;
///     }
///
///     fn describe(&self) -> String {
///         format!("frame with {} of {} bytes used", self.len, self.data.len())
///     }
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Payload: Send + 'static {
    /// Clears the payload to an empty, reusable state.
    ///
    /// Called by the pool every time a slot is returned to the ring, before the slot can be
    /// handed out again.
    fn reset(&mut self);

    /// Produces a human-readable rendering of the current contents.
    ///
    /// Used only for diagnostics, e.g. when printing the trace of an overdue slot.
    fn describe(&self) -> String;
}
