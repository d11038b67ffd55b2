/// Combines several values of the same kind into a single aggregate.
pub trait Aggregatable<T> {
    type Error;

    /// Aggregates `items` into a single value.
    ///
    /// # Returns
    /// * `Result<T, Self::Error>` - the aggregate, or an error if any of the inputs is not a valid
    ///   encoding or the set is empty
    fn aggregate(items: &[&T]) -> Result<T, Self::Error>;
}
