/// A decoded field that either maps onto a known variant `T` or holds a raw
/// value `Raw` the format permits but we have no meaning for.
///
/// The raw value is kept so it can be reported, e.g. a `set_episode`
/// argument of 7.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Recognized<T, Raw = i64> {
    Known(T),
    Unknown(Raw),
}

impl<T: Copy, Raw: Copy> Copy for Recognized<T, Raw> {}

impl<T, Raw> Recognized<T, Raw> {
    /// The known value, or whatever `f` makes of the raw one.
    pub fn unwrap_or_else<F: FnOnce(Raw) -> T>(self, f: F) -> T {
        match self {
            Recognized::Known(t) => t,
            Recognized::Unknown(raw) => f(raw),
        }
    }
}
