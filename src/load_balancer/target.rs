//! Weighted upstream target.

/// One upstream address with its scheduling weight.
///
/// A weight of zero is legal; such a target is never picked while any
/// other target carries a positive weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightedTarget {
    /// Upstream address, `host:port`.
    pub address: String,
    /// Relative share of requests.
    pub weight: u32,
}

impl WeightedTarget {
    pub fn new(address: impl Into<String>, weight: u32) -> Self {
        Self {
            address: address.into(),
            weight,
        }
    }
}

impl<S: Into<String>> From<(S, u32)> for WeightedTarget {
    fn from((address, weight): (S, u32)) -> Self {
        Self::new(address, weight)
    }
}
