//! Target address type.

use std::fmt;
use std::ops::Add;

/// Strongly typed target address
///
/// Wraps a `u64` so load biases and memory addresses are not confused with
/// sizes or offsets into a code object.
///
/// ```rust
/// use devsol_core::types::Address;
///
/// let bias = Address::from(0x1000);
/// assert_eq!((bias + 0x40).value(), 0x1040);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address, also the load bias of a module that is not relocated.
    pub const ZERO: Self = Address(0);

    /// Create an address in const contexts.
    #[must_use]
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw value, for handing to collaborator APIs.
    #[must_use]
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

/// Wrapping addition, matching how section addresses are biased on the target.
impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}
