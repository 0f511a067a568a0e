// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A declarative macro for small, copyable flag sets.
//!
//! Used for dirty flags on core objects and for resource load flags. Only the
//! operations those two users need are generated.

/// Declares a flag set backed by an unsigned integer.
///
/// ```
/// strata_core::strata_bitflags! {
///     /// Example flags.
///     pub struct Example: u8 {
///         const A = 1 << 0;
///         const B = 1 << 1;
///     }
/// }
///
/// let flags = Example::A | Example::B;
/// assert!(flags.contains(Example::A));
/// assert_eq!(Example::from_bits_truncate(0xFF), Example::all());
/// ```
#[macro_export]
macro_rules! strata_bitflags {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$flag_attr:meta])*
                const $flag_name:ident = $flag_value:expr;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            /// The empty set.
            pub const EMPTY: Self = Self { bits: 0 };

            $(
                $(#[$flag_attr])*
                pub const $flag_name: Self = Self { bits: $flag_value };
            )*

            /// Every declared flag.
            pub const fn all() -> Self {
                Self { bits: 0 $(| $flag_value)* }
            }

            /// Builds a set from raw bits, dropping bits that match no declared flag.
            pub const fn from_bits_truncate(bits: $ty) -> Self {
                Self { bits: bits & Self::all().bits }
            }

            /// Raw bit representation.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// `true` when no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// `true` when every flag of `other` is set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// `true` when `self` and `other` share at least one flag.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Sets every flag of `other`.
            pub fn insert(&mut self, other: Self) {
                self.bits |= other.bits;
            }

            /// Clears every flag of `other`.
            pub fn remove(&mut self, other: Self) {
                self.bits &= !other.bits;
            }

            /// Returns a copy with the flags of `other` set.
            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }

            /// Returns a copy with the flags of `other` cleared.
            #[must_use]
            pub const fn difference(self, other: Self) -> Self {
                Self { bits: self.bits & !other.bits }
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, other: Self) -> Self {
                Self { bits: self.bits | other.bits }
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, other: Self) {
                self.bits |= other.bits;
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;
            fn bitand(self, other: Self) -> Self {
                Self { bits: self.bits & other.bits }
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                if self.bits == 0 {
                    return write!(f, "{}(EMPTY)", stringify!($name));
                }
                write!(f, "{}(", stringify!($name))?;
                let mut separator = "";
                $(
                    let flag: $ty = $flag_value;
                    if flag != 0 && (self.bits & flag) == flag {
                        write!(f, "{}{}", separator, stringify!($flag_name))?;
                        separator = " | ";
                    }
                )*
                let _ = separator;
                write!(f, ")")
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::strata_bitflags! {
        struct Probe: u16 {
            const LOW = 1 << 0;
            const MID = 1 << 4;
            const HIGH = 1 << 9;
        }
    }

    #[test]
    fn empty_set_reports_empty() {
        assert!(Probe::EMPTY.is_empty());
        assert!(Probe::default().is_empty());
        assert_eq!(format!("{:?}", Probe::EMPTY), "Probe(EMPTY)");
    }

    #[test]
    fn union_and_queries() {
        let flags = Probe::LOW | Probe::HIGH;
        assert!(flags.contains(Probe::LOW));
        assert!(!flags.contains(Probe::MID));
        assert!(flags.intersects(Probe::HIGH | Probe::MID));
        assert_eq!(format!("{flags:?}"), "Probe(LOW | HIGH)");
    }

    #[test]
    fn truncation_drops_unknown_bits() {
        let flags = Probe::from_bits_truncate(0xFFFF);
        assert_eq!(flags, Probe::all());
        assert_eq!(flags.bits(), (1 << 0) | (1 << 4) | (1 << 9));
    }

    #[test]
    fn insert_remove_difference() {
        let mut flags = Probe::EMPTY;
        flags.insert(Probe::MID);
        flags |= Probe::LOW;
        assert_eq!(flags, Probe::LOW | Probe::MID);
        flags.remove(Probe::LOW);
        assert_eq!(flags, Probe::MID);
        assert!(Probe::all().difference(Probe::all()).is_empty());
        assert_eq!(Probe::LOW.union(Probe::HIGH), Probe::LOW | Probe::HIGH);
    }
}
