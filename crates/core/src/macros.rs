// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for reducing boilerplate.
//!
//! - [`define_id!`] — typed newtype over an i64 storage row id
//! - [`enum_str!`] — canonical `&'static str` form plus `Display` for an enum
//! - [`clearers!`] — NULL-marking methods for `Option<Option<T>>` patch fields
//! - [`builder!`] — test builder with defaults, fluent setters, and `build()`

/// Define a newtype ID wrapper around an `i64` row id.
///
/// Rows get their identity from the store, so IDs are plain integers with a
/// typed wrapper to keep issue/tenant/activity ids from mixing.
///
/// ```ignore
/// crate::define_id! {
///     /// Doc comment for the ID type.
///     pub struct IssueId;
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }

        impl From<$name> for i64 {
            fn from(v: $name) -> i64 {
                v.0
            }
        }
    };
}

/// Map enum variants to their canonical string form.
///
/// Generates `as_str() -> &'static str` (the form stored in columns and
/// matched by the `parse` functions) and a `Display` impl that delegates
/// to it. Data-carrying variants ignore their fields with `(..)`.
///
/// ```ignore
/// crate::enum_str! {
///     IssueState {
///         Queued => "queued",
///         InReview => "in_review",
///     }
/// }
/// ```
#[macro_export]
macro_rules! enum_str {
    ($enum:ty { $( $variant:ident $(( $($ignore:tt)* ))? => $str:expr ),+ $(,)? }) => {
        impl $enum {
            /// Canonical string form of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant $(( $($ignore)* ))? => $str, )+
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Generate `clear_<field>()` methods for `Option<Option<T>>` patch fields,
/// marking the column for NULL.
#[macro_export]
macro_rules! clearers {
    ( $( $(#[$meta:meta])* $name:ident => $field:ident ),* $(,)? ) => {
        $(
            $(#[$meta])*
            pub fn $name(mut self) -> Self {
                self.$field = Some(None);
                self
            }
        )*
    };
}

/// Generate a fluent test builder for a struct.
///
/// A test names only the fields it cares about; `new()` fills the rest
/// from the declared defaults. The groups control the setter shape:
/// `into` fields accept `impl Into<T>`, `set` fields take `T` as written,
/// and `option` fields store `Some(value)` over a `None` default. All
/// generated items are gated behind `test` / the `test-support` feature.
///
/// ```ignore
/// crate::builder! {
///     pub struct FooBuilder => Foo {
///         into { name: String = "test" }
///         set { count: u32 = 0 }
///         option { label: String = None }
///     }
/// }
/// ```
#[macro_export]
macro_rules! builder {
    (
        pub struct $builder:ident => $target:ident {
            $(into {
                $( $into_field:ident : $into_ty:ty = $into_default:expr ),* $(,)?
            })?
            $(set {
                $( $set_field:ident : $set_ty:ty = $set_default:expr ),* $(,)?
            })?
            $(option {
                $( $opt_field:ident : $opt_ty:ty = $opt_default:expr ),* $(,)?
            })?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        pub struct $builder {
            $($( $into_field: $into_ty, )*)?
            $($( $set_field: $set_ty, )*)?
            $($( $opt_field: Option<$opt_ty>, )*)?
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            /// Builder primed with the declared test defaults.
            pub fn new() -> Self {
                Self {
                    $($( $into_field: $into_default.into(), )*)?
                    $($( $set_field: $set_default, )*)?
                    $($( $opt_field: $opt_default, )*)?
                }
            }

            $($(
                pub fn $into_field(mut self, v: impl Into<$into_ty>) -> Self {
                    self.$into_field = v.into();
                    self
                }
            )*)?

            $($(
                pub fn $set_field(mut self, v: $set_ty) -> Self {
                    self.$set_field = v;
                    self
                }
            )*)?

            $($(
                pub fn $opt_field(mut self, v: impl Into<$opt_ty>) -> Self {
                    self.$opt_field = Some(v.into());
                    self
                }
            )*)?

            pub fn build(self) -> $target {
                $target {
                    $($( $into_field: self.$into_field, )*)?
                    $($( $set_field: self.$set_field, )*)?
                    $($( $opt_field: self.$opt_field, )*)?
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl Default for $builder {
            fn default() -> Self {
                Self::new()
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $target {
            /// Start a builder primed with test defaults.
            pub fn builder() -> $builder {
                $builder::new()
            }
        }
    };
}
