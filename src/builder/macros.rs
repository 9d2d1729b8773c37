//! Macros for declaring closed symbol enumerations.

/// Shared expansion for the symbol macros. Not part of the public API.
#[doc(hidden)]
#[macro_export]
macro_rules! __symbol_enum {
    (
        $marker:path;
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $name {
            /// Every member, in index order.
            #[allow(dead_code)]
            pub const ALL: &'static [$name] = &[$($name::$variant),*];
        }

        impl $crate::core::Symbol for $name {
            const COUNT: usize = [$(stringify!($variant)),*].len();

            fn index(&self) -> usize {
                *self as usize
            }

            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }

        impl $marker for $name {}

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::core::Symbol::name(self))
            }
        }
    };
}

/// Generate a state enumeration implementing [`State`](crate::core::State).
///
/// # Example
///
/// ```
/// use p2p_fsm::core::Symbol;
/// use p2p_fsm::state_enum;
///
/// state_enum! {
///     pub enum DoorState {
///         Closed,
///         Open,
///         Locked,
///     }
/// }
///
/// assert_eq!(DoorState::COUNT, 3);
/// assert_eq!(DoorState::ALL[2], DoorState::Locked);
/// assert_eq!(DoorState::Open.to_string(), "Open");
/// ```
#[macro_export]
macro_rules! state_enum {
    ($($body:tt)*) => {
        $crate::__symbol_enum! { $crate::core::State; $($body)* }
    };
}

/// Generate an event enumeration implementing [`Event`](crate::core::Event).
#[macro_export]
macro_rules! event_enum {
    ($($body:tt)*) => {
        $crate::__symbol_enum! { $crate::core::Event; $($body)* }
    };
}

/// Generate an action enumeration implementing [`Action`](crate::core::Action).
#[macro_export]
macro_rules! action_enum {
    ($($body:tt)*) => {
        $crate::__symbol_enum! { $crate::core::Action; $($body)* }
    };
}
