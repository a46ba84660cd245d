//! Lenient string tables for native enum codes.
//!
//! Each table pairs a native code with the name callers see. Decoding never
//! fails: an unrecognized code becomes `Unknown(code)` and renders as the
//! table's sentinel name. Encoding never fails either: an unrecognized name,
//! or an `Unknown` value, falls back to the table's documented default.

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $repr:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $code:expr => $text:literal,
            )+
        }
        unknown = $unknown:literal;
        default = $default:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::FromPrimitive)]
        #[repr($repr)]
        #[non_exhaustive]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant = $code,
            )+
            /// A native code outside the table.
            #[num_enum(catch_all)]
            Unknown($repr),
        }

        impl $name {
            /// Every named variant, in table order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Name shown to callers; the sentinel for `Unknown`.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Unknown(_) => $unknown,
                }
            }

            /// Native code. `Unknown` keeps the code it was decoded from.
            pub fn code(self) -> $repr {
                match self {
                    $($name::$variant => $code,)+
                    $name::Unknown(code) => code,
                }
            }

            /// Code to hand to the native library; `Unknown` encodes as the default.
            pub fn encode(self) -> $repr {
                match self {
                    $name::Unknown(_) => $name::$default.code(),
                    known => known.code(),
                }
            }

            /// Decodes a native code.
            pub fn from_code(code: $repr) -> Self {
                Self::from(code)
            }

            /// Parses a name, falling back to the default for anything unrecognized.
            pub fn from_name(name: &str) -> Self {
                match name {
                    $($text => $name::$variant,)+
                    _ => $name::$default,
                }
            }

            pub fn is_unknown(self) -> bool {
                matches!(self, $name::Unknown(_))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::from_name(name)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}
