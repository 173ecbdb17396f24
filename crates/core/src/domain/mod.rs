/// Wire labels for the closed enums the API exchanges as upper-case strings.
macro_rules! wire_labels {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let normalized = value.trim().to_ascii_uppercase().replace(['-', ' '], "_");
                match normalized.as_str() {
                    $($label => Ok($name::$variant),)+
                    _ => Err(format!(
                        "unsupported {} `{}` (expected {})",
                        stringify!($name),
                        value.trim(),
                        [$($label),+].join("|")
                    )),
                }
            }
        }
    };
}

pub mod analytics;
pub mod policy;
pub mod request;
pub mod user;
