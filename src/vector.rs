use crate::{env::Environment, flux::Flux, Error};

/// Replaced by the axis name in every component of a template.
pub const PLACEHOLDER: &str = "{}";

macro_rules! flux_vector {
    ($(#[$meta:meta])* $name:ident, $n:literal, $($axis:ident),+) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct $name {
            $(pub $axis: Flux,)+
        }

        impl $name {
            pub fn new($($axis: impl Into<Flux>),+) -> Self {
                Self {
                    $($axis: $axis.into(),)+
                }
            }

            /// One expression for every axis, with each `{}` replaced by the axis name.
            pub fn from_template(template: &str) -> Self {
                Self {
                    $($axis: Flux::new(template.replace(PLACEHOLDER, stringify!($axis))),)+
                }
            }

            /// Evaluates every component, in axis order.
            pub fn evaluate(&mut self, env: &Environment) -> Result<[f64; $n], Error> {
                Ok([$(self.$axis.evaluate(env)?),+])
            }

            pub fn refresh(&mut self) -> Result<(), Error> {
                $(self.$axis.refresh()?;)+
                Ok(())
            }

            /// Sets a local variable on every component.
            pub fn set_variable(&mut self, name: &str, value: f64) {
                $(self.$axis.set_variable(name, value);)+
            }

            pub fn components(&self) -> [&Flux; $n] {
                [$(&self.$axis),+]
            }
        }

        impl From<&str> for $name {
            fn from(template: &str) -> Self {
                Self::from_template(template)
            }
        }
    };
}

flux_vector!(
    /// Two cached expressions, one per axis of a 2D quantity such as an offset.
    Flux2, 2, x, y
);
flux_vector!(
    /// Three cached expressions, for `x`, `y` and `z`.
    Flux3, 3, x, y, z
);
flux_vector!(
    /// Four cached expressions, for `x`, `y`, `z` and `w`.
    Flux4, 4, x, y, z, w
);
