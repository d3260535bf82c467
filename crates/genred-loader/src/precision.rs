//! Numeric precision of a compiled routine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Floating-point type a routine is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Precision {
    /// 32-bit floats
    Float,
    /// 64-bit floats
    Double,
}

impl Precision {
    /// C type name passed to the compiler (`float` / `double`)
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Double => "double",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
