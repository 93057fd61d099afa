mod value;
mod lookup;
mod format;

pub use value::*;
pub use lookup::*;
pub use format::*;
