pub mod capacitive;
pub mod hall;
pub mod impact;
pub mod range;
