pub mod amount;

pub use amount::{AmountCodec, AmountError, AmountInput};
