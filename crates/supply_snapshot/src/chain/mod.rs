//! Chain data access: the data-source seam, the LCD client, and response normalization.

mod lcd;
pub(crate) mod normalize;
mod records;
mod source;

pub use lcd::{FetchError, LcdClient, LcdConfig};
pub use normalize::{add_months, format_rfc3339, parse_amount, truncate_decimal, NormalizeError};
pub use records::{decode_account, parse_claim_list};
pub use source::{
    AccountLock, ChainDataSource, ClaimRecord, ClaimTier, Coin, LockKind, VestingPeriod,
};
