/// Name assigned to a callable action that arrives without a name of its own.
pub const USER_TRANSACTION_FUNCTION: &str = "userTransactionFunction";

/// Name assigned to an action compiled from source text.
pub const USER_TRANSACTION_SOURCE: &str = "userTransactionSource";

/// The only parameter of a compiled action.
pub const ACTION_PARAMETER: &str = "params";

/// Lock timeout in seconds used when a request does not specify one.
pub const DEFAULT_LOCK_TIMEOUT: f64 = 900.0;

pub const DEFAULT_DATABASE_NAME: &str = "_system";

pub const DEFAULT_PORT_TYPE: &str = "tcp/ip";
