//! Wire-level tag names and values.
//!
//! These strings are fixed by the deployed contract ecosystem and must be
//! bit-exact for interop: a record tagged differently is simply not part
//! of the protocol.

/// Tag carrying the application marker on every protocol transaction.
pub const TAG_APP_NAME: &str = "App-Name";

/// `App-Name` value of an interaction record.
pub const APP_ACTION: &str = "SmartWeaveAction";

/// `App-Name` value of a contract-instance transaction.
pub const APP_CONTRACT: &str = "SmartWeaveContract";

/// `App-Name` value of a contract-source transaction.
pub const APP_CONTRACT_SOURCE: &str = "SmartWeaveContractSource";

/// Tag naming the target contract on an interaction record.
pub const TAG_CONTRACT: &str = "Contract";

/// Tag carrying the JSON call payload on an interaction record.
pub const TAG_INPUT: &str = "Input";

/// Tag pointing a contract transaction at its source transaction.
pub const TAG_CONTRACT_SRC: &str = "Contract-Src";

/// Inline initial state on a contract transaction.
pub const TAG_INIT_STATE: &str = "Init-State";

/// Pointer to a separate initial-state transaction.
pub const TAG_INIT_STATE_TX: &str = "Init-State-TX";

/// Optional minimum fee a contract declares for its interactions.
pub const TAG_MIN_FEE: &str = "Min-Fee";

/// Content type of a source payload; selects the compiler.
pub const TAG_CONTENT_TYPE: &str = "Content-Type";

/// Content type of natively registered handler sources.
pub const CONTENT_TYPE_NATIVE: &str = "application/x.native-handler";
