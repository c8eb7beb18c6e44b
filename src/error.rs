use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// No condition in the transformation core is retried internally. Transformation is
/// deterministic per input, so every failure propagates to the orchestrator, which leaves the
/// affected module untouched.
///
/// # Error Categories
///
/// ## Symbol Errors
/// - [`Error::SymbolNotFound`] - A referenced type is defined in no reachable module
/// - [`Error::MemberNotFound`] - A member lookup exhausted the base-type chain
/// - [`Error::ModuleNotFound`] - The assembly cache could not provide a module
/// - [`Error::UnimportedSymbol`] - A body references a scope missing from the import table
///
/// ## Pipeline Errors
/// - [`Error::CyclicMaterialization`] - Re-entrant staging or member population
/// - [`Error::UnsupportedOperand`] - The cloner met an operand it cannot classify
/// - [`Error::RecursionLimit`] - A type walk exceeded the configured depth
///
/// ## Generic Errors
/// - [`Error::Malformed`] - Structurally broken input
/// - [`Error::LockError`] - Poisoned lock
/// - [`Error::Error`] - Anything else, e.g. reported by external collaborators
///
/// # Examples
///
/// ```rust,no_run
/// use cilweave::{Context, Error};
///
/// let context = Context::default();
/// match context.transform("App") {
///     Ok(module) => println!("rewrote {}", module.name),
///     Err(Error::SymbolNotFound(name)) => eprintln!("missing type {name}"),
///     Err(e) => eprintln!("transformation aborted: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be processed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A referenced type could not be located in any module reachable from the origin.
    ///
    /// Fatal for the type being processed. The associated value is the canonical name of
    /// the reference that failed to resolve.
    #[error("Unable to resolve type '{0}' from any reachable module")]
    SymbolNotFound(String),

    /// A member lookup walked the whole base-type chain without a match.
    #[error("Member '{member}' not found on '{type_name}' or any of its base types")]
    MemberNotFound {
        /// Full name of the type the lookup started at
        type_name: String,
        /// Name of the requested member
        member: String,
    },

    /// The assembly cache could not provide the requested module.
    #[error("Module '{0}' could not be located")]
    ModuleNotFound(String),

    /// A type was staged or materialized again while its own staging or member population
    /// was still running.
    ///
    /// Indicates a pipeline bug and is never silently resolved.
    #[error("Re-entrant materialization of '{0}' rejected")]
    CyclicMaterialization(String),

    /// The instruction cloner encountered an operand it cannot classify.
    ///
    /// The method being cloned is abandoned, and with it the rewrite of the containing
    /// module.
    #[error("Unsupported operand in '{method}' at instruction {index}: {operand}")]
    UnsupportedOperand {
        /// Name of the method being cloned
        method: String,
        /// Index of the offending instruction in the source body
        index: usize,
        /// Description of the offending operand
        operand: String,
    },

    /// A method body references a symbol whose scope was never imported into the module.
    #[error("Module '{module}' references '{symbol}' from scope '{scope}' without importing it")]
    UnimportedSymbol {
        /// The module whose import table is incomplete
        module: String,
        /// The scope that is missing from the import table
        scope: String,
        /// Canonical name of the offending symbol
        symbol: String,
    },

    /// Recursion limit reached.
    ///
    /// Base-type and interface walks are bounded to survive malformed, cyclic hierarchies.
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    ///
    /// Used for errors that don't fit into other categories, e.g. failures reported by an
    /// image store or execution host.
    #[error("{0}")]
    Error(String),
}
