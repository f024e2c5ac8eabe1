//! Rule synthesis as Boolean satisfiability.
//!
//! [`encoding`] turns a target topology and a candidate size into CNF,
//! [`oracle`] decides it (in-process with [`embedded`] or through an external
//! solver) and the encoder decodes satisfying assignments back into rules.

pub mod embedded;
pub mod encoding;
pub mod formula;
pub mod oracle;
pub mod vars;

pub use embedded::EmbeddedSolver;
pub use encoding::{directional_binding, Encoder, EncodingOptions, BLANK_COLOR};
pub use formula::{Assignment, Clause, DimacsError, Formula, Literal};
pub use oracle::{parse_reply, CancelToken, CommandOracle, OracleError, SatOracle, SatOutcome};
pub use vars::{Var, VariableTable};
