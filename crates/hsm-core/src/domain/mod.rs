//! Domain model (IDs, machine types, refs, call context, errors, status).

pub mod context;
pub mod errors;
pub mod ids;
pub mod machine_type;
pub mod reference;
pub mod status;

pub use self::context::{CallContext, CallIdentity};
pub use self::errors::{EnvironmentError, ErrorKind, MethodError};
pub use self::ids::{CallId, RunId};
pub use self::machine_type::{MachineType, ValidationError};
pub use self::reference::{Ref, RefError, StateMachineKey};
pub use self::status::{ErrorDetails, ErrorStatus, RemoteError, StatusCode};
