//! Mapping between [`gdid::Error`] and [`tonic::Status`].
//!
//! The server reports core errors as gRPC statuses; the client maps statuses
//! back so the failover loop can tell endpoint-local failures (retry on the
//! next endpoint of the shard) from request failures (surface immediately).

use gdid::{BlockRequest, Error};
use tonic::{Code, Status};

/// Converts a core error into the status sent to clients.
pub fn error_to_status(err: &Error) -> Status {
    match err {
        Error::Routing { context } => Status::not_found(context.clone()),
        Error::TransportAcquisition { .. } | Error::AuthorityUnavailable { .. } => {
            Status::unavailable(err.to_string())
        }
        Error::AuthorityTimeout { .. } => Status::deadline_exceeded(err.to_string()),
        Error::InvalidRequest { reason } | Error::InvalidEndpoint { reason } => {
            Status::invalid_argument(reason.clone())
        }
        Error::InvalidAtom { .. } => Status::invalid_argument(err.to_string()),
        Error::EraExhausted { .. } => Status::resource_exhausted(err.to_string()),
        _ => Status::internal(err.to_string()),
    }
}

/// Converts a status received for `request` into a core error.
///
/// `Unavailable`, `DeadlineExceeded`, `Cancelled` and server-side faults map
/// to [`Error::AuthorityUnavailable`], which the service client treats as
/// transient.
pub fn status_to_error(status: &Status, request: &BlockRequest) -> Error {
    match status.code() {
        Code::NotFound => Error::Routing {
            context: status.message().to_owned(),
        },
        Code::InvalidArgument
        | Code::OutOfRange
        | Code::FailedPrecondition
        | Code::PermissionDenied
        | Code::Unauthenticated
        | Code::Unimplemented => Error::InvalidRequest {
            reason: format!("{:?}: {}", status.code(), status.message()),
        },
        Code::ResourceExhausted => Error::EraExhausted {
            scope: request.scope_name.clone(),
            sequence: request.sequence_name.clone(),
        },
        _ => Error::AuthorityUnavailable {
            reason: format!("{:?}: {}", status.code(), status.message()),
        },
    }
}
