use thiserror::Error;
use tonic::Status;
use uuid::Uuid;

/// Failure taxonomy of the engine. Every variant maps to a distinct
/// user-visible kind so callers can tell "already canceled" apart from
/// "not your reservation".
#[derive(Error, Debug)]
pub enum ReservationError {
    #[error("menu {0} not found")]
    MenuNotFound(Uuid),
    #[error("reservation not found")]
    ReservationNotFound,
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("store {0} not found")]
    StoreNotFound(Uuid),
    #[error("reservation does not belong to the caller")]
    NotOwner,
    #[error("reservation status does not allow cancellation")]
    CancelForbidden,
    #[error("reservation type does not allow this operation")]
    TypeForbidden,
    #[error("duplicate reservation number")]
    DuplicateReservationNo,
    #[error("order id already belongs to a reservation")]
    DuplicateOrderId,
    #[error("menu is not in the cart")]
    InvalidCart,
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    Cache(#[from] redis::RedisError),
    #[error(transparent)]
    Encoding(#[from] serde_json::Error),
}

impl From<ReservationError> for Status {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::MenuNotFound(_)
            | ReservationError::ReservationNotFound
            | ReservationError::UserNotFound(_)
            | ReservationError::StoreNotFound(_) => Status::not_found(err.to_string()),
            ReservationError::NotOwner
            | ReservationError::CancelForbidden
            | ReservationError::TypeForbidden => Status::permission_denied(err.to_string()),
            ReservationError::DuplicateReservationNo | ReservationError::DuplicateOrderId => {
                Status::already_exists(err.to_string())
            }
            ReservationError::InvalidCart => Status::failed_precondition(err.to_string()),
            ReservationError::Database(_)
            | ReservationError::Cache(_)
            | ReservationError::Encoding(_) => Status::internal("Internal server error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_and_status_failures_stay_distinguishable() {
        let not_owner = Status::from(ReservationError::NotOwner);
        let forbidden = Status::from(ReservationError::CancelForbidden);
        assert_eq!(not_owner.code(), tonic::Code::PermissionDenied);
        assert_eq!(forbidden.code(), tonic::Code::PermissionDenied);
        assert_ne!(not_owner.message(), forbidden.message());
    }

    #[test]
    fn infrastructure_failures_do_not_leak_details() {
        let status = Status::from(ReservationError::Database(
            diesel::result::Error::BrokenTransactionManager,
        ));
        assert_eq!(status.code(), tonic::Code::Internal);
        assert_eq!(status.message(), "Internal server error");
    }

    #[test]
    fn numbering_race_surfaces_as_conflict() {
        let status = Status::from(ReservationError::DuplicateReservationNo);
        assert_eq!(status.code(), tonic::Code::AlreadyExists);
    }
}
