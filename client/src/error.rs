use thiserror::Error;

/// A request the controller refuses before touching the network.
///
/// Front ends ignore these quietly: the form just does not submit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("nickname is empty")]
    EmptyNickname,

    #[error("full name is empty")]
    EmptyFullName,

    #[error("message is empty")]
    EmptyMessage,

    #[error("a session is already active")]
    AlreadyConnected,

    #[error("not connected")]
    NotConnected,

    #[error("no conversation selected")]
    NoPeerSelected,

    #[error("{0} is not in the roster")]
    UnknownPeer(String),
}

/// What a front end shows for a failed request. Validation failures
/// produce nothing.
pub fn user_message(err: &anyhow::Error) -> Option<String> {
    match err.downcast_ref::<ValidationError>() {
        Some(_) => None,
        None => Some(format!("Error: {err}")),
    }
}
