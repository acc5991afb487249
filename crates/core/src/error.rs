use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// Login was rejected or hit an unexpected challenge. Never retried
	/// automatically; fix the credentials and call again.
	#[error("authentication failed: {0}")]
	Auth(String),

	/// A server or channel id did not resolve. The session is untouched.
	#[error("{kind} not found: {id}")]
	NotFound { kind: &'static str, id: String },

	/// Caller input failed validation before any navigation happened.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	/// The message composer never became interactive.
	#[error("send failed in channel {channel_id}: {reason}")]
	SendFailed { channel_id: String, reason: String },

	/// The message was submitted but never confirmed in the timeline.
	#[error("send not confirmed in channel {channel_id} after {ms}ms")]
	SendTimeout { channel_id: String, ms: u64 },

	/// The discovery cache contradicted the live UI even after one
	/// re-resolution attempt.
	#[error("stale channel mapping: channel {channel_id} no longer resolves to server {server_id}")]
	StaleMapping { channel_id: String, server_id: String },

	/// The session became untrustworthy and was torn down. The next call
	/// starts from a fresh session; retrying is reasonable.
	#[error("transient session failure: {0}")]
	Transient(String),

	/// The operation deadline expired. The session is torn down because a
	/// timed-out operation may have left navigation in an unknown state.
	#[error("operation timed out after {ms}ms")]
	OperationTimeout { ms: u64 },

	#[error("browser error: {0}")]
	Browser(#[source] anyhow::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Whether this failure means the live session can no longer be trusted.
	///
	/// Corrupting failures force a full teardown before the error is returned,
	/// so the next operation starts from a clean slate. Pure caller-input
	/// errors never touch session state.
	pub fn is_session_corrupting(&self) -> bool {
		matches!(
			self,
			Error::Browser(_)
				| Error::Transient(_)
				| Error::OperationTimeout { .. }
				| Error::SendFailed { .. }
				| Error::SendTimeout { .. }
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn caller_input_errors_do_not_corrupt() {
		assert!(!Error::InvalidArgument("bad".into()).is_session_corrupting());
		assert!(
			!Error::NotFound { kind: "channel", id: "1".into() }.is_session_corrupting()
		);
		assert!(!Error::Auth("denied".into()).is_session_corrupting());
	}

	#[test]
	fn session_faults_corrupt() {
		assert!(Error::Transient("nav deadlock".into()).is_session_corrupting());
		assert!(Error::OperationTimeout { ms: 1000 }.is_session_corrupting());
		assert!(
			Error::SendTimeout { channel_id: "1".into(), ms: 5000 }.is_session_corrupting()
		);
	}
}
