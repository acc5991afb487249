use tracing_subscriber::EnvFilter;

/// Logs go to stderr only: stdout carries the JSON-RPC stream and must stay
/// clean.
pub fn init_logging() {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,dmcp=info"));

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(std::io::stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
