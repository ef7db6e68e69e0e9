//! Tracing bootstrap for processes that host the pipeline

use tracing_subscriber::EnvFilter;

/// Directives applied on top of `RUST_LOG`
pub const DEFAULT_DIRECTIVES: &[&str] = &[
    "aeo_workflows=info",
    "aeo_agents=info",
    "aeo_state_store=info",
    "aeo_llm=info",
];

/// Install a fmt subscriber filtered by `RUST_LOG` plus `directives`.
///
/// Returns false when a global subscriber was already installed.
pub fn init_tracing(directives: &[&str]) -> bool {
    let mut filter = EnvFilter::from_default_env();
    for directive in directives {
        match directive.parse() {
            Ok(d) => filter = filter.add_directive(d),
            Err(e) => eprintln!("Ignoring invalid log directive {}: {}", directive, e),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
